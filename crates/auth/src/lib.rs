//! `netops-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. Token
//! decoding/signature verification happens in the transport layer; this crate
//! validates claims and answers scope questions.

pub mod claims;
pub mod principal;
pub mod roles;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use principal::Principal;
pub use roles::Role;
