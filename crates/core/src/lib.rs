//! `netops-core` — strongly-typed identifiers and the shared error model.
//!
//! Everything here is deterministic and free of I/O; infrastructure concerns
//! live in the outer crates.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{DeviceId, SessionId, TenantId, UserId};
