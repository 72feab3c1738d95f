//! `netops-secrets` — credential handling primitives.
//!
//! - [`SecretCodec`]: authenticated encryption for credentials at rest
//! - [`redact`]: scrubbing of credential-bearing substrings before log output
//! - [`TokenCache`]: explicit, injectable cache for short-lived secrets

pub mod codec;
pub mod redact;
pub mod token_cache;

pub use codec::SecretCodec;
pub use redact::redact;
pub use token_cache::{InMemoryTokenStore, TokenCache, TokenStore};
