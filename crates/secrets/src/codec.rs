//! Authenticated encryption of stored device credentials.
//!
//! The at-rest format is a versioned envelope string:
//!
//! ```text
//! v1:<nonce-b64>:<auth-tag-b64>:<ciphertext-b64>
//! ```
//!
//! AES-256-GCM with a fresh random 96-bit nonce per encryption. The key is
//! the SHA-256 digest of a configured secret, so every process sharing the
//! secret decrypts the same envelopes. Decryption fails closed: any parse
//! error, version mismatch, or authentication failure yields `None`, never
//! garbage plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;
use sha2::{Digest, Sha256};

const ENVELOPE_VERSION: &str = "v1";
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Symmetric codec for credential envelopes.
#[derive(Clone)]
pub struct SecretCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material, not even in debug output.
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    /// Derive the process-wide key from a configured secret.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt a plaintext credential into an envelope string.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let cipher = Aes256Gcm::new(&self.key.into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm appends the 16-byte tag to the ciphertext; the envelope
        // carries it as a separate field.
        let mut sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .expect("AES-GCM encryption is infallible for in-memory buffers");
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        format!(
            "{ENVELOPE_VERSION}:{}:{}:{}",
            B64.encode(nonce_bytes),
            B64.encode(tag),
            B64.encode(sealed)
        )
    }

    /// Decrypt an envelope string.
    ///
    /// Returns `None` on any malformation or tamper; absence of a usable
    /// credential is a normal outcome for callers, not a fault.
    pub fn decrypt(&self, envelope: &str) -> Option<String> {
        let mut parts = envelope.split(':');
        let version = parts.next()?;
        if version != ENVELOPE_VERSION {
            return None;
        }
        let nonce_bytes = B64.decode(parts.next()?).ok()?;
        let tag = B64.decode(parts.next()?).ok()?;
        let mut ciphertext = B64.decode(parts.next()?).ok()?;
        if parts.next().is_some() || nonce_bytes.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
            return None;
        }

        ciphertext.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new(&self.key.into());
        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = cipher.decrypt(nonce, ciphertext.as_slice()).ok()?;
        String::from_utf8(plaintext).ok()
    }
}
