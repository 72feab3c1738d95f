//! Layered credential resolution.
//!
//! Order of precedence: fields on the device record, then contextual config
//! (per platform/role), then the registry secret store, then tenant defaults.
//! Absence is `Option`, never an error; a device without resolvable
//! credentials gets marked pending by the inventory sync instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use netops_core::TenantId;
use netops_secrets::{SecretCodec, TokenCache, TokenStore};

use crate::device::DeviceRecord;
use crate::registry::{Registry, RegistrySecret};

/// A username/password pair. `Debug` masks the password so accidental
/// `{:?}` logging cannot leak it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Where a candidate credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    DeviceFields,
    Contextual,
    SecretStore,
    TenantDefault,
}

/// One credential the chain would try, with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCandidate {
    pub identity: String,
    pub credentials: Credentials,
    pub source: CredentialSource,
}

/// Outcome of a single login attempt against a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginOutcome {
    Success,
    AuthFailed,
    Unreachable { reason: String },
}

/// Attempts an interactive login with one credential. Implemented by the
/// session crate's SSH connector; faked in tests.
#[async_trait]
pub trait LoginProber: Send + Sync {
    async fn attempt_login(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> LoginOutcome;
}

/// The layered resolver. Holds the secret codec for decrypting device-field
/// passwords and a short-lived cache so hot paths (session creation, polls)
/// do not hit the registry on every resolution.
pub struct CredentialChain {
    codec: Arc<SecretCodec>,
    registry: Arc<dyn Registry>,
    contextual: HashMap<String, Credentials>,
    tenant_defaults: HashMap<TenantId, Credentials>,
    cache: TokenCache<Arc<dyn TokenStore>>,
}

impl CredentialChain {
    pub fn new(
        codec: Arc<SecretCodec>,
        registry: Arc<dyn Registry>,
        cache_store: Arc<dyn TokenStore>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            registry,
            contextual: HashMap::new(),
            tenant_defaults: HashMap::new(),
            cache: TokenCache::new(cache_store, cache_ttl),
        }
    }

    /// Contextual credentials keyed by platform or role name.
    pub fn with_contextual(mut self, key: impl Into<String>, credentials: Credentials) -> Self {
        self.contextual.insert(key.into(), credentials);
        self
    }

    pub fn with_tenant_default(mut self, tenant_id: TenantId, credentials: Credentials) -> Self {
        self.tenant_defaults.insert(tenant_id, credentials);
        self
    }

    /// First resolvable credential for the device, or `None`.
    pub async fn resolve(&self, device: &DeviceRecord) -> Option<Credentials> {
        let cache_key = format!("device-creds:{}", device.id);
        if let Some(cached) = self.cache.get(&cache_key) {
            if let Ok(credentials) = serde_json::from_str::<Credentials>(&cached) {
                return Some(credentials);
            }
            self.cache.invalidate(&cache_key);
        }

        let candidate = self.candidates(device).await.into_iter().next()?;
        if let Ok(serialized) = serde_json::to_string(&candidate.credentials) {
            self.cache.put(&cache_key, serialized);
        }
        Some(candidate.credentials)
    }

    /// Drop any cached credential for the device, e.g. after a login failed.
    pub fn invalidate(&self, device: &DeviceRecord) {
        self.cache.invalidate(&format!("device-creds:{}", device.id));
    }

    /// Every candidate the chain would try, in precedence order. Used by the
    /// credential-check processor to rank logins.
    pub async fn candidates(&self, device: &DeviceRecord) -> Vec<CredentialCandidate> {
        let mut out = Vec::new();

        if let Some(credentials) = self.from_device_fields(device) {
            out.push(CredentialCandidate {
                identity: credentials.username.clone(),
                credentials,
                source: CredentialSource::DeviceFields,
            });
        }

        if let Some(credentials) = self.from_contextual(device) {
            out.push(CredentialCandidate {
                identity: credentials.username.clone(),
                credentials,
                source: CredentialSource::Contextual,
            });
        }

        for credentials in self.from_secret_store(device).await {
            out.push(CredentialCandidate {
                identity: credentials.username.clone(),
                credentials,
                source: CredentialSource::SecretStore,
            });
        }

        if let Some(credentials) = self.tenant_defaults.get(&device.tenant_id) {
            out.push(CredentialCandidate {
                identity: credentials.username.clone(),
                credentials: credentials.clone(),
                source: CredentialSource::TenantDefault,
            });
        }

        out
    }

    /// Which of username/password the device record is missing, for pending
    /// markers. Empty when the chain can resolve something.
    pub async fn missing_fields(&self, device: &DeviceRecord) -> Vec<String> {
        if !self.candidates(device).await.is_empty() {
            return Vec::new();
        }
        let mut missing = Vec::new();
        if device.cred_username.is_none() {
            missing.push("username".to_string());
        }
        if device.cred_password_enc.is_none() {
            missing.push("password".to_string());
        }
        missing
    }

    fn from_device_fields(&self, device: &DeviceRecord) -> Option<Credentials> {
        let username = device.cred_username.clone()?;
        let envelope = device.cred_password_enc.as_deref()?;
        // Decryption fails closed; an undecryptable envelope falls through
        // to the next layer.
        let password = self.codec.decrypt(envelope)?;
        Some(Credentials { username, password })
    }

    fn from_contextual(&self, device: &DeviceRecord) -> Option<Credentials> {
        device
            .platform
            .as_deref()
            .and_then(|p| self.contextual.get(p))
            .or_else(|| device.role.as_deref().and_then(|r| self.contextual.get(r)))
            .cloned()
    }

    async fn from_secret_store(&self, device: &DeviceRecord) -> Vec<Credentials> {
        let Some(registry_id) = device.registry_id.as_deref() else {
            return Vec::new();
        };
        let secrets = match self.registry.device_secrets(registry_id).await {
            Ok(secrets) => secrets,
            Err(err) => {
                debug!(device = %device.id, error = %err, "secret store lookup failed");
                return Vec::new();
            }
        };
        pair_secrets(&secrets)
    }
}

/// Turn raw registry secrets into credentials.
///
/// Two shapes exist in the wild: secrets that carry their own username, and
/// split secrets where one entry named like a login holds the username and
/// another named like a password holds the password.
fn pair_secrets(secrets: &[RegistrySecret]) -> Vec<Credentials> {
    let mut out = Vec::new();

    for secret in secrets {
        if let Some(username) = &secret.username {
            out.push(Credentials::new(username.clone(), secret.plaintext.clone()));
        }
    }

    let username_part = secrets
        .iter()
        .find(|s| s.username.is_none() && name_looks_like_login(&s.name));
    let password_part = secrets
        .iter()
        .find(|s| s.username.is_none() && name_looks_like_password(&s.name));
    if let (Some(user), Some(pass)) = (username_part, password_part) {
        out.push(Credentials::new(user.plaintext.clone(), pass.plaintext.clone()));
    }

    out
}

fn name_looks_like_login(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("user") || lower.contains("login")
}

fn name_looks_like_password(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("pass") || lower.contains("secret")
}
