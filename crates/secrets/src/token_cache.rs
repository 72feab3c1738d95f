//! Explicit cache for short-lived secrets (API tokens, resolved credentials).
//!
//! Replaces ambient module-level caches: the cache is an injected service
//! with a pluggable backing store, so single-process deployments use the
//! in-memory store and multi-process deployments can swap in a shared one.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Backing store for cached entries.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedEntry>;
    fn put(&self, key: &str, entry: CachedEntry);
    fn remove(&self, key: &str);
}

#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// In-memory store for single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, key: &str) -> Option<CachedEntry> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CachedEntry) {
        self.entries.write().unwrap().insert(key.to_string(), entry);
    }

    fn remove(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }
}

impl<S: TokenStore + ?Sized> TokenStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<CachedEntry> {
        (**self).get(key)
    }

    fn put(&self, key: &str, entry: CachedEntry) {
        (**self).put(key, entry)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

/// Expiry-aware cache facade over a [`TokenStore`].
pub struct TokenCache<S: TokenStore> {
    store: S,
    ttl: Duration,
}

impl<S: TokenStore> TokenCache<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Fetch a live entry, dropping it if expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.store.get(key)?;
        if entry.expires_at <= Utc::now() {
            self.store.remove(key);
            return None;
        }
        Some(entry.value)
    }

    /// Store a value with the configured TTL.
    pub fn put(&self, key: &str, value: impl Into<String>) {
        self.store.put(
            key,
            CachedEntry {
                value: value.into(),
                expires_at: Utc::now() + self.ttl,
            },
        );
    }

    /// Drop a cached value (e.g. after the upstream rejected it).
    pub fn invalidate(&self, key: &str) {
        self.store.remove(key);
    }
}
