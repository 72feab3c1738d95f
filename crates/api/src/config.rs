//! Process configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub snmp_poll_interval: Duration,
    pub backup_sync_interval: Duration,
    pub pending_refresh_interval: Duration,
    /// `None` disables the periodic registry sync.
    pub inventory_sync_interval: Option<Duration>,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        let inventory_sync_interval = std::env::var("NETOPS_INVENTORY_SYNC_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);
        Self {
            snmp_poll_interval: env_secs("NETOPS_SNMP_POLL_SECS", 300),
            backup_sync_interval: env_secs("NETOPS_BACKUP_SYNC_SECS", 3600),
            pending_refresh_interval: env_secs("NETOPS_PENDING_REFRESH_SECS", 900),
            inventory_sync_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Key material for the secret codec (device credential envelopes).
    pub encryption_secret: String,
    pub transcript_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub scheduler: SchedulerConfig,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });
        let encryption_secret = std::env::var("NETOPS_ENCRYPTION_SECRET").unwrap_or_else(|_| {
            tracing::warn!("NETOPS_ENCRYPTION_SECRET not set; using insecure dev default");
            "dev-encryption-secret".to_string()
        });
        Self {
            bind_addr: env_or("NETOPS_BIND", "0.0.0.0:8080"),
            jwt_secret,
            encryption_secret,
            transcript_dir: env_or("NETOPS_TRANSCRIPT_DIR", "data/transcripts").into(),
            manifest_path: env_or("NETOPS_MANIFEST_PATH", "data/backup/router.db").into(),
            scheduler: SchedulerConfig::from_env(),
        }
    }
}
