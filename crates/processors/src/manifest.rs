//! Backup manifest: a line-oriented device list with a managed region.
//!
//! The file may contain hand-maintained content; this module only ever
//! rewrites the block between the sentinel comments. Parsing a file with no
//! managed region yields an empty region that gets appended on rewrite.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

pub const MANAGED_BEGIN: &str = "# BEGIN NETOPS MANAGED";
pub const MANAGED_END: &str = "# END NETOPS MANAGED";

/// One manifest line: `name:ip:model:input:login:pass:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub ip: String,
    pub model: String,
    pub login: String,
    pub password: String,
    pub port: u16,
}

impl ManifestEntry {
    /// Render the colon-delimited line. Fields are sanitized so a hostile
    /// name or password cannot inject extra fields or lines.
    pub fn render(&self) -> String {
        format!(
            "{}:{}:{}:ssh:{}:{}:{}",
            sanitize_field(&self.name),
            sanitize_field(&self.ip),
            sanitize_field(&self.model),
            sanitize_field(&self.login),
            sanitize_field(&self.password),
            self.port,
        )
    }
}

fn sanitize_field(value: &str) -> String {
    value
        .replace(['\n', '\r', ':'], " ")
        .trim()
        .to_string()
}

/// Map a device's model/manufacturer strings onto a backup collector model.
pub fn guess_model(model: Option<&str>, manufacturer: Option<&str>) -> &'static str {
    let model = model.unwrap_or_default().to_lowercase();
    let vendor = manufacturer.unwrap_or_default().to_lowercase();
    if model.contains("vrp") || vendor.contains("huawei") {
        "vrp"
    } else if model.contains("junos") || vendor.contains("juniper") {
        "junos"
    } else if model.contains("nx") || vendor.contains("nexus") {
        "nxos"
    } else if model.contains("forti") || vendor.contains("fortinet") {
        "fortios"
    } else {
        "ios"
    }
}

/// Split a manifest into (before, managed-lines, after). A file without
/// sentinels has everything in `before` and an empty region.
fn split_regions(content: &str) -> (String, Vec<String>, String) {
    let Some(begin) = content.find(MANAGED_BEGIN) else {
        return (content.to_string(), Vec::new(), String::new());
    };
    let after_begin = begin + MANAGED_BEGIN.len();
    let Some(end_rel) = content[after_begin..].find(MANAGED_END) else {
        // Unterminated region: treat the sentinel as unmanaged content.
        return (content.to_string(), Vec::new(), String::new());
    };
    let end = after_begin + end_rel;

    let before = content[..begin].to_string();
    let body = content[after_begin..end]
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    let after = content[end + MANAGED_END.len()..].to_string();
    (before, body, after)
}

/// Replace (or append) the managed region, preserving everything outside it
/// byte-for-byte.
pub fn replace_managed_region(content: &str, lines: &[String]) -> String {
    let block = if lines.is_empty() {
        format!("{MANAGED_BEGIN}\n{MANAGED_END}")
    } else {
        format!("{MANAGED_BEGIN}\n{}\n{MANAGED_END}", lines.join("\n"))
    };

    let (before, _, after) = split_regions(content);
    if content.contains(MANAGED_BEGIN) && content.contains(MANAGED_END) {
        format!("{before}{block}{after}")
    } else if content.trim_end().is_empty() {
        format!("{block}\n")
    } else {
        format!("{}\n{block}\n", content.trim_end())
    }
}

/// Serialized writer around the manifest file. The mutex is the
/// single-writer discipline: concurrent backup syncs queue up here.
pub struct ManifestWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ManifestWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the managed region with the given entries. Returns the
    /// number of lines written.
    pub async fn rewrite(&self, entries: &[ManifestEntry]) -> std::io::Result<usize> {
        let _guard = self.lock.lock().await;

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                String::new()
            }
            Err(err) => return Err(err),
        };

        let lines: Vec<String> = entries.iter().map(ManifestEntry::render).collect();
        let updated = replace_managed_region(&content, &lines);
        tokio::fs::write(&self.path, updated).await?;
        debug!(path = %self.path.display(), entries = lines.len(), "manifest rewritten");
        Ok(lines.len())
    }
}
