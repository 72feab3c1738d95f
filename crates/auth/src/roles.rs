use serde::{Deserialize, Serialize};

/// RBAC role granted within a tenant context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access across tenants, including other users' sessions.
    Admin,
    /// Can trigger jobs and open sessions within the own tenant.
    Operator,
    /// Read-only access to job status and session transcripts.
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        }
    }
}
