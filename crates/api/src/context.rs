use netops_auth::{Principal, Role};
use netops_core::{TenantId, UserId};

/// Tenant context for a request.
///
/// `None` means a cross-tenant service principal; tenant-scoped handlers
/// treat that as admin-or-deny.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
}

impl TenantContext {
    pub fn new(tenant_id: Option<TenantId>) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }
}

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, tenant_id: Option<TenantId>, roles: Vec<Role>) -> Self {
        Self {
            principal: Principal::new(user_id, tenant_id, roles),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
