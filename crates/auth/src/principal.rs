use serde::{Deserialize, Serialize};

use netops_core::{TenantId, UserId};

use crate::Role;

/// Identity of an authenticated caller plus the scope it acts within.
///
/// This is an authorization boundary object: every scope decision in the
/// control plane (job visibility, session ownership) goes through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    /// Tenant the caller acts within. `None` for cross-tenant service accounts.
    pub tenant_id: Option<TenantId>,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(user_id: UserId, tenant_id: Option<TenantId>, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            tenant_id,
            roles,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// Whether this principal may touch resources belonging to `tenant`.
    ///
    /// Admins cross tenant boundaries; everyone else must match.
    pub fn can_access_tenant(&self, tenant: TenantId) -> bool {
        self.is_admin() || self.tenant_id == Some(tenant)
    }

    /// Whether this principal may act on behalf of `owner`.
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_crosses_tenant_boundaries() {
        let tenant = TenantId::new();
        let other = TenantId::new();
        let admin = Principal::new(UserId::new(), Some(tenant), vec![Role::Admin]);
        assert!(admin.can_access_tenant(other));
    }

    #[test]
    fn operator_is_tenant_scoped() {
        let tenant = TenantId::new();
        let other = TenantId::new();
        let op = Principal::new(UserId::new(), Some(tenant), vec![Role::Operator]);
        assert!(op.can_access_tenant(tenant));
        assert!(!op.can_access_tenant(other));
    }

    #[test]
    fn only_owner_or_admin_acts_for_user() {
        let owner = UserId::new();
        let op = Principal::new(owner, None, vec![Role::Operator]);
        assert!(op.can_act_for(owner));
        assert!(!op.can_act_for(UserId::new()));
    }
}
