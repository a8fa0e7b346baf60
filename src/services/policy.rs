//! Pure policy evaluation: (subject, resource, action) -> decision.
//!
//! Deny-by-default. The engine holds no mutable state and performs no I/O;
//! callers resolve the principal and resource snapshots first, which makes
//! every evaluation deterministic and repeatable.
//!
//! Rule order for resource actions:
//! 1. a locked principal is denied outright
//! 2. public resource + read -> allow (anonymous included)
//! 3. owner -> allow, any action
//! 4. role override grant for the action -> allow
//! 5. otherwise deny
//!
//! Administrative actions never consult ownership: they are decided purely
//! by role.

use std::collections::{HashMap, HashSet};

use crate::repos::principal_repo::{Principal, Role};
use crate::repos::resource_repo::{Resource, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
        }
    }
}

/// Function-level administrative operations, gated by role alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    CreatePrincipal,
    SetRole,
    LockPrincipal,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::CreatePrincipal => "admin.create_principal",
            AdminAction::SetRole => "admin.set_role",
            AdminAction::LockPrincipal => "admin.lock_principal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    PublicRead,
    Owner,
    RoleOverride,
    AdminRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    PrincipalLocked,
    NoMatchingRule,
    AdminRoleRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(AllowReason),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// Stable code for audit entries.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Decision::Allow(AllowReason::PublicRead) => "public_read",
            Decision::Allow(AllowReason::Owner) => "owner",
            Decision::Allow(AllowReason::RoleOverride) => "role_override",
            Decision::Allow(AllowReason::AdminRole) => "admin_role",
            Decision::Deny(DenyReason::PrincipalLocked) => "principal_locked",
            Decision::Deny(DenyReason::NoMatchingRule) => "no_matching_rule",
            Decision::Deny(DenyReason::AdminRoleRequired) => "admin_role_required",
        }
    }
}

/// Explicit role -> action override grants.
///
/// Absence of a grant means deny; there is no wildcard.
#[derive(Debug, Clone)]
pub struct RoleGrants {
    grants: HashMap<Role, HashSet<Action>>,
}

impl Default for RoleGrants {
    fn default() -> Self {
        let mut grants: HashMap<Role, HashSet<Action>> = HashMap::new();
        grants.insert(
            Role::Admin,
            [Action::Read, Action::Write, Action::Delete]
                .into_iter()
                .collect(),
        );
        Self { grants }
    }
}

impl RoleGrants {
    pub fn empty() -> Self {
        Self {
            grants: HashMap::new(),
        }
    }

    pub fn grant(&mut self, role: Role, action: Action) {
        self.grants.entry(role).or_default().insert(action);
    }

    pub fn allows(&self, role: Role, action: Action) -> bool {
        self.grants.get(&role).is_some_and(|set| set.contains(&action))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    grants: RoleGrants,
}

impl PolicyEngine {
    pub fn new(grants: RoleGrants) -> Self {
        Self { grants }
    }

    /// Evaluate a resource action. `subject` is `None` for anonymous
    /// callers.
    pub fn authorize(
        &self,
        subject: Option<&Principal>,
        resource: &Resource,
        action: Action,
    ) -> Decision {
        if let Some(principal) = subject {
            if !principal.is_active() {
                return Decision::Deny(DenyReason::PrincipalLocked);
            }
        }

        if resource.visibility == Visibility::Public && action == Action::Read {
            return Decision::Allow(AllowReason::PublicRead);
        }

        if let Some(principal) = subject {
            if principal.id == resource.owner {
                return Decision::Allow(AllowReason::Owner);
            }
            if self.grants.allows(principal.role, action) {
                return Decision::Allow(AllowReason::RoleOverride);
            }
        }

        Decision::Deny(DenyReason::NoMatchingRule)
    }

    /// Evaluate an administrative action. Ownership never substitutes for
    /// the role check.
    pub fn authorize_admin(&self, subject: Option<&Principal>, _action: AdminAction) -> Decision {
        match subject {
            Some(principal) if !principal.is_active() => {
                Decision::Deny(DenyReason::PrincipalLocked)
            }
            Some(principal) if principal.role == Role::Admin => {
                Decision::Allow(AllowReason::AdminRole)
            }
            _ => Decision::Deny(DenyReason::AdminRoleRequired),
        }
    }
}
