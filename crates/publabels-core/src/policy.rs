//! Access gate: which roles may invoke which mutating operation.
//!
//! The table lives in [`policy_for`]; [`authorize`] is the single check every
//! mutator runs before touching state.

use crate::error::RegistryError;
use crate::roles::RoleStore;
use crate::types::{Address, Role};

/// Mutating entry points of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GrantRole,
    RevokeRole,
    SetLabels,
    ApprovePendingChanges,
    RejectPendingChanges,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GrantRole => write!(f, "grant roles"),
            Self::RevokeRole => write!(f, "revoke roles"),
            Self::SetLabels => write!(f, "set labels"),
            Self::ApprovePendingChanges => write!(f, "approve pending changes"),
            Self::RejectPendingChanges => write!(f, "reject pending changes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    AdminOnly,
    ContributorOrAdmin,
    VerifierOrAdmin,
}

impl Policy {
    pub fn allows(self, roles: &RoleStore, caller: &Address) -> bool {
        if roles.has_role(Role::Admin, caller) {
            return true;
        }
        match self {
            Self::AdminOnly => false,
            Self::ContributorOrAdmin => roles.has_role(Role::Contributor, caller),
            Self::VerifierOrAdmin => roles.has_role(Role::Verifier, caller),
        }
    }
}

/// Required policy for `operation`. Review operations are admin-only
/// unless `verifiers_review` opens them to verifiers.
pub fn policy_for(operation: Operation, verifiers_review: bool) -> Policy {
    match operation {
        Operation::GrantRole | Operation::RevokeRole => Policy::AdminOnly,
        Operation::SetLabels => Policy::ContributorOrAdmin,
        Operation::ApprovePendingChanges | Operation::RejectPendingChanges => {
            if verifiers_review {
                Policy::VerifierOrAdmin
            } else {
                Policy::AdminOnly
            }
        }
    }
}

pub fn authorize(
    roles: &RoleStore,
    caller: &Address,
    operation: Operation,
    verifiers_review: bool,
) -> Result<(), RegistryError> {
    if policy_for(operation, verifiers_review).allows(roles, caller) {
        return Ok(());
    }
    tracing::debug!(%caller, %operation, "access denied");
    Err(RegistryError::Unauthorized {
        caller: *caller,
        operation,
    })
}
