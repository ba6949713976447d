//! `RoleStore`: membership sets for the three registry roles.
//!
//! The store itself does no authorization; `Registry` runs the access
//! gate before calling any mutator here.

use std::collections::BTreeSet;

use crate::types::{Address, Role};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoleStore {
    admins: BTreeSet<Address>,
    contributors: BTreeSet<Address>,
    verifiers: BTreeSet<Address>,
}

impl RoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.set(role).contains(account)
    }

    /// Members of `role`, sorted by address.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.set(role).iter().copied().collect()
    }

    /// Returns `true` when `account` was not already a member.
    pub(crate) fn insert(&mut self, role: Role, account: Address) -> bool {
        self.set_mut(role).insert(account)
    }

    /// Returns `true` when `account` was a member.
    pub(crate) fn remove(&mut self, role: Role, account: &Address) -> bool {
        self.set_mut(role).remove(account)
    }

    fn set(&self, role: Role) -> &BTreeSet<Address> {
        match role {
            Role::Admin => &self.admins,
            Role::Contributor => &self.contributors,
            Role::Verifier => &self.verifiers,
        }
    }

    fn set_mut(&mut self, role: Role) -> &mut BTreeSet<Address> {
        match role {
            Role::Admin => &mut self.admins,
            Role::Contributor => &mut self.contributors,
            Role::Verifier => &mut self.verifiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_independent_sets() {
        let mut roles = RoleStore::new();
        let account = Address([7; 20]);

        assert!(roles.insert(Role::Contributor, account));
        assert!(roles.has_role(Role::Contributor, &account));
        assert!(!roles.has_role(Role::Verifier, &account));
        assert!(!roles.has_role(Role::Admin, &account));
    }

    #[test]
    fn insert_and_remove_report_changes() {
        let mut roles = RoleStore::new();
        let account = Address([1; 20]);

        assert!(roles.insert(Role::Verifier, account));
        assert!(!roles.insert(Role::Verifier, account));
        assert!(roles.remove(Role::Verifier, &account));
        assert!(!roles.remove(Role::Verifier, &account));
    }

    #[test]
    fn members_are_sorted() {
        let mut roles = RoleStore::new();
        roles.insert(Role::Contributor, Address([9; 20]));
        roles.insert(Role::Contributor, Address([2; 20]));

        assert_eq!(
            roles.members(Role::Contributor),
            vec![Address([2; 20]), Address([9; 20])]
        );
        assert!(roles.members(Role::Admin).is_empty());
    }
}
