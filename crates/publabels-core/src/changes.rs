//! `PendingChangeLog`: the append-only history of proposed label changes.
//!
//! A change's id is its index in the log. Changes are never removed; review
//! only moves them from `Pending` to `Verified` or `Rejected`.

use crate::error::InvalidChangeReason;
use crate::types::{page_range, Address, ChangeId, Entry, EntryState, PendingChange};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingChangeLog {
    changes: Vec<PendingChange>,
}

impl PendingChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Id the next appended change will receive.
    pub fn next_id(&self) -> ChangeId {
        self.changes.len() as ChangeId
    }

    pub fn get(&self, change_id: ChangeId) -> Option<&PendingChange> {
        usize::try_from(change_id)
            .ok()
            .and_then(|idx| self.changes.get(idx))
    }

    /// All changes (any state) in submission order, clamped to the log.
    pub fn page(&self, start: usize, limit: usize) -> &[PendingChange] {
        &self.changes[page_range(self.changes.len(), start, limit)]
    }

    /// Check that `change_id` exists and is still awaiting review.
    pub fn check_reviewable(
        &self,
        change_id: ChangeId,
    ) -> Result<&PendingChange, InvalidChangeReason> {
        let change = self.get(change_id).ok_or(InvalidChangeReason::OutOfRange {
            len: self.next_id(),
        })?;
        if change.entry.state != EntryState::Pending {
            return Err(InvalidChangeReason::AlreadyFinal(change.entry.state));
        }
        Ok(change)
    }

    pub(crate) fn append(
        &mut self,
        identifier: Address,
        label: String,
        submitter: Address,
    ) -> ChangeId {
        let change_id = self.next_id();
        self.changes.push(PendingChange {
            change_id,
            identifier,
            entry: Entry {
                label,
                state: EntryState::Pending,
                submitter,
            },
        });
        change_id
    }

    /// Overwrite the state of a change. Callers validate the transition
    /// with [`check_reviewable`](Self::check_reviewable) first.
    pub(crate) fn mark(&mut self, change_id: ChangeId, state: EntryState) {
        if let Some(change) = usize::try_from(change_id)
            .ok()
            .and_then(|idx| self.changes.get_mut(idx))
        {
            change.entry.state = state;
        }
    }
}
