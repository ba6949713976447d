//! `EntryStore`: the published mapping from identifier to entry.

use std::collections::HashMap;

use crate::types::{page_range, Address, Entry};

/// Current entry per identifier, with first-insertion order kept for scans.
/// Rewriting an identifier updates it in place without moving it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryStore {
    entries: HashMap<Address, Entry>,
    order: Vec<Address>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, identifier: &Address) -> Option<&Entry> {
        self.entries.get(identifier)
    }

    /// One entry per requested identifier, in request order. Identifiers
    /// never published come back as `Entry::default()`.
    pub fn get_many(&self, identifiers: &[Address]) -> Vec<Entry> {
        identifiers
            .iter()
            .map(|id| self.entries.get(id).cloned().unwrap_or_default())
            .collect()
    }

    pub fn page(&self, start: usize, limit: usize) -> Vec<(Address, Entry)> {
        self.order[page_range(self.order.len(), start, limit)]
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| (*id, entry.clone())))
            .collect()
    }

    pub(crate) fn write(&mut self, identifier: Address, entry: Entry) {
        if self.entries.insert(identifier, entry).is_none() {
            self.order.push(identifier);
        }
    }
}
