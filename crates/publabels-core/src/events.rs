//! Notification log for audit consumers.
//!
//! Every state change in the registry is described by an [`Event`]. Events
//! are wrapped in sequenced [`EventRecord`]s, handed to the registered
//! [`EventSink`]s and kept in an in-memory [`EventLog`]. Replaying the
//! records from sequence 0 rebuilds the registry.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::CoreError;
use crate::types::{page_range, Address, ChangeId, EntryState, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
    /// The published entry for `identifier` changed.
    EntryChange {
        identifier: Address,
        label: String,
        state: EntryState,
        submitter: Address,
    },
    /// A change was submitted (`Pending`) or reviewed.
    PendingChange {
        change_id: ChangeId,
        identifier: Address,
        label: String,
        state: EntryState,
        submitter: Address,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    pub event: Event,
}

/// Receives each batch of records before the registry applies it. A sink
/// error aborts the call that produced the batch.
pub trait EventSink: Send + Sync {
    /// Accept a batch. On error the sink must hold none of it.
    fn publish(&mut self, records: &[EventRecord]) -> Result<(), CoreError>;

    /// Drop the batch accepted by the last successful `publish`. Called when
    /// a sink registered after this one refuses the same batch.
    fn retract(&mut self, _records: &[EventRecord]) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Ordered in-memory copy of every record emitted so far.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn next_sequence(&self) -> u64 {
        self.records.len() as u64
    }

    /// Records with `sequence >= since`, at most `limit` of them.
    pub fn since(&self, since: u64, limit: usize) -> &[EventRecord] {
        let start = usize::try_from(since).unwrap_or(usize::MAX);
        &self.records[page_range(self.records.len(), start, limit)]
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub(crate) fn append(&mut self, records: &[EventRecord]) {
        self.records.extend_from_slice(records);
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, records: &[EventRecord]) -> Result<(), CoreError> {
        self.append(records);
        Ok(())
    }

    fn retract(&mut self, records: &[EventRecord]) -> Result<(), CoreError> {
        let keep = self.records.len().saturating_sub(records.len());
        self.records.truncate(keep);
        Ok(())
    }
}
