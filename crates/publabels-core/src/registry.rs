//! `Registry`: the aggregate that owns roles, the pending-change log, the
//! published entries and the event log.
//!
//! Every mutator follows the same shape:
//! 1. run the access gate for the caller,
//! 2. validate the whole input,
//! 3. describe the effect as a list of [`Event`]s,
//! 4. publish the events to every sink,
//! 5. apply them to state.
//!
//! A failure in steps 1-4 leaves state untouched, so calls are all-or-nothing.
//! Step 5 is the same code that journal replay uses to rebuild a registry.

use std::collections::HashSet;
use std::path::Path;

use time::OffsetDateTime;

use crate::changes::PendingChangeLog;
use crate::entries::EntryStore;
use crate::error::{CoreError, InvalidChangeReason, RegistryError};
use crate::events::{Event, EventLog, EventRecord, EventSink};
use crate::journal::{read_journal, JournalWriter};
use crate::policy::{authorize, Operation};
use crate::roles::RoleStore;
use crate::types::{Address, ChangeId, Entry, EntryState, PendingChange, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Let verifiers approve and reject pending changes. Off by default,
    /// leaving review to admins.
    pub verifiers_review: bool,
}

pub struct Registry {
    config: RegistryConfig,
    roles: RoleStore,
    changes: PendingChangeLog,
    entries: EntryStore,
    events: EventLog,
    sinks: Vec<Box<dyn EventSink>>,
    poisoned: bool,
}

impl Registry {
    /// A fresh registry whose only member is `deployer`, holding Admin.
    pub fn new(deployer: Address) -> Self {
        Self::with_config(deployer, RegistryConfig::default())
    }

    pub fn with_config(deployer: Address, config: RegistryConfig) -> Self {
        let mut registry = Self::empty(config);
        let records = registry.stamp(vec![Event::RoleGranted {
            role: Role::Admin,
            account: deployer,
            sender: deployer,
        }]);
        registry.apply_records(records);
        registry
    }

    /// Open a journal-backed registry. An existing journal is replayed and
    /// `deployer` is ignored; otherwise a fresh registry is created and its
    /// admin grant becomes the first journal record.
    pub fn open(
        path: &Path,
        deployer: Address,
        config: RegistryConfig,
    ) -> Result<Self, CoreError> {
        let records = read_journal(path)?;
        let fresh = records.is_empty();

        let mut registry = if fresh {
            Self::with_config(deployer, config)
        } else {
            let registry = Self::replay(records, config)?;
            tracing::info!(
                path = %path.display(),
                events = registry.events.len(),
                changes = registry.changes.len(),
                entries = registry.entries.len(),
                "replayed journal"
            );
            if !registry.has_role(Role::Admin, &deployer) {
                tracing::warn!(
                    %deployer,
                    "configured admin is not an admin in the replayed journal"
                );
            }
            registry
        };

        let mut writer = JournalWriter::open(path)?;
        if fresh {
            writer.publish(registry.events.records())?;
        }
        registry.add_sink(Box::new(writer));
        Ok(registry)
    }

    /// Rebuild a registry from journal records, checking that the sequence
    /// is contiguous and every transition is legal. Errors name the line.
    pub fn replay(
        records: Vec<(usize, EventRecord)>,
        config: RegistryConfig,
    ) -> Result<Self, CoreError> {
        let mut registry = Self::empty(config);
        for (line, record) in records {
            registry
                .check_replayable(&record)
                .map_err(|message| CoreError::Journal { line, message })?;
            registry.apply_records(vec![record]);
        }
        Ok(registry)
    }

    /// Register an additional consumer of event batches.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    fn empty(config: RegistryConfig) -> Self {
        Self {
            config,
            roles: RoleStore::new(),
            changes: PendingChangeLog::new(),
            entries: EntryStore::new(),
            events: EventLog::new(),
            sinks: Vec::new(),
            poisoned: false,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles.has_role(role, account)
    }

    pub fn members(&self, role: Role) -> Vec<Address> {
        self.roles.members(role)
    }

    /// Changes in submission order, whatever their state.
    pub fn pending_changes(&self, start: usize, limit: usize) -> &[PendingChange] {
        self.changes.page(start, limit)
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn all_entries(&self, start: usize, limit: usize) -> Vec<(Address, Entry)> {
        self.entries.page(start, limit)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get_entries(&self, identifiers: &[Address]) -> Vec<Entry> {
        self.entries.get_many(identifiers)
    }

    pub fn events(&self, since: u64, limit: usize) -> &[EventRecord] {
        self.events.since(since, limit)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // ========================================================================
    // Role management
    // ========================================================================

    /// Grant `role` to `account`. Returns `false` when it already held it;
    /// that case succeeds without emitting anything.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> Result<bool, RegistryError> {
        self.authorize(caller, Operation::GrantRole)?;
        if self.roles.has_role(role, &account) {
            return Ok(false);
        }

        self.commit(vec![Event::RoleGranted {
            role,
            account,
            sender: *caller,
        }])?;
        tracing::info!(%role, %account, sender = %caller, "role granted");
        Ok(true)
    }

    /// Revoke `role` from `account`. Returns `false` when it did not hold it.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> Result<bool, RegistryError> {
        self.authorize(caller, Operation::RevokeRole)?;
        if !self.roles.has_role(role, &account) {
            return Ok(false);
        }

        self.commit(vec![Event::RoleRevoked {
            role,
            account,
            sender: *caller,
        }])?;
        tracing::info!(%role, %account, sender = %caller, "role revoked");
        Ok(true)
    }

    pub fn add_contributor(
        &mut self,
        caller: &Address,
        account: Address,
    ) -> Result<bool, RegistryError> {
        self.grant_role(caller, Role::Contributor, account)
    }

    pub fn remove_contributor(
        &mut self,
        caller: &Address,
        account: Address,
    ) -> Result<bool, RegistryError> {
        self.revoke_role(caller, Role::Contributor, account)
    }

    pub fn add_verifier(
        &mut self,
        caller: &Address,
        account: Address,
    ) -> Result<bool, RegistryError> {
        self.grant_role(caller, Role::Verifier, account)
    }

    pub fn remove_verifier(
        &mut self,
        caller: &Address,
        account: Address,
    ) -> Result<bool, RegistryError> {
        self.revoke_role(caller, Role::Verifier, account)
    }

    // ========================================================================
    // Labels and review
    // ========================================================================

    /// Submit `(identifier, label)` pairs.
    ///
    /// Admins publish directly as verified and get an empty list back.
    /// Contributors append one pending change per pair and get the assigned
    /// change ids back, in input order.
    pub fn set_labels(
        &mut self,
        caller: &Address,
        identifiers: &[Address],
        labels: &[String],
    ) -> Result<Vec<ChangeId>, RegistryError> {
        self.authorize(caller, Operation::SetLabels)?;
        if identifiers.len() != labels.len() {
            return Err(RegistryError::LengthMismatch {
                identifiers: identifiers.len(),
                labels: labels.len(),
            });
        }

        let pairs = identifiers.iter().zip(labels);
        if self.roles.has_role(Role::Admin, caller) {
            let events = pairs
                .map(|(identifier, label)| Event::EntryChange {
                    identifier: *identifier,
                    label: label.clone(),
                    state: EntryState::Verified,
                    submitter: *caller,
                })
                .collect();
            self.commit(events)?;
            tracing::debug!(%caller, count = identifiers.len(), "admin labels published");
            return Ok(Vec::new());
        }

        let first_id = self.changes.next_id();
        let change_ids: Vec<ChangeId> = (first_id..).take(identifiers.len()).collect();
        let events = pairs
            .zip(&change_ids)
            .map(|((identifier, label), change_id)| Event::PendingChange {
                change_id: *change_id,
                identifier: *identifier,
                label: label.clone(),
                state: EntryState::Pending,
                submitter: *caller,
            })
            .collect();
        self.commit(events)?;
        tracing::debug!(%caller, ?change_ids, "pending changes submitted");
        Ok(change_ids)
    }

    /// Approve pending changes and publish them. Fails without effect if any
    /// id is unknown, already reviewed, or repeated in the batch.
    pub fn approve_pending_changes(
        &mut self,
        caller: &Address,
        change_ids: &[ChangeId],
    ) -> Result<(), RegistryError> {
        self.authorize(caller, Operation::ApprovePendingChanges)?;
        let changes = self.reviewable(change_ids, EntryState::Verified)?;

        let events = changes
            .into_iter()
            .flat_map(|change| {
                [
                    Event::PendingChange {
                        change_id: change.change_id,
                        identifier: change.identifier,
                        label: change.entry.label.clone(),
                        state: EntryState::Verified,
                        submitter: change.entry.submitter,
                    },
                    Event::EntryChange {
                        identifier: change.identifier,
                        label: change.entry.label,
                        state: EntryState::Verified,
                        submitter: change.entry.submitter,
                    },
                ]
            })
            .collect();
        self.commit(events)?;
        tracing::info!(%caller, ?change_ids, "pending changes approved");
        Ok(())
    }

    /// Reject pending changes. Published entries are not touched.
    pub fn reject_pending_changes(
        &mut self,
        caller: &Address,
        change_ids: &[ChangeId],
    ) -> Result<(), RegistryError> {
        self.authorize(caller, Operation::RejectPendingChanges)?;
        let changes = self.reviewable(change_ids, EntryState::Rejected)?;

        let events = changes
            .into_iter()
            .map(|change| Event::PendingChange {
                change_id: change.change_id,
                identifier: change.identifier,
                label: change.entry.label,
                state: EntryState::Rejected,
                submitter: change.entry.submitter,
            })
            .collect();
        self.commit(events)?;
        tracing::info!(%caller, ?change_ids, "pending changes rejected");
        Ok(())
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn authorize(&self, caller: &Address, operation: Operation) -> Result<(), RegistryError> {
        authorize(&self.roles, caller, operation, self.config.verifiers_review)
    }

    /// Validate a review batch up front. A repeated id is refused as if the
    /// first occurrence had already moved it to `target`.
    fn reviewable(
        &self,
        change_ids: &[ChangeId],
        target: EntryState,
    ) -> Result<Vec<PendingChange>, RegistryError> {
        let mut seen = HashSet::new();
        change_ids
            .iter()
            .map(|&change_id| {
                if !seen.insert(change_id) {
                    return Err(RegistryError::InvalidChangeId {
                        change_id,
                        reason: InvalidChangeReason::AlreadyFinal(target),
                    });
                }
                self.changes
                    .check_reviewable(change_id)
                    .cloned()
                    .map_err(|reason| RegistryError::InvalidChangeId { change_id, reason })
            })
            .collect()
    }

    fn stamp(&self, events: Vec<Event>) -> Vec<EventRecord> {
        let recorded_at = OffsetDateTime::now_utc();
        let first = self.events.next_sequence();
        events
            .into_iter()
            .zip(first..)
            .map(|(event, sequence)| EventRecord {
                sequence,
                recorded_at,
                event,
            })
            .collect()
    }

    /// Publish to every sink, then apply. If a sink refuses the batch, the
    /// sinks that already took it retract it and nothing is applied. A sink
    /// that cannot undo its part poisons the registry for further writes.
    fn commit(&mut self, events: Vec<Event>) -> Result<(), RegistryError> {
        if self.poisoned {
            return Err(CoreError::Poisoned.into());
        }
        if events.is_empty() {
            return Ok(());
        }
        let records = self.stamp(events);
        for index in 0..self.sinks.len() {
            if let Err(e) = self.sinks[index].publish(&records) {
                if matches!(e, CoreError::Rollback(_)) {
                    self.poison();
                }
                self.retract_published(index, &records);
                return Err(e.into());
            }
        }
        self.apply_records(records);
        Ok(())
    }

    /// Retract `records` from the first `count` sinks, newest first.
    fn retract_published(&mut self, count: usize, records: &[EventRecord]) {
        let mut stuck = false;
        for sink in self.sinks[..count].iter_mut().rev() {
            if let Err(e) = sink.retract(records) {
                tracing::error!(error = %e, "sink could not retract a refused batch");
                stuck = true;
            }
        }
        if stuck {
            self.poison();
        }
    }

    fn poison(&mut self) {
        self.poisoned = true;
        tracing::error!("registry refuses further writes until reopened");
    }

    fn apply_records(&mut self, records: Vec<EventRecord>) {
        for record in &records {
            self.apply(&record.event);
        }
        self.events.append(&records);
    }

    fn apply(&mut self, event: &Event) {
        match event {
            Event::RoleGranted { role, account, .. } => {
                self.roles.insert(*role, *account);
            }
            Event::RoleRevoked { role, account, .. } => {
                self.roles.remove(*role, account);
            }
            Event::EntryChange {
                identifier,
                label,
                state,
                submitter,
            } => self.entries.write(
                *identifier,
                Entry {
                    label: label.clone(),
                    state: *state,
                    submitter: *submitter,
                },
            ),
            Event::PendingChange {
                identifier,
                label,
                state: EntryState::Pending,
                submitter,
                ..
            } => {
                self.changes.append(*identifier, label.clone(), *submitter);
            }
            Event::PendingChange {
                change_id, state, ..
            } => self.changes.mark(*change_id, *state),
        }
    }

    fn check_replayable(&self, record: &EventRecord) -> Result<(), String> {
        let expected = self.events.next_sequence();
        if record.sequence != expected {
            return Err(format!(
                "expected sequence {expected}, found {}",
                record.sequence
            ));
        }

        match &record.event {
            Event::PendingChange {
                change_id,
                state: EntryState::Pending,
                ..
            } => {
                let next = self.changes.next_id();
                if *change_id != next {
                    return Err(format!(
                        "change {change_id} submitted out of order, next id is {next}"
                    ));
                }
            }
            Event::PendingChange {
                change_id,
                state: EntryState::Unset,
                ..
            } => return Err(format!("change {change_id} cannot move to unset")),
            Event::PendingChange { change_id, .. } => {
                self.changes
                    .check_reviewable(*change_id)
                    .map_err(|reason| format!("change {change_id}: {reason}"))?;
            }
            Event::RoleGranted { .. } | Event::RoleRevoked { .. } | Event::EntryChange { .. } => {}
        }
        Ok(())
    }
}
