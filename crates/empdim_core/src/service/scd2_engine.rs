//! SCD Type II versioning engine.
//!
//! # Responsibility
//! - Apply one typed change command against a `VersionedRecordStore`.
//! - Compose `close_current` and `append_version` into the close-then-insert
//!   protocol, carrying unchanged attributes forward.
//!
//! # Invariants
//! - Per command the state only moves forward:
//!   `Received -> Closed -> Versioned -> Done`, or `Received -> Failed`.
//! - A new version's attributes are the closed snapshot with only the
//!   patched fields replaced.
//! - The engine holds no state between commands; ordering is the caller's.

use crate::model::change::ChangeCommand;
use crate::model::employee::{AttributePatch, EntityId, SurrogateKey};
use crate::repo::version_repo::{StoreResult, VersionedRecordStore};
use chrono::NaiveDate;
use log::{debug, error};

/// Processing state of one change command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Received,
    Closed,
    Versioned,
    Done,
    Failed,
}

impl EventState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Closed => "closed",
            Self::Versioned => "versioned",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Store mutation performed for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedChange {
    Inserted {
        entity_id: EntityId,
        surrogate_key: SurrogateKey,
    },
    Versioned {
        entity_id: EntityId,
        closed_key: SurrogateKey,
        new_key: SurrogateKey,
        effective_date: NaiveDate,
    },
}

/// Applies change commands with close-then-insert semantics.
pub struct Scd2Engine<'store, S: VersionedRecordStore> {
    store: &'store S,
    today: NaiveDate,
}

impl<'store, S: VersionedRecordStore> Scd2Engine<'store, S> {
    /// `today` is the effective date of new entities and of attribute
    /// changes that carry no date of their own.
    pub fn new(store: &'store S, today: NaiveDate) -> Self {
        Self { store, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Applies one command.
    ///
    /// # Errors
    /// - `DuplicateEntity` for a new entity that already has a current row.
    /// - `NoCurrentVersion` for an attribute change on an unknown or
    ///   already-closed entity.
    /// - `Db` for any persistence failure.
    pub fn apply(&self, command: &ChangeCommand) -> StoreResult<AppliedChange> {
        let entity_id = command.entity_id();
        trace_state(entity_id, EventState::Received);

        let outcome = match command {
            ChangeCommand::NewEntity {
                entity_id,
                attributes,
            } => self
                .store
                .insert_new(entity_id, attributes, self.today)
                .map(|surrogate_key| AppliedChange::Inserted {
                    entity_id: entity_id.clone(),
                    surrogate_key,
                }),
            ChangeCommand::AttributeChange {
                entity_id,
                changes,
                effective_date,
            } => {
                let effective_date = effective_date.unwrap_or(self.today);
                self.version(entity_id, changes, effective_date)
            }
        };

        match &outcome {
            Ok(_) => trace_state(entity_id, EventState::Done),
            Err(err) => error!(
                "event=event_apply module=engine status=error state={} entity_id={} error={}",
                EventState::Failed.as_str(),
                entity_id,
                err
            ),
        }
        outcome
    }

    fn version(
        &self,
        entity_id: &EntityId,
        changes: &AttributePatch,
        effective_date: NaiveDate,
    ) -> StoreResult<AppliedChange> {
        let closed = self.store.close_current(entity_id, effective_date)?;
        trace_state(entity_id, EventState::Closed);

        let merged = closed.attributes.merged_with(changes);
        let new_key = self
            .store
            .append_version(entity_id, &merged, effective_date)?;
        trace_state(entity_id, EventState::Versioned);

        debug!(
            "event=event_apply module=engine entity_id={} closed_key={} new_key={} effective_date={} changed_fields={}",
            entity_id,
            closed.surrogate_key,
            new_key,
            effective_date,
            changes
                .changed_fields()
                .iter()
                .map(|field| field.column())
                .collect::<Vec<_>>()
                .join(",")
        );

        Ok(AppliedChange::Versioned {
            entity_id: entity_id.clone(),
            closed_key: closed.surrogate_key,
            new_key,
            effective_date,
        })
    }
}

fn trace_state(entity_id: &EntityId, state: EventState) {
    debug!(
        "event=event_apply module=engine state={} entity_id={}",
        state.as_str(),
        entity_id
    );
}
