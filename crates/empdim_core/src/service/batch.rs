//! All-or-nothing batch execution.
//!
//! # Responsibility
//! - Run a sequence of change events inside one SQLite transaction.
//! - Report per-kind counts, skipped events and post-commit quality.
//!
//! # Invariants
//! - Events are applied strictly in input order.
//! - Any classification or store failure rolls back the entire batch.
//! - The transaction is opened with `BEGIN IMMEDIATE`, so the write lock is
//!   held before the first current row is read and concurrent batches are
//!   serialized.
//! - This is the only place that begins, commits or rolls back.

use crate::model::change::{ChangeEvent, ClassificationError};
use crate::model::employee::EntityId;
use crate::repo::version_repo::{SqliteVersionedRecordStore, StoreError};
use crate::service::classifier::{ChangeClassifier, Classification, UnknownKindPolicy};
use crate::service::quality::{QualityReport, QualityValidator};
use crate::service::scd2_engine::{AppliedChange, Scd2Engine};
use chrono::{Local, NaiveDate};
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Event left out of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEvent {
    /// Position in the input sequence.
    pub index: usize,
    pub entity_id: EntityId,
    pub kind: String,
    pub reason: String,
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Correlates this run's log lines.
    pub run_id: Uuid,
    pub inserted_count: usize,
    pub updated_count: usize,
    /// Non-empty only under `UnknownKindPolicy::Skip`.
    pub failed_events: Vec<FailedEvent>,
    pub applied: Vec<AppliedChange>,
    /// `None` when the read-only validation itself could not run.
    pub quality: Option<QualityReport>,
}

/// Why a single event aborted its batch.
#[derive(Debug)]
pub enum EventFailure {
    Classification(ClassificationError),
    Store(StoreError),
}

impl Display for EventFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EventFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Classification(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

/// Batch was rolled back; nothing it did is visible.
#[derive(Debug)]
pub enum BatchError {
    /// Beginning or committing the transaction failed.
    Transaction(StoreError),
    /// One event failed; every earlier event was rolled back with it.
    Event {
        index: usize,
        entity_id: EntityId,
        failure: EventFailure,
    },
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transaction(err) => write!(f, "batch transaction failed: {err}"),
            Self::Event {
                index,
                entity_id,
                failure,
            } => write!(
                f,
                "batch rolled back at event #{index} (entity {entity_id}): {failure}"
            ),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transaction(err) => Some(err),
            Self::Event { failure, .. } => Some(failure),
        }
    }
}

impl From<rusqlite::Error> for BatchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Transaction(StoreError::from(value))
    }
}

#[derive(Default)]
struct Tally {
    inserted_count: usize,
    updated_count: usize,
    failed_events: Vec<FailedEvent>,
    applied: Vec<AppliedChange>,
}

/// Runs batches of change events against one SQLite connection.
pub struct BatchCoordinator<'conn> {
    conn: &'conn mut Connection,
    classifier: ChangeClassifier,
    today: NaiveDate,
}

impl<'conn> BatchCoordinator<'conn> {
    /// Uses the local calendar date as "today" and rejects unknown kinds.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self {
            conn,
            classifier: ChangeClassifier::default(),
            today: Local::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_unknown_kind_policy(mut self, policy: UnknownKindPolicy) -> Self {
        self.classifier = ChangeClassifier::new(policy);
        self
    }

    /// Applies `events` atomically, then validates the committed dimension.
    ///
    /// # Errors
    /// Returns `BatchError` after rolling back when any event fails or the
    /// transaction cannot be opened or committed.
    pub fn run(&mut self, events: &[ChangeEvent]) -> Result<BatchResult, BatchError> {
        let run_id = Uuid::new_v4();
        let started_at = Instant::now();
        let classifier = self.classifier;
        let today = self.today;
        info!(
            "event=batch_run module=batch status=start run_id={run_id} events={} today={} unknown_kind_policy={:?}",
            events.len(),
            today,
            classifier.policy()
        );

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let applied = SqliteVersionedRecordStore::try_new(&tx)
            .map_err(BatchError::Transaction)
            .and_then(|store| {
                let engine = Scd2Engine::new(&store, today);
                apply_in_order(&classifier, &engine, events)
            });

        let tally = match applied {
            Ok(tally) => tally,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event=batch_run module=batch status=error run_id={run_id} error_code=rollback_failed error={rollback_err}"
                    );
                }
                error!(
                    "event=batch_run module=batch status=error run_id={run_id} duration_ms={} error_code=batch_rolled_back error={err}",
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }
        };

        if let Err(err) = tx.commit() {
            error!(
                "event=batch_run module=batch status=error run_id={run_id} duration_ms={} error_code=commit_failed error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }

        info!(
            "event=batch_run module=batch status=ok run_id={run_id} duration_ms={} inserted={} updated={} skipped={}",
            started_at.elapsed().as_millis(),
            tally.inserted_count,
            tally.updated_count,
            tally.failed_events.len()
        );

        let quality = match validate_committed(self.conn) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(
                    "event=quality_check module=batch status=error run_id={run_id} error={err}"
                );
                None
            }
        };

        Ok(BatchResult {
            run_id,
            inserted_count: tally.inserted_count,
            updated_count: tally.updated_count,
            failed_events: tally.failed_events,
            applied: tally.applied,
            quality,
        })
    }
}

fn apply_in_order(
    classifier: &ChangeClassifier,
    engine: &Scd2Engine<'_, SqliteVersionedRecordStore<'_>>,
    events: &[ChangeEvent],
) -> Result<Tally, BatchError> {
    let mut tally = Tally::default();

    for (index, event) in events.iter().enumerate() {
        let abort = |failure| BatchError::Event {
            index,
            entity_id: event.entity_id.clone(),
            failure,
        };

        let command = match classifier
            .classify(event)
            .map_err(|err| abort(EventFailure::Classification(err)))?
        {
            Classification::Command(command) => command,
            Classification::Skipped(reason) => {
                tally.failed_events.push(FailedEvent {
                    index,
                    entity_id: event.entity_id.clone(),
                    kind: event.kind.clone(),
                    reason: reason.to_string(),
                });
                continue;
            }
        };

        let applied = engine
            .apply(&command)
            .map_err(|err| abort(EventFailure::Store(err)))?;
        match applied {
            AppliedChange::Inserted { .. } => tally.inserted_count += 1,
            AppliedChange::Versioned { .. } => tally.updated_count += 1,
        }
        tally.applied.push(applied);
    }

    Ok(tally)
}

fn validate_committed(conn: &Connection) -> Result<QualityReport, StoreError> {
    let store = SqliteVersionedRecordStore::try_new(conn)?;
    QualityValidator::new(store).validate()
}
