//! Post-commit dimension quality checks.
//!
//! # Responsibility
//! - Detect entities with more than one current row.
//! - Detect rows with inverted validity ranges or a stale `is_current` flag.
//!
//! # Invariants
//! - Read-only. Findings are reported, never repaired or rolled back.

use crate::model::employee::{EntityId, SurrogateKey};
use crate::repo::version_repo::{StoreResult, VersionedRecordStore};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;

/// Findings of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub duplicate_currents: BTreeSet<EntityId>,
    pub inverted_ranges: BTreeSet<SurrogateKey>,
    pub flag_mismatches: BTreeSet<SurrogateKey>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_currents.is_empty()
            && self.inverted_ranges.is_empty()
            && self.flag_mismatches.is_empty()
    }
}

/// Invariant checker over any record store.
pub struct QualityValidator<S: VersionedRecordStore> {
    store: S,
}

impl<S: VersionedRecordStore> QualityValidator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn find_duplicate_currents(&self) -> StoreResult<BTreeSet<EntityId>> {
        self.store.duplicate_current_entities()
    }

    pub fn find_inverted_ranges(&self) -> StoreResult<BTreeSet<SurrogateKey>> {
        self.store.inverted_range_keys()
    }

    pub fn find_flag_mismatches(&self) -> StoreResult<BTreeSet<SurrogateKey>> {
        self.store.current_flag_mismatches()
    }

    /// Runs every check and logs each finding at `warn`.
    pub fn validate(&self) -> StoreResult<QualityReport> {
        let report = QualityReport {
            duplicate_currents: self.find_duplicate_currents()?,
            inverted_ranges: self.find_inverted_ranges()?,
            flag_mismatches: self.find_flag_mismatches()?,
        };

        if report.is_clean() {
            info!("event=quality_check module=quality status=ok");
            return Ok(report);
        }

        for entity_id in &report.duplicate_currents {
            warn!(
                "event=quality_check module=quality status=warn check=duplicate_current entity_id={entity_id}"
            );
        }
        for key in &report.inverted_ranges {
            warn!(
                "event=quality_check module=quality status=warn check=inverted_range surrogate_key={key}"
            );
        }
        for key in &report.flag_mismatches {
            warn!(
                "event=quality_check module=quality status=warn check=current_flag_mismatch surrogate_key={key}"
            );
        }
        warn!(
            "event=quality_check module=quality status=warn duplicate_currents={} inverted_ranges={} flag_mismatches={}",
            report.duplicate_currents.len(),
            report.inverted_ranges.len(),
            report.flag_mismatches.len()
        );

        Ok(report)
    }
}
