//! Employee dimension versioning core.
//! This crate owns the SCD Type II rules for the `dim_employee` table.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod source;

pub use config::{ConfigError, EtlConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::change::{ChangeCommand, ChangeEvent, ChangeKind, ClassificationError};
pub use model::employee::{
    derive_full_name, infinite_expiry, AttributeField, AttributePatch, EmployeeAttributes,
    EntityId, SurrogateKey, VersionedRecord,
};
pub use repo::version_repo::{
    SqliteVersionedRecordStore, StoreError, StoreResult, VersionedRecordStore,
};
pub use service::batch::{BatchCoordinator, BatchError, BatchResult, EventFailure, FailedEvent};
pub use service::classifier::{ChangeClassifier, Classification, UnknownKindPolicy};
pub use service::quality::{QualityReport, QualityValidator};
pub use service::scd2_engine::{AppliedChange, EventState, Scd2Engine};
pub use source::json_export::{
    parse_export_file, parse_export_str, ExportMetadata, SourceBatch, SourceError, SourceResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
