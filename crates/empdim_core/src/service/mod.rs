//! Core use-case services.
//!
//! # Responsibility
//! - Classify change events, apply them with SCD Type II semantics, run
//!   batches atomically and check dimension invariants afterwards.
//! - Keep versioning rules independent of the storage backend.

pub mod batch;
pub mod classifier;
pub mod quality;
pub mod scd2_engine;
