//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the versioned-record storage contract used by the engine.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories never begin, commit or roll back transactions; they run
//!   inside whatever transaction the caller holds on the connection.
//! - Repository APIs return semantic errors (`NoCurrentVersion`,
//!   `DuplicateEntity`) in addition to DB transport errors.

pub mod version_repo;
