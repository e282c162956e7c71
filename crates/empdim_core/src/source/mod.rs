//! Change event sources.
//!
//! # Responsibility
//! - Turn external batch exports into ordered `ChangeEvent` sequences.
//!
//! # Invariants
//! - Sources keep input order and pass kind tags through verbatim; they
//!   never decide whether a tag is valid.

pub mod json_export;
