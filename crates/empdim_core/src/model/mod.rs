//! Employee dimension domain model.
//!
//! # Responsibility
//! - Define the versioned row shape and the attribute set it carries.
//! - Define change events and the typed commands they classify into.
//!
//! # Invariants
//! - An entity is identified by its stable business key (`EntityId`); rows
//!   are identified by a store-assigned `SurrogateKey`.
//! - Rows are closed, never deleted or edited in place.

pub mod change;
pub mod employee;
