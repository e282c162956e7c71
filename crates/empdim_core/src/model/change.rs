//! Change events and the typed commands they classify into.
//!
//! # Responsibility
//! - Carry one source record (entity id, raw kind tag, changed fields).
//! - Define the closed set of mutation kinds the engine understands.
//!
//! # Invariants
//! - The raw kind tag is kept verbatim until classification; it is never
//!   guessed from the payload.

use crate::model::employee::{AttributePatch, EmployeeAttributes, EntityId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One change record produced by a source parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_id: EntityId,
    /// Declared operation tag, e.g. `INSERT` or `UPDATE_ADDRESS`.
    pub kind: String,
    pub attributes: AttributePatch,
    /// When `None`, the engine uses its own "today".
    pub effective_date: Option<NaiveDate>,
}

impl ChangeEvent {
    pub fn new(
        entity_id: impl Into<EntityId>,
        kind: impl Into<String>,
        attributes: AttributePatch,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: kind.into(),
            attributes,
            effective_date: None,
        }
    }

    pub fn effective_on(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }
}

/// Recognized operation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// `INSERT`: first version of a new employee.
    Insert,
    /// `UPDATE_ADDRESS`: address columns only.
    UpdateAddress,
    /// `UPDATE_NAME_ADDRESS`: last name plus address columns.
    UpdateNameAddress,
    /// `UPDATE`: any attribute columns.
    Update,
}

impl ChangeKind {
    /// Parses a tag, ignoring surrounding whitespace and ASCII case.
    ///
    /// HR exporters also emit `insert` or `Update`; both are recognized.
    /// Spelling is still exact, so `UPDATE-ADDRESS` is unknown.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE_ADDRESS" => Some(Self::UpdateAddress),
            "UPDATE_NAME_ADDRESS" => Some(Self::UpdateNameAddress),
            "UPDATE" => Some(Self::Update),
            _ => None,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::UpdateAddress => "UPDATE_ADDRESS",
            Self::UpdateNameAddress => "UPDATE_NAME_ADDRESS",
            Self::Update => "UPDATE",
        }
    }
}

/// Typed mutation handed to the versioning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCommand {
    /// Always effective "today"; an event-level date is not honoured.
    NewEntity {
        entity_id: EntityId,
        attributes: EmployeeAttributes,
    },
    AttributeChange {
        entity_id: EntityId,
        changes: AttributePatch,
        effective_date: Option<NaiveDate>,
    },
}

impl ChangeCommand {
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Self::NewEntity { entity_id, .. } | Self::AttributeChange { entity_id, .. } => {
                entity_id
            }
        }
    }
}

/// Change event could not be mapped to a mutation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    UnknownKind { entity_id: EntityId, kind: String },
    EmptyEntityId { kind: String },
}

impl Display for ClassificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKind { entity_id, kind } => {
                write!(f, "unrecognized change kind `{kind}` for entity {entity_id}")
            }
            Self::EmptyEntityId { kind } => {
                write!(f, "change event of kind `{kind}` has an empty entity id")
            }
        }
    }
}

impl Error for ClassificationError {}
