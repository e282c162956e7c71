//! Change event classification.
//!
//! # Responsibility
//! - Map a raw change event to a typed `ChangeCommand`.
//! - Decide what happens to events with an unrecognized kind tag.
//!
//! # Invariants
//! - Classification never looks at the store and never infers a kind from
//!   the payload.
//! - An event with an empty entity id is rejected under every policy.

use crate::model::change::{ChangeCommand, ChangeEvent, ChangeKind, ClassificationError};
use crate::model::employee::EmployeeAttributes;
use log::{debug, warn};

/// What to do with an event whose kind tag is not recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKindPolicy {
    /// Fail classification, which aborts the whole batch.
    #[default]
    Reject,
    /// Leave the event out of the batch and report it.
    Skip,
}

impl UnknownKindPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// Result of classifying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Command(ChangeCommand),
    /// Only produced under `UnknownKindPolicy::Skip`.
    Skipped(ClassificationError),
}

/// Stateless mapper from change events to commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeClassifier {
    policy: UnknownKindPolicy,
}

impl ChangeClassifier {
    pub fn new(policy: UnknownKindPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnknownKindPolicy {
        self.policy
    }

    /// Classifies one event.
    ///
    /// # Errors
    /// - `EmptyEntityId` when the event carries a blank business key.
    /// - `UnknownKind` when the tag is unrecognized and the policy rejects.
    pub fn classify(&self, event: &ChangeEvent) -> Result<Classification, ClassificationError> {
        if event.entity_id.as_str().trim().is_empty() {
            return Err(ClassificationError::EmptyEntityId {
                kind: event.kind.clone(),
            });
        }

        let Some(kind) = ChangeKind::parse(&event.kind) else {
            let error = ClassificationError::UnknownKind {
                entity_id: event.entity_id.clone(),
                kind: event.kind.clone(),
            };
            return match self.policy {
                UnknownKindPolicy::Reject => Err(error),
                UnknownKindPolicy::Skip => {
                    warn!(
                        "event=classify module=classifier status=skipped entity_id={} kind={}",
                        event.entity_id, event.kind
                    );
                    Ok(Classification::Skipped(error))
                }
            };
        };

        let command = match kind {
            ChangeKind::Insert => {
                if event.effective_date.is_some() {
                    debug!(
                        "event=classify module=classifier entity_id={} note=insert_effective_date_ignored",
                        event.entity_id
                    );
                }
                ChangeCommand::NewEntity {
                    entity_id: event.entity_id.clone(),
                    attributes: EmployeeAttributes::from_patch(&event.attributes),
                }
            }
            ChangeKind::UpdateAddress | ChangeKind::UpdateNameAddress | ChangeKind::Update => {
                ChangeCommand::AttributeChange {
                    entity_id: event.entity_id.clone(),
                    changes: event.attributes.clone(),
                    effective_date: event.effective_date,
                }
            }
        };

        Ok(Classification::Command(command))
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeClassifier, Classification, UnknownKindPolicy};
    use crate::model::change::{ChangeCommand, ChangeEvent, ClassificationError};
    use crate::model::employee::AttributePatch;
    use chrono::NaiveDate;

    fn patch_city(city: &str) -> AttributePatch {
        AttributePatch {
            city: Some(city.to_string()),
            ..AttributePatch::default()
        }
    }

    #[test]
    fn insert_becomes_new_entity_with_derived_full_name() {
        let event = ChangeEvent::new(
            "E1",
            "INSERT",
            AttributePatch {
                first_name: Some("Ana".to_string()),
                last_name: Some("Diaz".to_string()),
                ..AttributePatch::default()
            },
        );

        let result = ChangeClassifier::default().classify(&event).unwrap();
        match result {
            Classification::Command(ChangeCommand::NewEntity { attributes, .. }) => {
                assert_eq!(attributes.full_name.as_deref(), Some("Ana Diaz"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn update_tags_become_attribute_changes_case_insensitively() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 13).unwrap();
        for tag in ["UPDATE_ADDRESS", " update_name_address ", "Update"] {
            let event = ChangeEvent::new("E1", tag, patch_city("Cusco")).effective_on(date);
            let result = ChangeClassifier::default().classify(&event).unwrap();
            assert_eq!(
                result,
                Classification::Command(ChangeCommand::AttributeChange {
                    entity_id: "E1".into(),
                    changes: patch_city("Cusco"),
                    effective_date: Some(date),
                })
            );
        }
    }

    #[test]
    fn unknown_kind_is_rejected_by_default() {
        let event = ChangeEvent::new("E1", "DELETE", AttributePatch::default());
        let err = ChangeClassifier::default().classify(&event).unwrap_err();
        assert!(matches!(err, ClassificationError::UnknownKind { kind, .. } if kind == "DELETE"));
    }

    #[test]
    fn unknown_kind_is_reported_under_skip_policy() {
        let event = ChangeEvent::new("E1", "DELETE", AttributePatch::default());
        let result = ChangeClassifier::new(UnknownKindPolicy::Skip)
            .classify(&event)
            .unwrap();
        assert!(matches!(result, Classification::Skipped(_)));
    }

    #[test]
    fn empty_entity_id_is_rejected_even_when_skipping() {
        let event = ChangeEvent::new("  ", "DELETE", AttributePatch::default());
        let err = ChangeClassifier::new(UnknownKindPolicy::Skip)
            .classify(&event)
            .unwrap_err();
        assert!(matches!(err, ClassificationError::EmptyEntityId { .. }));
    }

    #[test]
    fn policy_parses_known_values() {
        assert_eq!(UnknownKindPolicy::parse(" SKIP "), Some(UnknownKindPolicy::Skip));
        assert_eq!(UnknownKindPolicy::parse("reject"), Some(UnknownKindPolicy::Reject));
        assert_eq!(UnknownKindPolicy::parse("ignore"), None);
    }
}
