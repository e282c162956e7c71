//! Employee dimension row model.
//!
//! # Responsibility
//! - Define `VersionedRecord`, one row per historical state of an employee.
//! - Provide the attribute merge used when a new version is derived from
//!   the one it replaces.
//!
//! # Invariants
//! - `is_current` agrees with `expiry_date == infinite_expiry()`.
//! - `full_name` is derived from `first_name` and `last_name`; callers never
//!   set it directly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Store-assigned unique row identifier, monotonically increasing.
pub type SurrogateKey = i64;

/// Stable business key of an employee (for example `EMP001`).
///
/// Not unique across rows: every version of one employee shares it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Expiry date shared by every open-ended (current) version.
///
/// Range queries treat it as "never expires".
pub fn infinite_expiry() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Mutable business attributes carried by every version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeAttributes {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Derived: `"{first_name} {last_name}"`, trimmed.
    pub full_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub nationality: Option<String>,
    pub marital_status: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl Default for EmployeeAttributes {
    fn default() -> Self {
        Self {
            first_name: None,
            last_name: None,
            full_name: None,
            email_address: None,
            phone_number: None,
            birth_date: None,
            gender: None,
            ethnicity: None,
            nationality: None,
            marital_status: None,
            address_line1: None,
            address_line2: None,
            city: None,
            state_province: None,
            postal_code: None,
            country_code: None,
            hire_date: None,
            termination_date: None,
            is_active: true,
        }
    }
}

impl EmployeeAttributes {
    /// Builds the attribute set of an entity's first version.
    ///
    /// Fields absent from the patch stay empty; `is_active` defaults to
    /// `true`.
    pub fn from_patch(patch: &AttributePatch) -> Self {
        Self::default().merged_with(patch)
    }

    /// Returns a copy with every field present in `patch` overwritten.
    ///
    /// `full_name` is recomputed only when the patch touches a name
    /// component, so a stored full name survives unrelated changes.
    pub fn merged_with(&self, patch: &AttributePatch) -> Self {
        let mut merged = Self {
            first_name: pick(&patch.first_name, &self.first_name),
            last_name: pick(&patch.last_name, &self.last_name),
            full_name: self.full_name.clone(),
            email_address: pick(&patch.email_address, &self.email_address),
            phone_number: pick(&patch.phone_number, &self.phone_number),
            birth_date: patch.birth_date.or(self.birth_date),
            gender: pick(&patch.gender, &self.gender),
            ethnicity: pick(&patch.ethnicity, &self.ethnicity),
            nationality: pick(&patch.nationality, &self.nationality),
            marital_status: pick(&patch.marital_status, &self.marital_status),
            address_line1: pick(&patch.address_line1, &self.address_line1),
            address_line2: pick(&patch.address_line2, &self.address_line2),
            city: pick(&patch.city, &self.city),
            state_province: pick(&patch.state_province, &self.state_province),
            postal_code: pick(&patch.postal_code, &self.postal_code),
            country_code: pick(&patch.country_code, &self.country_code),
            hire_date: patch.hire_date.or(self.hire_date),
            termination_date: patch.termination_date.or(self.termination_date),
            is_active: patch.is_active.unwrap_or(self.is_active),
        };

        if patch.touches_name() || merged.full_name.is_none() {
            merged.full_name =
                derive_full_name(merged.first_name.as_deref(), merged.last_name.as_deref());
        }

        merged
    }
}

fn pick(new: &Option<String>, old: &Option<String>) -> Option<String> {
    new.clone().or_else(|| old.clone())
}

/// Joins name components with a single space; `None` when both are blank.
pub fn derive_full_name(first_name: Option<&str>, last_name: Option<&str>) -> Option<String> {
    let joined = format!(
        "{} {}",
        first_name.unwrap_or_default(),
        last_name.unwrap_or_default()
    );
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Changed-field set of one change event.
///
/// `None` means "not part of this change"; there is no way to clear a
/// field through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub nationality: Option<String>,
    pub marital_status: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl AttributePatch {
    /// Whether first or last name is part of this change.
    pub fn touches_name(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Lists the fields present in this patch, in column order.
    pub fn changed_fields(&self) -> Vec<AttributeField> {
        let present = [
            (AttributeField::FirstName, self.first_name.is_some()),
            (AttributeField::LastName, self.last_name.is_some()),
            (AttributeField::EmailAddress, self.email_address.is_some()),
            (AttributeField::PhoneNumber, self.phone_number.is_some()),
            (AttributeField::BirthDate, self.birth_date.is_some()),
            (AttributeField::Gender, self.gender.is_some()),
            (AttributeField::Ethnicity, self.ethnicity.is_some()),
            (AttributeField::Nationality, self.nationality.is_some()),
            (AttributeField::MaritalStatus, self.marital_status.is_some()),
            (AttributeField::AddressLine1, self.address_line1.is_some()),
            (AttributeField::AddressLine2, self.address_line2.is_some()),
            (AttributeField::City, self.city.is_some()),
            (AttributeField::StateProvince, self.state_province.is_some()),
            (AttributeField::PostalCode, self.postal_code.is_some()),
            (AttributeField::CountryCode, self.country_code.is_some()),
            (AttributeField::HireDate, self.hire_date.is_some()),
            (AttributeField::TerminationDate, self.termination_date.is_some()),
            (AttributeField::IsActive, self.is_active.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(field, is_present)| is_present.then_some(field))
            .collect()
    }
}

/// Patchable attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeField {
    FirstName,
    LastName,
    EmailAddress,
    PhoneNumber,
    BirthDate,
    Gender,
    Ethnicity,
    Nationality,
    MaritalStatus,
    AddressLine1,
    AddressLine2,
    City,
    StateProvince,
    PostalCode,
    CountryCode,
    HireDate,
    TerminationDate,
    IsActive,
}

impl AttributeField {
    /// Column name in `dim_employee`.
    pub fn column(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::EmailAddress => "email_address",
            Self::PhoneNumber => "phone_number",
            Self::BirthDate => "birth_date",
            Self::Gender => "gender",
            Self::Ethnicity => "ethnicity",
            Self::Nationality => "nationality",
            Self::MaritalStatus => "marital_status",
            Self::AddressLine1 => "address_line1",
            Self::AddressLine2 => "address_line2",
            Self::City => "city",
            Self::StateProvince => "state_province",
            Self::PostalCode => "postal_code",
            Self::CountryCode => "country_code",
            Self::HireDate => "hire_date",
            Self::TerminationDate => "termination_date",
            Self::IsActive => "is_active",
        }
    }
}

/// One historical state of one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub surrogate_key: SurrogateKey,
    pub entity_id: EntityId,
    pub attributes: EmployeeAttributes,
    /// First day this version is valid.
    pub effective_date: NaiveDate,
    /// `infinite_expiry()` while the version is current.
    pub expiry_date: NaiveDate,
    pub is_current: bool,
    /// Epoch milliseconds. Audit only.
    pub created_at: i64,
    /// Epoch milliseconds. Audit only.
    pub updated_at: i64,
}

impl VersionedRecord {
    pub fn is_open_ended(&self) -> bool {
        self.expiry_date == infinite_expiry()
    }

    /// `effective_date < expiry_date`.
    pub fn has_valid_range(&self) -> bool {
        self.effective_date < self.expiry_date
    }

    /// Whether `date` falls inside `[effective_date, expiry_date)`.
    ///
    /// Agrees with `has_valid_range`: a version with an empty range is
    /// valid on no date.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.effective_date <= date && date < self.expiry_date
    }
}
