//! Parser for nested JSON employee exports.
//!
//! # Responsibility
//! - Read an HR export (`employees[]` with `operation_type` and nested
//!   `employee_data`) and extract the attributes each operation touches.
//! - Drop fields the dimension does not track.
//!
//! # Invariants
//! - Output order equals file order.
//! - Address updates carry address columns only; name/address updates add
//!   `last_name`. Other tags carry every attribute present in the record.

use crate::model::change::{ChangeEvent, ChangeKind};
use crate::model::employee::AttributePatch;
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug)]
pub enum SourceError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    /// Record at `index` has no usable `employee_data.employee_id`.
    MissingEmployeeId {
        index: usize,
    },
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read export `{}`: {source}", path.display())
            }
            Self::Json(err) => write!(f, "invalid export JSON: {err}"),
            Self::MissingEmployeeId { index } => {
                write!(f, "export record #{index} has no employee_id")
            }
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::MissingEmployeeId { .. } => None,
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Export-level metadata, informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMetadata {
    pub data_source: Option<String>,
    pub export_timestamp: Option<String>,
    /// Count declared by the exporter; may disagree with `events.len()`.
    pub total_records: Option<u64>,
}

/// Parsed export ready for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBatch {
    pub metadata: ExportMetadata,
    pub events: Vec<ChangeEvent>,
}

#[derive(Debug, Deserialize)]
struct RawExport {
    #[serde(default)]
    data_source: Option<String>,
    #[serde(default)]
    export_timestamp: Option<String>,
    #[serde(default)]
    total_records: Option<u64>,
    #[serde(default)]
    employees: Vec<RawRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    /// Missing or `null` tags become `""` and are left to the classifier.
    operation_type: Option<String>,
    effective_date: Option<NaiveDate>,
    employee_data: RawEmployeeData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEmployeeData {
    employee_id: Option<RawEmployeeId>,
    personal_info: RawPersonalInfo,
    contact_info: RawContactInfo,
    employment_data: RawEmploymentData,
}

/// Some HR systems emit numeric ids.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEmployeeId {
    Text(String),
    Number(serde_json::Number),
}

impl RawEmployeeId {
    fn into_trimmed(self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPersonalInfo {
    first_name: Option<String>,
    last_name: Option<String>,
    birth_date: Option<NaiveDate>,
    gender: Option<String>,
    ethnicity: Option<String>,
    nationality: Option<String>,
    marital_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawContactInfo {
    email_address: Option<String>,
    phone_number: Option<String>,
    address: RawAddress,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAddress {
    address_line1: Option<String>,
    address_line2: Option<String>,
    city: Option<String>,
    state_province: Option<String>,
    postal_code: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEmploymentData {
    hire_date: Option<NaiveDate>,
    termination_date: Option<NaiveDate>,
    is_active: Option<bool>,
}

/// Reads and parses an export file.
pub fn parse_export_file(path: impl AsRef<Path>) -> SourceResult<SourceBatch> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| {
        error!(
            "event=source_parse module=source status=error path={} error_code=read_failed error={source}",
            path.display()
        );
        SourceError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    info!(
        "event=source_parse module=source status=start path={}",
        path.display()
    );
    parse_export_str(&text)
}

/// Parses export JSON already in memory.
pub fn parse_export_str(text: &str) -> SourceResult<SourceBatch> {
    let raw: RawExport = serde_json::from_str(text).map_err(|err| {
        error!("event=source_parse module=source status=error error_code=invalid_json error={err}");
        SourceError::from(err)
    })?;

    let metadata = ExportMetadata {
        data_source: raw.data_source,
        export_timestamp: raw.export_timestamp,
        total_records: raw.total_records,
    };

    let events = raw
        .employees
        .into_iter()
        .enumerate()
        .map(|(index, record)| to_event(index, record))
        .collect::<SourceResult<Vec<_>>>()?;

    if let Some(declared) = metadata.total_records {
        if declared != events.len() as u64 {
            warn!(
                "event=source_parse module=source status=warn declared_records={declared} parsed_records={}",
                events.len()
            );
        }
    }

    let count_of = |kind: ChangeKind| {
        events
            .iter()
            .filter(|event| ChangeKind::parse(&event.kind) == Some(kind))
            .count()
    };
    info!(
        "event=source_parse module=source status=ok records={} inserts={} address_updates={} name_address_updates={} updates={}",
        events.len(),
        count_of(ChangeKind::Insert),
        count_of(ChangeKind::UpdateAddress),
        count_of(ChangeKind::UpdateNameAddress),
        count_of(ChangeKind::Update)
    );

    Ok(SourceBatch { metadata, events })
}

fn to_event(index: usize, record: RawRecord) -> SourceResult<ChangeEvent> {
    let RawRecord {
        operation_type,
        effective_date,
        mut employee_data,
    } = record;

    let operation_type = operation_type.unwrap_or_default();
    let entity_id = employee_data
        .employee_id
        .take()
        .map(RawEmployeeId::into_trimmed)
        .filter(|id| !id.is_empty())
        .ok_or(SourceError::MissingEmployeeId { index })?;

    let attributes = match ChangeKind::parse(&operation_type) {
        Some(ChangeKind::UpdateAddress) => address_patch(employee_data.contact_info.address),
        Some(ChangeKind::UpdateNameAddress) => AttributePatch {
            last_name: employee_data.personal_info.last_name,
            ..address_patch(employee_data.contact_info.address)
        },
        Some(ChangeKind::Insert | ChangeKind::Update) | None => full_patch(employee_data),
    };

    Ok(ChangeEvent {
        entity_id: entity_id.into(),
        kind: operation_type,
        attributes,
        effective_date,
    })
}

fn address_patch(address: RawAddress) -> AttributePatch {
    AttributePatch {
        address_line1: address.address_line1,
        address_line2: address.address_line2,
        city: address.city,
        state_province: address.state_province,
        postal_code: address.postal_code,
        country_code: address.country_code,
        ..AttributePatch::default()
    }
}

fn full_patch(data: RawEmployeeData) -> AttributePatch {
    let RawEmployeeData {
        personal_info,
        contact_info,
        employment_data,
        ..
    } = data;

    AttributePatch {
        first_name: personal_info.first_name,
        last_name: personal_info.last_name,
        email_address: contact_info.email_address,
        phone_number: contact_info.phone_number,
        birth_date: personal_info.birth_date,
        gender: personal_info.gender,
        ethnicity: personal_info.ethnicity,
        nationality: personal_info.nationality,
        marital_status: personal_info.marital_status,
        hire_date: employment_data.hire_date,
        termination_date: employment_data.termination_date,
        is_active: employment_data.is_active,
        ..address_patch(contact_info.address)
    }
}
