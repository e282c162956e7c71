//! Run configuration.
//!
//! # Responsibility
//! - Resolve database path, logging and classification settings from the
//!   environment, with defaults for anything unset.
//!
//! # Invariants
//! - `log_dir` is always absolute.
//! - Blank variables count as unset.

use crate::logging::default_log_level;
use crate::service::classifier::UnknownKindPolicy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "EMPDIM_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "EMPDIM_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "EMPDIM_LOG_DIR";
pub const UNKNOWN_KIND_VAR: &str = "EMPDIM_UNKNOWN_KIND";

const DEFAULT_DB_FILE_NAME: &str = "empdim.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "empdim-logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for {key}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Settings for one ETL run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub unknown_kind_policy: UnknownKindPolicy,
}

impl EtlConfig {
    /// Reads `EMPDIM_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let unknown_kind_policy = match read(UNKNOWN_KIND_VAR) {
            Some(raw) => {
                UnknownKindPolicy::parse(&raw).ok_or(ConfigError::InvalidValue {
                    key: UNKNOWN_KIND_VAR,
                    value: raw,
                })?
            }
            None => UnknownKindPolicy::default(),
        };

        let log_dir = match read(LOG_DIR_VAR).map(PathBuf::from) {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => {
                return Err(ConfigError::InvalidValue {
                    key: LOG_DIR_VAR,
                    value: dir.display().to_string(),
                })
            }
            None => std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
        };

        Ok(Self {
            db_path: read(DB_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME)),
            log_level: read(LOG_LEVEL_VAR).unwrap_or_else(|| default_log_level().to_string()),
            log_dir,
            unknown_kind_policy,
        })
    }
}
