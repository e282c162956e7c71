//! Versioned record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose the three mutating SCD2 primitives: insert a first version,
//!   close the current version, append a successor version.
//! - Expose read-only lookups used by the engine, tests and the quality
//!   validator.
//!
//! # Invariants
//! - Closing sets `expiry_date` to the calendar day before the successor's
//!   effective date and clears `is_current` in the same statement.
//! - Appended and inserted rows are always current with the sentinel expiry.
//! - Nothing here opens a transaction.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::employee::{
    infinite_expiry, EmployeeAttributes, EntityId, SurrogateKey, VersionedRecord,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const TABLE: &str = "dim_employee";

const RECORD_SELECT_SQL: &str = "SELECT
    employee_key,
    employee_id,
    first_name,
    last_name,
    full_name,
    email_address,
    phone_number,
    birth_date,
    gender,
    ethnicity,
    nationality,
    marital_status,
    address_line1,
    address_line2,
    city,
    state_province,
    postal_code,
    country_code,
    hire_date,
    termination_date,
    is_active,
    effective_date,
    expiry_date,
    is_current,
    created_at,
    updated_at
FROM dim_employee";

const REQUIRED_COLUMNS: &[&str] = &[
    "employee_key",
    "employee_id",
    "first_name",
    "last_name",
    "full_name",
    "email_address",
    "phone_number",
    "birth_date",
    "gender",
    "ethnicity",
    "nationality",
    "marital_status",
    "address_line1",
    "address_line2",
    "city",
    "state_province",
    "postal_code",
    "country_code",
    "hire_date",
    "termination_date",
    "is_active",
    "effective_date",
    "expiry_date",
    "is_current",
    "created_at",
    "updated_at",
];

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from versioned record store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error, including constraint violations.
    Db(DbError),
    /// Attribute change targets an entity with no current row.
    NoCurrentVersion(EntityId),
    /// New-entity insert for an entity that already has a current row.
    DuplicateEntity(EntityId),
    /// Closing date would fall before the earliest representable date.
    DateOutOfRange(NaiveDate),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NoCurrentVersion(id) => write!(f, "no current version for entity {id}"),
            Self::DuplicateEntity(id) => {
                write!(f, "entity {id} already has a current version")
            }
            Self::DateOutOfRange(date) => {
                write!(f, "cannot close a version on the day before {date}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "record store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "record store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NoCurrentVersion(_)
            | Self::DuplicateEntity(_)
            | Self::DateOutOfRange(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract for an SCD Type II dimension.
///
/// Implementations must run every call inside the caller's ambient
/// transaction. Backends that allow concurrent writers must also make
/// `close_current` safe against two batches closing the same current row,
/// either with a row lock or serializable isolation.
pub trait VersionedRecordStore {
    /// Appends the first version of an entity, effective `effective_date`.
    fn insert_new(
        &self,
        entity_id: &EntityId,
        attributes: &EmployeeAttributes,
        effective_date: NaiveDate,
    ) -> StoreResult<SurrogateKey>;

    /// Closes the current version the day before `new_effective_date` and
    /// returns the closed row's full snapshot.
    fn close_current(
        &self,
        entity_id: &EntityId,
        new_effective_date: NaiveDate,
    ) -> StoreResult<VersionedRecord>;

    /// Appends an open-ended successor version.
    fn append_version(
        &self,
        entity_id: &EntityId,
        attributes: &EmployeeAttributes,
        effective_date: NaiveDate,
    ) -> StoreResult<SurrogateKey>;

    fn current_version(&self, entity_id: &EntityId) -> StoreResult<Option<VersionedRecord>>;

    /// All versions of an entity ordered by `effective_date`, then key.
    fn history(&self, entity_id: &EntityId) -> StoreResult<Vec<VersionedRecord>>;

    /// Version whose `[effective_date, expiry_date)` contains `date`, if any.
    fn version_as_of(
        &self,
        entity_id: &EntityId,
        date: NaiveDate,
    ) -> StoreResult<Option<VersionedRecord>>;

    /// Entities with more than one current row.
    fn duplicate_current_entities(&self) -> StoreResult<BTreeSet<EntityId>>;

    /// Rows whose `effective_date >= expiry_date`.
    fn inverted_range_keys(&self) -> StoreResult<BTreeSet<SurrogateKey>>;

    /// Rows whose `is_current` flag disagrees with the sentinel expiry.
    fn current_flag_mismatches(&self) -> StoreResult<BTreeSet<SurrogateKey>>;
}

/// SQLite-backed record store over `dim_employee`.
///
/// Borrowing a `rusqlite::Transaction` (through deref) scopes every call to
/// that transaction.
pub struct SqliteVersionedRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionedRecordStore<'conn> {
    /// Creates a store after verifying the connection schema.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn insert_row(
        &self,
        entity_id: &EntityId,
        attributes: &EmployeeAttributes,
        effective_date: NaiveDate,
    ) -> StoreResult<SurrogateKey> {
        self.conn.execute(
            "INSERT INTO dim_employee (
                employee_id,
                first_name,
                last_name,
                full_name,
                email_address,
                phone_number,
                birth_date,
                gender,
                ethnicity,
                nationality,
                marital_status,
                address_line1,
                address_line2,
                city,
                state_province,
                postal_code,
                country_code,
                hire_date,
                termination_date,
                is_active,
                effective_date,
                expiry_date,
                is_current
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, 1
            );",
            params![
                entity_id.as_str(),
                attributes.first_name.as_deref(),
                attributes.last_name.as_deref(),
                attributes.full_name.as_deref(),
                attributes.email_address.as_deref(),
                attributes.phone_number.as_deref(),
                attributes.birth_date,
                attributes.gender.as_deref(),
                attributes.ethnicity.as_deref(),
                attributes.nationality.as_deref(),
                attributes.marital_status.as_deref(),
                attributes.address_line1.as_deref(),
                attributes.address_line2.as_deref(),
                attributes.city.as_deref(),
                attributes.state_province.as_deref(),
                attributes.postal_code.as_deref(),
                attributes.country_code.as_deref(),
                attributes.hire_date,
                attributes.termination_date,
                bool_to_int(attributes.is_active),
                effective_date,
                infinite_expiry(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn query_records(
        &self,
        filter_sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<VersionedRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECORD_SELECT_SQL} {filter_sql};"))?;
        let mut rows = stmt.query(params)?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }

    fn query_keys(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<BTreeSet<SurrogateKey>> {
        let mut stmt = self.conn.prepare(sql)?;
        let keys = stmt
            .query_map(params, |row| row.get::<_, SurrogateKey>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(keys)
    }
}

impl VersionedRecordStore for SqliteVersionedRecordStore<'_> {
    fn insert_new(
        &self,
        entity_id: &EntityId,
        attributes: &EmployeeAttributes,
        effective_date: NaiveDate,
    ) -> StoreResult<SurrogateKey> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM dim_employee
                WHERE employee_id = ?1 AND is_current = 1
            );",
            [entity_id.as_str()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(StoreError::DuplicateEntity(entity_id.clone()));
        }

        self.insert_row(entity_id, attributes, effective_date)
    }

    fn close_current(
        &self,
        entity_id: &EntityId,
        new_effective_date: NaiveDate,
    ) -> StoreResult<VersionedRecord> {
        let closing_date = new_effective_date
            .pred_opt()
            .ok_or(StoreError::DateOutOfRange(new_effective_date))?;

        let changed = self.conn.execute(
            "UPDATE dim_employee
             SET
                expiry_date = ?1,
                is_current = 0,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE employee_id = ?2
               AND is_current = 1;",
            params![closing_date, entity_id.as_str()],
        )?;

        if changed == 0 {
            return Err(StoreError::NoCurrentVersion(entity_id.clone()));
        }

        // Highest key wins when an earlier version was closed on the same day.
        self.query_records(
            "WHERE employee_id = ?1
               AND expiry_date = ?2
             ORDER BY employee_key DESC
             LIMIT 1",
            params![entity_id.as_str(), closing_date],
        )?
        .into_iter()
        .next()
        .ok_or_else(|| {
            StoreError::InvalidData(format!(
                "closed version of {entity_id} with expiry {closing_date} not found"
            ))
        })
    }

    fn append_version(
        &self,
        entity_id: &EntityId,
        attributes: &EmployeeAttributes,
        effective_date: NaiveDate,
    ) -> StoreResult<SurrogateKey> {
        self.insert_row(entity_id, attributes, effective_date)
    }

    fn current_version(&self, entity_id: &EntityId) -> StoreResult<Option<VersionedRecord>> {
        Ok(self
            .query_records(
                "WHERE employee_id = ?1
                   AND is_current = 1
                 ORDER BY employee_key DESC
                 LIMIT 1",
                [entity_id.as_str()],
            )?
            .into_iter()
            .next())
    }

    fn history(&self, entity_id: &EntityId) -> StoreResult<Vec<VersionedRecord>> {
        self.query_records(
            "WHERE employee_id = ?1
             ORDER BY effective_date ASC, employee_key ASC",
            [entity_id.as_str()],
        )
    }

    fn version_as_of(
        &self,
        entity_id: &EntityId,
        date: NaiveDate,
    ) -> StoreResult<Option<VersionedRecord>> {
        Ok(self
            .query_records(
                "WHERE employee_id = ?1
                   AND effective_date <= ?2
                   AND expiry_date > ?2
                 ORDER BY effective_date DESC, employee_key DESC
                 LIMIT 1",
                params![entity_id.as_str(), date],
            )?
            .into_iter()
            .next())
    }

    fn duplicate_current_entities(&self) -> StoreResult<BTreeSet<EntityId>> {
        let mut stmt = self.conn.prepare(
            "SELECT employee_id
             FROM dim_employee
             WHERE is_current = 1
             GROUP BY employee_id
             HAVING COUNT(*) > 1;",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|id| id.map(EntityId::from))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }

    fn inverted_range_keys(&self) -> StoreResult<BTreeSet<SurrogateKey>> {
        self.query_keys(
            "SELECT employee_key
             FROM dim_employee
             WHERE effective_date >= expiry_date;",
            [],
        )
    }

    fn current_flag_mismatches(&self) -> StoreResult<BTreeSet<SurrogateKey>> {
        self.query_keys(
            "SELECT employee_key
             FROM dim_employee
             WHERE (is_current = 1) <> (expiry_date = ?1);",
            [infinite_expiry()],
        )
    }
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<VersionedRecord> {
    let surrogate_key: SurrogateKey = row.get("employee_key")?;

    let entity_id: String = row.get("employee_id")?;
    if entity_id.trim().is_empty() {
        return Err(StoreError::InvalidData(format!(
            "empty employee_id in {TABLE} row {surrogate_key}"
        )));
    }

    let is_active = parse_flag(row.get("is_active")?, "is_active", surrogate_key)?;
    let is_current = parse_flag(row.get("is_current")?, "is_current", surrogate_key)?;

    Ok(VersionedRecord {
        surrogate_key,
        entity_id: EntityId::from(entity_id),
        attributes: EmployeeAttributes {
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            full_name: row.get("full_name")?,
            email_address: row.get("email_address")?,
            phone_number: row.get("phone_number")?,
            birth_date: row.get("birth_date")?,
            gender: row.get("gender")?,
            ethnicity: row.get("ethnicity")?,
            nationality: row.get("nationality")?,
            marital_status: row.get("marital_status")?,
            address_line1: row.get("address_line1")?,
            address_line2: row.get("address_line2")?,
            city: row.get("city")?,
            state_province: row.get("state_province")?,
            postal_code: row.get("postal_code")?,
            country_code: row.get("country_code")?,
            hire_date: row.get("hire_date")?,
            termination_date: row.get("termination_date")?,
            is_active,
        },
        effective_date: row.get("effective_date")?,
        expiry_date: row.get("expiry_date")?,
        is_current,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_flag(value: i64, column: &str, key: SurrogateKey) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid {column} value `{other}` in {TABLE} row {key}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, TABLE)? {
        return Err(StoreError::MissingRequiredTable(TABLE));
    }

    for &column in REQUIRED_COLUMNS {
        if !table_has_column(conn, TABLE, column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
