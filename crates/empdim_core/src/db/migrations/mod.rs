//! Schema steps for the `dim_employee` table.
//!
//! # Responsibility
//! - List the dimension's schema steps in the order they were released.
//! - Bring a connection up to `latest_version()` in one transaction.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly 1.
//! - The last applied step is recorded in `PRAGMA user_version`.
//! - A failed step leaves the database at its previous version.

use crate::db::{DbError, DbResult};
use log::{debug, info, warn};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "dim_employee",
        sql: include_str!("0001_dim_employee.sql"),
    },
    SchemaStep {
        version: 2,
        name: "version_lookup_indexes",
        sql: include_str!("0002_version_lookup_indexes.sql"),
    },
];

/// Dimension schema version this binary writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Dimension schema version recorded in the database (0 when never migrated).
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Applies every step newer than the database's recorded version.
///
/// Fails with `DbError::UnsupportedSchemaVersion` when the database was
/// written by a newer binary, and with `DbError::MigrationFailed` naming the
/// step whose SQL was rejected.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();

    if from_version > latest {
        warn!(
            "event=db_migrate module=db status=error error_code=schema_too_new db_version={from_version} latest_supported={latest}"
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }
    if from_version == latest {
        debug!("event=db_migrate module=db status=ok note=up_to_date version={latest}");
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
    {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::MigrationFailed {
                version: step.version,
                name: step.name,
                source,
            })?;
        debug!(
            "event=db_migrate module=db status=step version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={latest}");
    Ok(())
}
