//! Employee dimension ETL entry point.
//!
//! # Responsibility
//! - Load one JSON export and apply it to the `dim_employee` table as a
//!   single all-or-nothing batch.
//! - Map outcomes to exit codes: 0 committed (quality warnings included),
//!   1 parse or batch failure, 2 configuration error.
//!
//! Usage:
//!   empdim employee_20250813.json --db /data/hr.sqlite3

use chrono::NaiveDate;
use clap::Parser;
use empdim_core::db::open_db;
use empdim_core::{
    init_logging, parse_export_file, BatchCoordinator, EtlConfig, UnknownKindPolicy,
};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "empdim")]
#[command(about = "Apply an employee export to the SCD Type II dimension")]
#[command(version)]
struct Args {
    /// JSON export to load
    export: PathBuf,

    /// SQLite database file (overrides EMPDIM_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// trace|debug|info|warn|error (overrides EMPDIM_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute log directory (overrides EMPDIM_LOG_DIR)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Skip records with unknown operation types instead of failing
    #[arg(long)]
    skip_unknown_kinds: bool,

    /// Effective date for inserts and undated updates, YYYY-MM-DD
    #[arg(long)]
    today: Option<NaiveDate>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match EtlConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(dir) = args.log_dir {
        config.log_dir = dir;
    }
    if args.skip_unknown_kinds {
        config.unknown_kind_policy = UnknownKindPolicy::Skip;
    }

    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("logging setup failed: {err}");
        return ExitCode::from(2);
    }

    run(&config, &args.export, args.today)
}

fn run(config: &EtlConfig, export: &Path, today: Option<NaiveDate>) -> ExitCode {
    info!(
        "event=etl_run module=cli status=start export={} db={}",
        export.display(),
        config.db_path.display()
    );

    let mut conn = match open_db(&config.db_path) {
        Ok(conn) => conn,
        Err(err) => {
            error!("event=etl_run module=cli status=error error_code=db_open_failed error={err}");
            return ExitCode::FAILURE;
        }
    };

    let batch = match parse_export_file(export) {
        Ok(batch) => batch,
        Err(err) => {
            error!("event=etl_run module=cli status=error error_code=parse_failed error={err}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "event=etl_run module=cli source={} exported_at={} records={}",
        batch.metadata.data_source.as_deref().unwrap_or("unknown"),
        batch.metadata.export_timestamp.as_deref().unwrap_or("unknown"),
        batch.events.len()
    );

    let mut coordinator =
        BatchCoordinator::new(&mut conn).with_unknown_kind_policy(config.unknown_kind_policy);
    if let Some(today) = today {
        coordinator = coordinator.with_today(today);
    }

    let result = match coordinator.run(&batch.events) {
        Ok(result) => result,
        Err(err) => {
            error!("event=etl_run module=cli status=error error_code=batch_failed error={err}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "event=etl_run module=cli status=ok run_id={} inserted={} updated={} skipped={}",
        result.run_id,
        result.inserted_count,
        result.updated_count,
        result.failed_events.len()
    );
    for skipped in &result.failed_events {
        warn!(
            "event=etl_run module=cli status=warn skipped_index={} entity_id={} kind={}",
            skipped.index, skipped.entity_id, skipped.kind
        );
    }

    match &result.quality {
        Some(report) if report.is_clean() => {
            info!("event=etl_run module=cli status=ok quality=passed");
        }
        Some(_) => warn!("event=etl_run module=cli status=warn quality=issues_detected"),
        None => warn!("event=etl_run module=cli status=warn quality=not_checked"),
    }

    ExitCode::SUCCESS
}
