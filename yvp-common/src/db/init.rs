//! Database initialization
//!
//! Creates the SQLite store on first run and brings an existing one up to the
//! current schema. Every statement is `CREATE ... IF NOT EXISTS`, so calling
//! [`init_database`] repeatedly is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version
///
/// **IMPORTANT:** Increment this when the table definitions below change
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Per-connection settings go on the connect options so that every pooled
    // connection gets them, not only the first one
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index used by the pipeline
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_pipeline_runs_table(pool).await?;
    create_demographic_units_table(pool).await?;
    create_precincts_table(pool).await?;
    create_election_results_table(pool).await?;
    create_district_boundaries_table(pool).await?;
    create_block_assignments_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the pipeline run ledger
///
/// `finished_at` is set exactly when the run has left `running`.
async fn create_pipeline_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failed')),
            config_snapshot TEXT NOT NULL,
            precincts_scored INTEGER,
            error_message TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            CHECK ((status = 'running') = (finished_at IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipeline_runs_status ON pipeline_runs(status)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the demographic unit table (census block groups)
///
/// Counts and boundary are loaded by separate sources and upserted independently.
async fn create_demographic_units_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS demographic_units (
            geoid TEXT PRIMARY KEY,
            county_fips TEXT,
            total_pop INTEGER,
            pop_18_29 INTEGER,
            youth_share REAL,
            geom_wkt TEXT,
            vintage INTEGER NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the precinct table
///
/// Score and tier are written together or not at all.
async fn create_precincts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS precincts (
            precinct_key TEXT PRIMARY KEY,
            county_fips TEXT NOT NULL,
            cd_number INTEGER,
            geom_wkt TEXT,
            geom_simplified_wkt TEXT,
            total_pop INTEGER,
            pop_18_29 INTEGER,
            youth_share REAL,
            dem_votes INTEGER,
            rep_votes INTEGER,
            total_votes INTEGER,
            dem_pct REAL,
            dem_margin REAL,
            score REAL,
            tier TEXT,
            pipeline_run_id INTEGER REFERENCES pipeline_runs(id),
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK ((score IS NULL) = (tier IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    for (name, column) in [
        ("idx_precincts_cd_number", "cd_number"),
        ("idx_precincts_tier", "tier"),
        ("idx_precincts_score", "score"),
        ("idx_precincts_youth_share", "youth_share"),
        ("idx_precincts_dem_margin", "dem_margin"),
    ] {
        let sql = format!("CREATE INDEX IF NOT EXISTS {} ON precincts({})", name, column);
        sqlx::query(&sql).execute(pool).await?;
    }

    Ok(())
}

/// Create the election result table
///
/// The natural key suppresses duplicate inserts on re-ingestion.
async fn create_election_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS election_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            election_date TEXT NOT NULL,
            contest_name TEXT NOT NULL,
            county_name TEXT NOT NULL DEFAULT '',
            precinct_key TEXT NOT NULL,
            fallback_key TEXT,
            dem_votes INTEGER NOT NULL DEFAULT 0,
            rep_votes INTEGER NOT NULL DEFAULT 0,
            total_votes INTEGER NOT NULL DEFAULT 0,
            dem_pct REAL,
            dem_margin REAL,
            UNIQUE (election_date, contest_name, county_name, precinct_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_election_results_fallback ON election_results(fallback_key)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_district_boundaries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS district_boundaries (
            district INTEGER PRIMARY KEY,
            geom_wkt TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the census block → (precinct, district) crosswalk table
async fn create_block_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS block_assignments (
            block_geoid TEXT PRIMARY KEY,
            precinct_key TEXT NOT NULL,
            district INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_block_assignments_precinct ON block_assignments(precinct_key)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
