//! Precinct store reads and set-based stage updates
//!
//! Stages compute their results in memory, then write them back through a
//! connection-local TEMP table: rows are staged with multi-row inserts and
//! applied with a single `UPDATE ... FROM`. Callers pass the connection of an
//! open transaction so the whole stage commits or rolls back together.

use super::loaders::chunk_rows;
use crate::error::Result;
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

/// Precinct key with its full-resolution boundary (if any)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrecinctShape {
    pub precinct_key: String,
    pub geom_wkt: Option<String>,
}

/// Inputs the scoring engine reads
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ScoringInput {
    pub precinct_key: String,
    pub youth_share: Option<f64>,
    pub dem_margin: Option<f64>,
    /// Score from the previous run, used to count resets
    pub score: Option<f64>,
}

/// Demographic fields to write for one precinct (`None` resets to null)
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicUpdate {
    pub precinct_key: String,
    pub total_pop: Option<i64>,
    pub pop_18_29: Option<i64>,
    pub youth_share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictUpdate {
    pub precinct_key: String,
    pub cd_number: Option<i64>,
}

/// Score and tier are written together; both `None` resets the precinct
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub precinct_key: String,
    pub score: Option<f64>,
    pub tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedUpdate {
    pub precinct_key: String,
    pub geom_simplified_wkt: Option<String>,
}

pub async fn load_precinct_shapes(pool: &SqlitePool) -> Result<Vec<PrecinctShape>> {
    let rows = sqlx::query_as::<_, PrecinctShape>(
        "SELECT precinct_key, geom_wkt FROM precincts ORDER BY precinct_key",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn load_scoring_inputs(pool: &SqlitePool) -> Result<Vec<ScoringInput>> {
    let rows = sqlx::query_as::<_, ScoringInput>(
        "SELECT precinct_key, youth_share, dem_margin, score FROM precincts ORDER BY precinct_key",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Create (or empty) a TEMP staging table and fill it with `rows`
async fn stage_rows<T, F>(
    conn: &mut SqliteConnection,
    table: &str,
    column_defs: &str,
    columns: &[&str],
    rows: &[T],
    mut bind_row: F,
) -> Result<()>
where
    F: FnMut(Separated<'_, 'static, Sqlite, &'static str>, &T),
{
    sqlx::query(&format!("CREATE TEMP TABLE IF NOT EXISTS {} ({})", table, column_defs))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!("DELETE FROM {}", table))
        .execute(&mut *conn)
        .await?;

    for chunk in rows.chunks(chunk_rows(columns.len())) {
        let mut qb: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, columns.join(", ")));
        qb.push_values(chunk, |b, row| bind_row(b, row));
        qb.build().execute(&mut *conn).await?;
    }

    Ok(())
}

async fn drop_staging(conn: &mut SqliteConnection, table: &str) -> Result<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS temp.{}", table))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Write apportioned demographics (including explicit nulls for unresolved precincts)
pub async fn apply_demographics(
    conn: &mut SqliteConnection,
    updates: &[DemographicUpdate],
) -> Result<u64> {
    const TABLE: &str = "staged_demographics";
    stage_rows(
        conn,
        TABLE,
        "precinct_key TEXT PRIMARY KEY, total_pop INTEGER, pop_18_29 INTEGER, youth_share REAL",
        &["precinct_key", "total_pop", "pop_18_29", "youth_share"],
        updates,
        |mut b, u| {
            b.push_bind(u.precinct_key.clone())
                .push_bind(u.total_pop)
                .push_bind(u.pop_18_29)
                .push_bind(u.youth_share);
        },
    )
    .await?;

    let affected = sqlx::query(
        r#"
        UPDATE precincts
        SET total_pop = s.total_pop,
            pop_18_29 = s.pop_18_29,
            youth_share = s.youth_share
        FROM staged_demographics s
        WHERE precincts.precinct_key = s.precinct_key
        "#,
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    drop_staging(conn, TABLE).await?;
    debug!(rows = affected, "Applied demographic updates");
    Ok(affected)
}

pub async fn apply_districts(conn: &mut SqliteConnection, updates: &[DistrictUpdate]) -> Result<u64> {
    const TABLE: &str = "staged_districts";
    stage_rows(
        conn,
        TABLE,
        "precinct_key TEXT PRIMARY KEY, cd_number INTEGER",
        &["precinct_key", "cd_number"],
        updates,
        |mut b, u| {
            b.push_bind(u.precinct_key.clone()).push_bind(u.cd_number);
        },
    )
    .await?;

    let affected = sqlx::query(
        r#"
        UPDATE precincts
        SET cd_number = s.cd_number
        FROM staged_districts s
        WHERE precincts.precinct_key = s.precinct_key
        "#,
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    drop_staging(conn, TABLE).await?;
    debug!(rows = affected, "Applied district updates");
    Ok(affected)
}

/// Write scores; scored precincts point at `run_id`, reset ones lose their back-reference
pub async fn apply_scores(
    conn: &mut SqliteConnection,
    updates: &[ScoreUpdate],
    run_id: i64,
) -> Result<u64> {
    const TABLE: &str = "staged_scores";
    stage_rows(
        conn,
        TABLE,
        "precinct_key TEXT PRIMARY KEY, score REAL, tier TEXT",
        &["precinct_key", "score", "tier"],
        updates,
        |mut b, u| {
            b.push_bind(u.precinct_key.clone())
                .push_bind(u.score)
                .push_bind(u.tier.clone());
        },
    )
    .await?;

    let affected = sqlx::query(
        r#"
        UPDATE precincts
        SET score = s.score,
            tier = s.tier,
            pipeline_run_id = CASE WHEN s.score IS NULL THEN NULL ELSE ? END
        FROM staged_scores s
        WHERE precincts.precinct_key = s.precinct_key
        "#,
    )
    .bind(run_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    drop_staging(conn, TABLE).await?;
    debug!(rows = affected, run_id, "Applied score updates");
    Ok(affected)
}

pub async fn apply_simplified(
    conn: &mut SqliteConnection,
    updates: &[SimplifiedUpdate],
) -> Result<u64> {
    const TABLE: &str = "staged_simplified";
    stage_rows(
        conn,
        TABLE,
        "precinct_key TEXT PRIMARY KEY, geom_simplified_wkt TEXT",
        &["precinct_key", "geom_simplified_wkt"],
        updates,
        |mut b, u| {
            b.push_bind(u.precinct_key.clone())
                .push_bind(u.geom_simplified_wkt.clone());
        },
    )
    .await?;

    let affected = sqlx::query(
        r#"
        UPDATE precincts
        SET geom_simplified_wkt = s.geom_simplified_wkt
        FROM staged_simplified s
        WHERE precincts.precinct_key = s.precinct_key
        "#,
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    drop_staging(conn, TABLE).await?;
    debug!(rows = affected, "Applied simplified boundaries");
    Ok(affected)
}
