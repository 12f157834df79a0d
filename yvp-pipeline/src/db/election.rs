//! Election merge statements
//!
//! The merge runs entirely in SQL inside the caller's transaction:
//! 1. reset electoral fields on every precinct
//! 2. copy results whose primary key equals the precinct key, taking the
//!    lowest-id row when the same id appears under several counties
//! 3. for precincts still unmatched, copy results whose fallback key equals the
//!    precinct key, taking the lowest-id row when several share a fallback key
//!
//! Election rows already consumed by a primary match are not reused by the
//! fallback pass.

use crate::error::Result;
use crate::models::MergeReport;
use sqlx::SqliteConnection;

/// Election rows stored for one contest
pub async fn count_contest_rows(
    conn: &mut SqliteConnection,
    election_date: &str,
    contest_name: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM election_results WHERE election_date = ? AND contest_name = ?",
    )
    .bind(election_date)
    .bind(contest_name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

pub async fn reset_electoral_fields(conn: &mut SqliteConnection) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE precincts
        SET dem_votes = NULL,
            rep_votes = NULL,
            total_votes = NULL,
            dem_pct = NULL,
            dem_margin = NULL
        "#,
    )
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn merge_by_primary_key(
    conn: &mut SqliteConnection,
    election_date: &str,
    contest_name: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE precincts
        SET dem_votes = er.dem_votes,
            rep_votes = er.rep_votes,
            total_votes = er.total_votes,
            dem_pct = er.dem_pct,
            dem_margin = er.dem_margin
        FROM (
            SELECT er.*
            FROM election_results er
            WHERE er.id IN (
                SELECT MIN(c.id)
                FROM election_results c
                WHERE c.election_date = ?1
                  AND c.contest_name = ?2
                GROUP BY c.precinct_key
            )
        ) er
        WHERE er.precinct_key = precincts.precinct_key
        "#,
    )
    .bind(election_date)
    .bind(contest_name)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn merge_by_fallback_key(
    conn: &mut SqliteConnection,
    election_date: &str,
    contest_name: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE precincts
        SET dem_votes = fb.dem_votes,
            rep_votes = fb.rep_votes,
            total_votes = fb.total_votes,
            dem_pct = fb.dem_pct,
            dem_margin = fb.dem_margin
        FROM (
            SELECT er.*
            FROM election_results er
            WHERE er.id IN (
                SELECT MIN(c.id)
                FROM election_results c
                WHERE c.election_date = ?1
                  AND c.contest_name = ?2
                  AND c.fallback_key IS NOT NULL
                  AND NOT EXISTS (
                      SELECT 1 FROM precincts used WHERE used.precinct_key = c.precinct_key
                  )
                GROUP BY c.fallback_key
            )
        ) fb
        WHERE fb.fallback_key = precincts.precinct_key
          AND precincts.total_votes IS NULL
        "#,
    )
    .bind(election_date)
    .bind(contest_name)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Run the full two-tier merge
pub async fn merge_contest(
    conn: &mut SqliteConnection,
    election_date: &str,
    contest_name: &str,
) -> Result<MergeReport> {
    let contest_rows = count_contest_rows(conn, election_date, contest_name).await?;
    reset_electoral_fields(conn).await?;
    let primary = merge_by_primary_key(conn, election_date, contest_name).await?;
    let fallback = merge_by_fallback_key(conn, election_date, contest_name).await?;

    Ok(MergeReport {
        contest_rows: contest_rows as usize,
        primary_matches: primary as usize,
        fallback_matches: fallback as usize,
    })
}
