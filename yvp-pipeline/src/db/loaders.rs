//! Bulk loaders for normalized records
//!
//! Each loader writes one source in a single transaction using multi-row
//! `INSERT ... ON CONFLICT` statements, chunked so that one statement never
//! exceeds SQLite's bind-variable limit.

use crate::error::Result;
use crate::models::{
    BlockAssignmentRecord, BoundaryRecord, DemographicRecord, DistrictRecord, ElectionRecord,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use yvp_common::geometry;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` since 3.32
const SQLITE_BIND_LIMIT: usize = 32_766;

/// Rows per statement, also bounded to keep statements a reasonable size
pub(crate) fn chunk_rows(columns: usize) -> usize {
    (SQLITE_BIND_LIMIT / columns.max(1)).min(500)
}

/// Upsert population counts; never touches a stored boundary
pub async fn upsert_demographic_counts(
    pool: &SqlitePool,
    records: &[DemographicRecord],
    vintage: i32,
) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for chunk in records.chunks(chunk_rows(7)) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO demographic_units \
             (geoid, county_fips, total_pop, pop_18_29, youth_share, vintage, updated_at) ",
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.geoid.clone())
                .push_bind(r.county_fips.clone())
                .push_bind(r.total_pop)
                .push_bind(r.pop_18_29)
                .push_bind(r.youth_share)
                .push_bind(vintage)
                .push_bind(now.clone());
        });
        qb.push(
            r#"
            ON CONFLICT(geoid) DO UPDATE SET
                county_fips = COALESCE(excluded.county_fips, demographic_units.county_fips),
                total_pop = excluded.total_pop,
                pop_18_29 = excluded.pop_18_29,
                youth_share = excluded.youth_share,
                vintage = excluded.vintage,
                updated_at = excluded.updated_at
            "#,
        );
        written += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    debug!(rows = written, "Upserted demographic counts");
    Ok(written)
}

/// Upsert unit boundaries; never touches stored counts, never clears a valid boundary
pub async fn upsert_demographic_boundaries(
    pool: &SqlitePool,
    records: &[BoundaryRecord],
    vintage: i32,
) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for chunk in records.chunks(chunk_rows(5)) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO demographic_units (geoid, county_fips, geom_wkt, vintage, updated_at) ",
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.key.clone())
                .push_bind(r.county_fips.clone())
                .push_bind(r.geometry.as_ref().map(geometry::to_wkt))
                .push_bind(vintage)
                .push_bind(now.clone());
        });
        qb.push(
            r#"
            ON CONFLICT(geoid) DO UPDATE SET
                county_fips = COALESCE(demographic_units.county_fips, excluded.county_fips),
                geom_wkt = COALESCE(excluded.geom_wkt, demographic_units.geom_wkt),
                updated_at = excluded.updated_at
            "#,
        );
        written += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    debug!(rows = written, "Upserted demographic unit boundaries");
    Ok(written)
}

/// Create or update precinct rows from a boundary file
///
/// A changed boundary invalidates the simplified copy. An invalid incoming
/// boundary keeps whatever was stored.
pub async fn upsert_precinct_boundaries(pool: &SqlitePool, records: &[BoundaryRecord]) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for chunk in records.chunks(chunk_rows(4)) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO precincts (precinct_key, county_fips, geom_wkt, updated_at) ");
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.key.clone())
                .push_bind(r.county_fips.clone())
                .push_bind(r.geometry.as_ref().map(geometry::to_wkt))
                .push_bind(now.clone());
        });
        // SET expressions see the pre-update row
        qb.push(
            r#"
            ON CONFLICT(precinct_key) DO UPDATE SET
                county_fips = excluded.county_fips,
                geom_simplified_wkt = CASE
                    WHEN excluded.geom_wkt IS NOT NULL AND excluded.geom_wkt IS NOT precincts.geom_wkt
                    THEN NULL
                    ELSE precincts.geom_simplified_wkt
                END,
                geom_wkt = COALESCE(excluded.geom_wkt, precincts.geom_wkt),
                updated_at = excluded.updated_at
            "#,
        );
        written += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    debug!(rows = written, "Upserted precinct boundaries");
    Ok(written)
}

pub async fn upsert_district_boundaries(pool: &SqlitePool, records: &[DistrictRecord]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for chunk in records.chunks(chunk_rows(2)) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO district_boundaries (district, geom_wkt) ");
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.district).push_bind(geometry::to_wkt(&r.geometry));
        });
        qb.push(" ON CONFLICT(district) DO UPDATE SET geom_wkt = excluded.geom_wkt");
        written += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    debug!(rows = written, "Upserted district boundaries");
    Ok(written)
}

pub async fn upsert_block_assignments(
    pool: &SqlitePool,
    records: &[BlockAssignmentRecord],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for chunk in records.chunks(chunk_rows(3)) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO block_assignments (block_geoid, precinct_key, district) ");
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.block_geoid.clone())
                .push_bind(r.precinct_key.clone())
                .push_bind(r.district);
        });
        qb.push(
            r#"
            ON CONFLICT(block_geoid) DO UPDATE SET
                precinct_key = excluded.precinct_key,
                district = excluded.district
            "#,
        );
        written += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    debug!(rows = written, "Upserted block assignments");
    Ok(written)
}

/// Append election rows; rows already present for (date, contest, precinct) are ignored
///
/// Returns the number of rows actually inserted.
pub async fn insert_election_results(
    pool: &SqlitePool,
    records: &[ElectionRecord],
    election_date: &str,
    contest_name: &str,
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for chunk in records.chunks(chunk_rows(10)) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO election_results \
             (election_date, contest_name, county_name, precinct_key, fallback_key, \
              dem_votes, rep_votes, total_votes, dem_pct, dem_margin) ",
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(election_date.to_string())
                .push_bind(contest_name.to_string())
                .push_bind(r.county_name.clone())
                .push_bind(r.precinct_key.clone())
                .push_bind(r.fallback_key.clone())
                .push_bind(r.dem_votes)
                .push_bind(r.rep_votes)
                .push_bind(r.total_votes)
                .push_bind(r.dem_pct)
                .push_bind(r.dem_margin);
        });
        qb.push(" ON CONFLICT(election_date, contest_name, county_name, precinct_key) DO NOTHING");
        inserted += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    debug!(rows = inserted, "Inserted election results");
    Ok(inserted)
}
