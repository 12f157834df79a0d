//! Test Helper Utilities
//!
//! Throwaway databases and a small two-precinct fixture set shared by the
//! pipeline integration tests.
//!
//! Fixture geography (coordinate units):
//! - block group `060010001001`: x 0..10, 1000 people, 250 aged 18–29
//! - block group `060010001002`: x 10..20, 500 people, 100 aged 18–29
//! - precinct `06001000100`: x 4..14 (60% of the first, 40% of the second)
//! - precinct `06001000200`: x 30..40, demographics by key, CD via blocks
//! - district 1: x 0..25, district 2: x 25..50

#![allow(dead_code)]

use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use yvp_common::db::init_database;
use yvp_common::PipelineConfig;

pub const AREA_PRECINCT: &str = "06001000100";
pub const KEYED_PRECINCT: &str = "06001000200";

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("test_yvp.db")).await.unwrap();
    (temp_dir, pool)
}

pub fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
    format!("POLYGON(({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))")
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// NHGIS extract with every youth count in the first age variable
pub fn nhgis_csv(rows: &[(&str, i64, i64)]) -> String {
    let schema = yvp_common::config::NhgisSchema::default();
    let mut out = format!(
        "{},{},{}\n",
        schema.geoid_column,
        schema.total_pop_var,
        schema.youth_vars.join(",")
    );
    for (geoid, total, youth) in rows {
        let zeros = vec!["0"; schema.youth_vars.len() - 1].join(",");
        out.push_str(&format!("{},{},{},{}\n", geoid, total, youth, zeros));
    }
    out
}

/// Two-column boundary CSV; WKT values are quoted
pub fn boundary_csv(key_column: &str, rows: &[(&str, String)]) -> String {
    let mut out = format!("{},WKT\n", key_column);
    for (key, wkt) in rows {
        out.push_str(&format!("{},\"{}\"\n", key, wkt));
    }
    out
}

/// Wide election rows: `(UNIQUE_ID, COUNTYFP, SRPREC, dem, rep, total)`
pub fn wide_election_csv(rows: &[(&str, &str, &str, i64, i64, i64)]) -> String {
    let mut out = String::from("UNIQUE_ID,COUNTY,COUNTYFP,SRPREC,G24PREDHAR,G24PRERTRU,TOTVOTE\n");
    for (id, county_fips, code, dem, rep, total) in rows {
        out.push_str(&format!(
            "{},Alameda,{},{},{},{},{}\n",
            id, county_fips, code, dem, rep, total
        ));
    }
    out
}

/// Long candidate rows for the default contest: `(PRECINCT_ID, COUNTYFP, SRPREC, party, votes)`
pub fn long_election_csv(rows: &[(&str, &str, &str, &str, i64)]) -> String {
    let mut out = String::from("Precinct ID,County Name,COUNTYFP,SRPREC,Contest Name,Candidate Party,Votes\n");
    for (id, county_fips, code, party, votes) in rows {
        out.push_str(&format!(
            "{},Alameda,{},{},President of the United States,{},{}\n",
            id, county_fips, code, party, votes
        ));
    }
    out
}

/// Fixture files plus a config that points at all of them
///
/// The area precinct only matches its election row through the fallback key.
pub fn fixture_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    let sources = &mut config.sources;

    sources.census_extract = Some(write_file(
        dir,
        "nhgis.csv",
        &nhgis_csv(&[
            ("060010001001", 1000, 250),
            ("060010001002", 500, 100),
            (KEYED_PRECINCT, 400, 200),
        ]),
    ));
    sources.block_group_boundaries = Some(write_file(
        dir,
        "block_groups.csv",
        &boundary_csv(
            "GEOID",
            &[
                ("060010001001", square(0.0, 0.0, 10.0, 10.0)),
                ("060010001002", square(10.0, 0.0, 20.0, 10.0)),
            ],
        ),
    ));
    sources.precinct_boundaries = Some(write_file(
        dir,
        "precincts.csv",
        &boundary_csv(
            "GEOID20",
            &[
                (AREA_PRECINCT, square(4.0, 0.0, 14.0, 10.0)),
                (KEYED_PRECINCT, square(30.0, 0.0, 40.0, 10.0)),
            ],
        ),
    ));
    sources.district_boundaries = Some(write_file(
        dir,
        "districts.csv",
        &boundary_csv(
            "CD118FP",
            &[("01", square(0.0, 0.0, 25.0, 10.0)), ("02", square(25.0, 0.0, 50.0, 10.0))],
        ),
    ));
    sources.block_vtd_assignments = Some(write_file(
        dir,
        "baf_vtd.txt",
        "BLOCKID|COUNTYFP|DISTRICT\n060010002001000|001|000200\n060010002001001|001|000200\n",
    ));
    sources.block_cd_assignments = Some(write_file(
        dir,
        "baf_cd.txt",
        "BLOCKID|DISTRICT\n060010002001000|05\n060010002001001|05\n",
    ));
    sources.election_wide = Some(write_file(
        dir,
        "sov.csv",
        &wide_election_csv(&[
            ("X-99", "001", "100", 600, 300, 950),
            (KEYED_PRECINCT, "001", "200", 500, 100, 620),
        ]),
    ));

    config
}

/// Config that reuses whatever is already stored
pub fn stored_data_config() -> PipelineConfig {
    PipelineConfig::default()
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PrecinctState {
    pub precinct_key: String,
    pub cd_number: Option<i64>,
    pub total_pop: Option<i64>,
    pub pop_18_29: Option<i64>,
    pub youth_share: Option<f64>,
    pub dem_votes: Option<i64>,
    pub total_votes: Option<i64>,
    pub dem_margin: Option<f64>,
    pub score: Option<f64>,
    pub tier: Option<String>,
    pub pipeline_run_id: Option<i64>,
    pub geom_simplified_wkt: Option<String>,
}

pub async fn precinct(pool: &SqlitePool, key: &str) -> PrecinctState {
    sqlx::query_as::<_, PrecinctState>(
        r#"
        SELECT precinct_key, cd_number, total_pop, pop_18_29, youth_share, dem_votes,
               total_votes, dem_margin, score, tier, pipeline_run_id, geom_simplified_wkt
        FROM precincts
        WHERE precinct_key = ?
        "#,
    )
    .bind(key)
    .fetch_one(pool)
    .await
    .unwrap()
}
