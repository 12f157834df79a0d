//! CSV export of scored precincts
//!
//! Rows come from the same [`PrecinctQuery`] readers use, so the export is
//! ordered by score descending and contains scored precincts only. Geometry is
//! left out.

use crate::error::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::Write;
use std::path::Path;
use tracing::info;
use yvp_common::db::query::{PrecinctFeature, PrecinctQuery};

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    precinct_key: &'a str,
    county_fips: &'a str,
    cd_number: Option<i64>,
    total_pop: Option<i64>,
    pop_18_29: Option<i64>,
    youth_share: Option<f64>,
    dem_votes: Option<i64>,
    rep_votes: Option<i64>,
    total_votes: Option<i64>,
    dem_pct: Option<f64>,
    dem_margin: Option<f64>,
    score: f64,
    tier: &'a str,
}

impl<'a> From<&'a PrecinctFeature> for ExportRow<'a> {
    fn from(p: &'a PrecinctFeature) -> Self {
        Self {
            precinct_key: &p.precinct_key,
            county_fips: &p.county_fips,
            cd_number: p.cd_number,
            total_pop: p.total_pop,
            pop_18_29: p.pop_18_29,
            youth_share: p.youth_share,
            dem_votes: p.dem_votes,
            rep_votes: p.rep_votes,
            total_votes: p.total_votes,
            dem_pct: p.dem_pct,
            dem_margin: p.dem_margin,
            score: p.score,
            tier: &p.tier,
        }
    }
}

/// Write rows to any writer; returns the number written
pub fn write_precincts<W: Write>(writer: W, precincts: &[PrecinctFeature]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for precinct in precincts {
        csv_writer.serialize(ExportRow::from(precinct))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(precincts.len())
}

/// Export every scored precinct to `path`
pub async fn export_scored_precincts(pool: &SqlitePool, path: &Path) -> Result<usize> {
    let precincts = PrecinctQuery::new().unbounded().fetch(pool).await?;
    let file = std::fs::File::create(path).map_err(yvp_common::Error::from)?;
    let written = write_precincts(file, &precincts)?;
    info!(path = %path.display(), rows = written, "Exported scored precincts");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(key: &str, score: f64, tier: &str) -> PrecinctFeature {
        PrecinctFeature {
            precinct_key: key.to_string(),
            county_fips: "06001".to_string(),
            cd_number: Some(12),
            total_pop: Some(1000),
            pop_18_29: Some(300),
            youth_share: Some(0.3),
            dem_votes: None,
            rep_votes: None,
            total_votes: None,
            dem_pct: None,
            dem_margin: Some(0.25),
            score,
            tier: tier.to_string(),
            pipeline_run_id: Some(1),
            geometry_wkt: Some("POLYGON((0 0,1 0,1 1,0 0))".to_string()),
        }
    }

    #[test]
    fn test_header_and_rows_without_geometry() {
        let mut buffer = Vec::new();
        let written = write_precincts(&mut buffer, &[feature("A", 0.81, "priority"), feature("B", 0.4, "watchlist")])
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(written, 2);
        assert_eq!(
            lines[0],
            "precinct_key,county_fips,cd_number,total_pop,pop_18_29,youth_share,dem_votes,rep_votes,total_votes,dem_pct,dem_margin,score,tier"
        );
        assert_eq!(lines[1], "A,06001,12,1000,300,0.3,,,,,0.25,0.81,priority");
        assert!(!text.contains("POLYGON"));
    }
}
