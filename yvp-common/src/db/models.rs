//! Row models shared by the pipeline and read-only consumers

use serde::{Deserialize, Serialize};

/// Stored precinct row with every derived attribute
///
/// Geometry columns are left as WKT; callers that need shapes parse them with
/// [`crate::geometry::parse_wkt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Precinct {
    pub precinct_key: String,
    pub county_fips: String,
    pub cd_number: Option<i64>,
    pub geom_wkt: Option<String>,
    pub geom_simplified_wkt: Option<String>,
    pub total_pop: Option<i64>,
    pub pop_18_29: Option<i64>,
    pub youth_share: Option<f64>,
    pub dem_votes: Option<i64>,
    pub rep_votes: Option<i64>,
    pub total_votes: Option<i64>,
    pub dem_pct: Option<f64>,
    pub dem_margin: Option<f64>,
    pub score: Option<f64>,
    pub tier: Option<String>,
    pub pipeline_run_id: Option<i64>,
}

impl Precinct {
    /// Column list matching the field order above
    pub const COLUMNS: &'static str = "precinct_key, county_fips, cd_number, geom_wkt, \
        geom_simplified_wkt, total_pop, pop_18_29, youth_share, dem_votes, rep_votes, \
        total_votes, dem_pct, dem_margin, score, tier, pipeline_run_id";

    /// True when both scoring inputs are present
    pub fn has_scoring_inputs(&self) -> bool {
        self.youth_share.is_some() && self.dem_margin.is_some()
    }
}

/// Census block group with counts and boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DemographicUnit {
    pub geoid: String,
    pub county_fips: Option<String>,
    pub total_pop: Option<i64>,
    pub pop_18_29: Option<i64>,
    pub youth_share: Option<f64>,
    pub geom_wkt: Option<String>,
    pub vintage: i64,
}

/// One precinct's result for one contest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ElectionResult {
    pub id: i64,
    pub election_date: String,
    pub contest_name: String,
    pub county_name: String,
    pub precinct_key: String,
    pub fallback_key: Option<String>,
    pub dem_votes: i64,
    pub rep_votes: i64,
    pub total_votes: i64,
    pub dem_pct: Option<f64>,
    pub dem_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DistrictBoundary {
    pub district: i64,
    pub geom_wkt: String,
}

/// Ledger row as stored; the status state machine lives with the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: i64,
    pub status: String,
    pub config_snapshot: String,
    pub precincts_scored: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}
