//! Canonical records produced by the source normalizers
//!
//! Every record carries a resolved join key. Numeric fields that could not be
//! parsed are `None`; the row itself is never dropped for that reason.

use yvp_common::geometry::Boundary;

/// Population counts for one census block group
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicRecord {
    pub geoid: String,
    pub county_fips: Option<String>,
    pub total_pop: Option<i64>,
    pub pop_18_29: Option<i64>,
    /// `None` when total population is zero or absent
    pub youth_share: Option<f64>,
}

/// Keyed boundary from a WKT boundary file
#[derive(Debug, Clone)]
pub struct BoundaryRecord {
    pub key: String,
    pub county_fips: String,
    /// `None` when the source geometry was empty or invalid
    pub geometry: Option<Boundary>,
}

/// Congressional district polygon
#[derive(Debug, Clone)]
pub struct DistrictRecord {
    pub district: i64,
    pub geometry: Boundary,
}

/// One precinct's tally for the configured contest
#[derive(Debug, Clone, PartialEq)]
pub struct ElectionRecord {
    /// Primary natural key (precinct id column)
    pub precinct_key: String,
    /// Composite `state + county(3) + code(6)` key, when derivable
    pub fallback_key: Option<String>,
    pub county_name: String,
    pub dem_votes: i64,
    pub rep_votes: i64,
    pub total_votes: i64,
    pub dem_pct: Option<f64>,
    pub dem_margin: Option<f64>,
}

/// Census block joined to its voting district and congressional district
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAssignmentRecord {
    pub block_geoid: String,
    pub precinct_key: String,
    pub district: i64,
}
