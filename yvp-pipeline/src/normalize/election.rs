//! Election result backends
//!
//! - [`WidePrecinctCsv`]: one row per precinct with party columns for the
//!   configured contest (primary)
//! - [`LongCandidateCsv`]: one row per candidate per precinct, filtered to the
//!   configured contest and aggregated by party (alternate)
//!
//! Every record carries two join keys: the precinct id column value and, when
//! county and precinct code are both present, a composite fallback key in the
//! VTD GEOID scheme.

use super::coerce::{parse_count, vote_shares};
use super::{field, open_csv, require_column};
use crate::error::{PipelineError, Result};
use crate::models::{ElectionRecord, Normalized, SourceStats};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};
use yvp_common::config::ElectionSchema;

/// Backend that yields one tally per precinct for the configured contest
pub trait ElectionSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn normalize(&self) -> Result<Normalized<ElectionRecord>>;
}

/// `state + county(3) + code(6)`, uppercased and zero-padded
///
/// County values longer than three digits are taken as full state+county FIPS
/// and trimmed to their last three characters. Non-numeric county values
/// yield no key.
pub fn fallback_key(state_fips: &str, county_fips: &str, precinct_code: &str) -> Option<String> {
    let county = county_fips.trim();
    let code = precinct_code.trim();
    if county.is_empty() || code.is_empty() || !county.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let county = if county.len() > 3 {
        &county[county.len() - 3..]
    } else {
        county
    };

    Some(format!(
        "{}{:0>3}{:0>6}",
        state_fips,
        county,
        code.to_uppercase()
    ))
}

fn make_record(
    precinct_key: String,
    fallback_key: Option<String>,
    county_name: String,
    dem_votes: i64,
    rep_votes: i64,
    total_votes: i64,
) -> ElectionRecord {
    let (dem_pct, dem_margin) = vote_shares(dem_votes, rep_votes, total_votes);
    ElectionRecord {
        precinct_key,
        fallback_key,
        county_name,
        dem_votes,
        rep_votes,
        total_votes,
        dem_pct,
        dem_margin,
    }
}

fn optional_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

/// Wide precinct-level CSV (RDH layout)
#[derive(Debug, Clone)]
pub struct WidePrecinctCsv {
    pub path: PathBuf,
    pub schema: ElectionSchema,
    pub state_fips: String,
}

impl WidePrecinctCsv {
    pub fn new(path: impl Into<PathBuf>, schema: ElectionSchema, state_fips: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            schema,
            state_fips: state_fips.into(),
        }
    }
}

impl ElectionSource for WidePrecinctCsv {
    fn name(&self) -> &'static str {
        "election_wide"
    }

    fn normalize(&self) -> Result<Normalized<ElectionRecord>> {
        let source = self.name();
        let schema = &self.schema;
        let mut reader = open_csv(source, &self.path, b',')?;
        let headers = reader.headers()?.clone();

        let id_idx = require_column(source, &headers, &schema.precinct_id_column)?;
        let dem_idx = require_column(source, &headers, &schema.dem_column)?;
        let rep_idx = require_column(source, &headers, &schema.rep_column)?;
        let total_idx = require_column(source, &headers, &schema.total_column)?;
        let county_name_idx = optional_column(&headers, &schema.county_name_column);
        let county_fips_idx = optional_column(&headers, &schema.county_fips_column);
        let code_idx = optional_column(&headers, &schema.precinct_code_column);

        let mut stats = SourceStats::default();
        let mut records = Vec::new();

        for row in reader.records() {
            let row = row?;
            stats.rows_read += 1;

            let precinct_key = field(&row, id_idx);
            if precinct_key.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let fallback = match (county_fips_idx, code_idx) {
                (Some(c), Some(p)) => fallback_key(&self.state_fips, field(&row, c), field(&row, p)),
                _ => None,
            };
            let county_name = county_name_idx
                .map(|i| field(&row, i).to_string())
                .unwrap_or_default();

            records.push(make_record(
                precinct_key.to_string(),
                fallback,
                county_name,
                parse_count(field(&row, dem_idx)).unwrap_or(0),
                parse_count(field(&row, rep_idx)).unwrap_or(0),
                parse_count(field(&row, total_idx)).unwrap_or(0),
            ));
        }

        info!(source, path = %self.path.display(), rows = stats.rows_read, "Normalized wide election extract");
        Ok(Normalized::new(records, stats))
    }
}

/// Long candidate-level CSV (Secretary of State layout)
#[derive(Debug, Clone)]
pub struct LongCandidateCsv {
    pub path: PathBuf,
    pub schema: ElectionSchema,
    pub state_fips: String,
    pub contest: String,
}

/// Column positions resolved from normalized headers
struct LongColumns {
    precinct_id: usize,
    party: usize,
    votes: usize,
    county_name: Option<usize>,
    contest: Option<usize>,
    county_fips: Option<usize>,
    precinct_code: Option<usize>,
}

/// Trim, uppercase, spaces → `_`
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_uppercase().replace(' ', "_")
}

impl LongCandidateCsv {
    pub fn new(
        path: impl Into<PathBuf>,
        schema: ElectionSchema,
        state_fips: impl Into<String>,
        contest: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            schema,
            state_fips: state_fips.into(),
            contest: contest.into(),
        }
    }

    /// Configured names win; otherwise the first header containing the marker words
    fn resolve_columns(&self, headers: &[String]) -> Result<LongColumns> {
        let source = self.name();
        let exact = |name: &str| -> Option<usize> {
            let wanted = normalize_header(name);
            headers.iter().position(|h| *h == wanted)
        };
        let containing = |needles: &[&str], excluded: &[&str]| -> Option<usize> {
            headers.iter().position(|h| {
                needles.iter().all(|n| h.contains(n)) && !excluded.iter().any(|x| h.contains(x))
            })
        };
        let required = |idx: Option<usize>, what: &str| -> Result<usize> {
            idx.ok_or_else(|| {
                PipelineError::source_failure(source, format!("missing required column for {}", what))
            })
        };

        let county_fips = exact(self.schema.county_fips_column.as_str());
        let county_name = exact(self.schema.county_name_column.as_str())
            .or_else(|| containing(&["COUNTY"], &["FP", "FIPS", "CODE"]));

        Ok(LongColumns {
            precinct_id: required(
                exact(self.schema.precinct_id_column.as_str()).or_else(|| containing(&["PRECINCT", "ID"], &[])),
                "precinct id",
            )?,
            party: required(containing(&["PARTY"], &[]), "party")?,
            votes: required(containing(&["VOTES"], &["TOTAL"]), "votes")?,
            county_name,
            contest: containing(&["CONTEST"], &[]),
            county_fips,
            precinct_code: exact(self.schema.precinct_code_column.as_str()),
        })
    }
}

/// Running aggregate for one `(precinct id, county)` group
struct Tally {
    precinct_key: String,
    fallback_key: Option<String>,
    county_name: String,
    dem: i64,
    rep: i64,
    total: i64,
}

/// County name when present, otherwise the county FIPS value
fn county_label(row: &csv::StringRecord, cols: &LongColumns) -> String {
    let name = cols.county_name.map(|i| field(row, i)).unwrap_or("");
    if !name.is_empty() {
        return name.to_string();
    }
    cols.county_fips.map(|i| field(row, i).to_string()).unwrap_or_default()
}

impl ElectionSource for LongCandidateCsv {
    fn name(&self) -> &'static str {
        "election_long"
    }

    fn normalize(&self) -> Result<Normalized<ElectionRecord>> {
        let source = self.name();
        let mut reader = open_csv(source, &self.path, b',')?;
        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
        let cols = self.resolve_columns(&headers)?;
        let contest = self.contest.to_uppercase();

        let mut stats = SourceStats::default();
        // Precinct ids repeat across counties
        let mut order: Vec<(String, String)> = Vec::new();
        let mut tallies: HashMap<(String, String), Tally> = HashMap::new();
        let mut filtered_out = 0usize;

        for row in reader.records() {
            let row = row?;
            stats.rows_read += 1;

            if let Some(i) = cols.contest {
                if !field(&row, i).to_uppercase().contains(&contest) {
                    filtered_out += 1;
                    continue;
                }
            }

            let precinct_key = field(&row, cols.precinct_id);
            if precinct_key.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let votes = parse_count(field(&row, cols.votes)).unwrap_or(0);
            let party = field(&row, cols.party).to_uppercase();

            let county = county_label(&row, &cols);
            let group = (precinct_key.to_string(), county);

            let tally = tallies.entry(group.clone()).or_insert_with(|| {
                let fallback = match (cols.county_fips, cols.precinct_code) {
                    (Some(c), Some(p)) => {
                        fallback_key(&self.state_fips, field(&row, c), field(&row, p))
                    }
                    _ => None,
                };
                let tally = Tally {
                    precinct_key: group.0.clone(),
                    fallback_key: fallback,
                    county_name: group.1.clone(),
                    dem: 0,
                    rep: 0,
                    total: 0,
                };
                order.push(group);
                tally
            });

            if party.contains("DEM") {
                tally.dem += votes;
            }
            if party.contains("REP") {
                tally.rep += votes;
            }
            tally.total += votes;
        }

        let records = order
            .into_iter()
            .filter_map(|group| {
                tallies.remove(&group).map(|t| {
                    make_record(t.precinct_key, t.fallback_key, t.county_name, t.dem, t.rep, t.total)
                })
            })
            .collect::<Vec<_>>();

        debug!(source, filtered_out, "Rows outside the configured contest");
        info!(
            source,
            path = %self.path.display(),
            rows = stats.rows_read,
            precincts = records.len(),
            "Normalized long election extract"
        );
        Ok(Normalized::new(records, stats))
    }
}
