//! Demographic count backends
//!
//! - [`NhgisExtract`]: static NHGIS-style CSV extract (primary)
//! - [`CensusApiResponse`]: saved ACS API response, a JSON array of arrays whose
//!   first row is the header (alternate)
//!
//! Both produce one [`DemographicRecord`] per block group with youth (18–29)
//! population summed from the configured male and female age variables.

use super::coerce::{parse_count, sum_present, youth_share};
use super::{field, open_csv, require_column};
use crate::error::{PipelineError, Result};
use crate::models::{DemographicRecord, Normalized, SourceStats};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};
use yvp_common::config::{CensusApiSchema, NhgisSchema};

/// Backend that yields demographic counts keyed by block group GEOID
pub trait DemographicSource: Send + Sync {
    /// Source name used in logs and error messages
    fn name(&self) -> &'static str;

    fn normalize(&self) -> Result<Normalized<DemographicRecord>>;
}

fn county_from_geoid(geoid: &str) -> Option<String> {
    geoid.get(..5).map(str::to_string)
}

fn build_record(geoid: String, total_pop: Option<i64>, youth: Vec<Option<i64>>) -> DemographicRecord {
    let pop_18_29 = sum_present(youth);
    DemographicRecord {
        county_fips: county_from_geoid(&geoid),
        youth_share: youth_share(total_pop, pop_18_29),
        geoid,
        total_pop,
        pop_18_29,
    }
}

/// NHGIS-style CSV extract
#[derive(Debug, Clone)]
pub struct NhgisExtract {
    pub path: PathBuf,
    pub schema: NhgisSchema,
}

impl NhgisExtract {
    pub fn new(path: impl Into<PathBuf>, schema: NhgisSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }
}

impl DemographicSource for NhgisExtract {
    fn name(&self) -> &'static str {
        "census_extract"
    }

    fn normalize(&self) -> Result<Normalized<DemographicRecord>> {
        let source = self.name();
        let mut reader = open_csv(source, &self.path, b',')?;
        let headers = reader.headers()?.clone();

        let geoid_idx = require_column(source, &headers, &self.schema.geoid_column)?;
        let total_idx = require_column(source, &headers, &self.schema.total_pop_var)?;
        let youth_idx = self
            .schema
            .youth_vars
            .iter()
            .map(|v| require_column(source, &headers, v))
            .collect::<Result<Vec<_>>>()?;

        let mut stats = SourceStats::default();
        let mut records = Vec::new();

        for row in reader.records() {
            let row = row?;
            stats.rows_read += 1;

            let geoid = field(&row, geoid_idx);
            if geoid.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let total_pop = parse_count(field(&row, total_idx));
            let youth = youth_idx.iter().map(|&i| parse_count(field(&row, i))).collect();
            records.push(build_record(geoid.to_string(), total_pop, youth));
        }

        info!(
            source,
            path = %self.path.display(),
            rows = stats.rows_read,
            skipped = stats.skipped,
            "Normalized demographic extract"
        );
        Ok(Normalized::new(records, stats))
    }
}

/// Saved Census API (ACS 5-year) response body
#[derive(Debug, Clone)]
pub struct CensusApiResponse {
    pub path: PathBuf,
    pub schema: CensusApiSchema,
}

impl CensusApiResponse {
    pub fn new(path: impl Into<PathBuf>, schema: CensusApiSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    /// Normalize an in-memory response body
    pub fn normalize_str(&self, body: &str) -> Result<Normalized<DemographicRecord>> {
        let source = self.name();
        let table: Vec<Vec<Value>> = serde_json::from_str(body).map_err(|e| {
            PipelineError::source_failure(source, format!("malformed API response: {}", e))
        })?;

        let mut rows = table.into_iter();
        let header: Vec<String> = rows
            .next()
            .ok_or_else(|| PipelineError::source_failure(source, "empty API response"))?
            .iter()
            .map(cell_text)
            .collect();

        let column = |name: &str| {
            header.iter().position(|h| h == name).ok_or_else(|| {
                PipelineError::source_failure(source, format!("missing required column '{}'", name))
            })
        };

        let state_idx = column("state")?;
        let county_idx = column("county")?;
        let tract_idx = column("tract")?;
        let bg_idx = column("block group")?;
        let total_idx = column(self.schema.total_pop_var.as_str())?;
        let youth_idx = self
            .schema
            .youth_vars
            .iter()
            .map(|v| column(v.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let mut stats = SourceStats::default();
        let mut records = Vec::new();

        for row in rows {
            stats.rows_read += 1;
            let cell = |i: usize| row.get(i).map(cell_text).unwrap_or_default();

            let parts = [cell(state_idx), cell(county_idx), cell(tract_idx), cell(bg_idx)];
            if parts.iter().any(|p| p.is_empty()) {
                stats.skipped += 1;
                continue;
            }
            let geoid = parts.concat();

            let total_pop = parse_count(&cell(total_idx));
            let youth = youth_idx.iter().map(|&i| parse_count(&cell(i))).collect();
            records.push(build_record(geoid, total_pop, youth));
        }

        debug!(source, rows = stats.rows_read, "Parsed API response");
        Ok(Normalized::new(records, stats))
    }
}

impl DemographicSource for CensusApiResponse {
    fn name(&self) -> &'static str {
        "census_api"
    }

    fn normalize(&self) -> Result<Normalized<DemographicRecord>> {
        let body = std::fs::read_to_string(&self.path).map_err(|e| {
            PipelineError::source_failure(
                self.name(),
                format!("cannot read {}: {}", self.path.display(), e),
            )
        })?;
        let normalized = self.normalize_str(&body)?;
        info!(
            source = self.name(),
            path = %self.path.display(),
            rows = normalized.stats.rows_read,
            "Normalized Census API response"
        );
        Ok(normalized)
    }
}

/// API cells are strings, numbers or null
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_schema() -> CensusApiSchema {
        CensusApiSchema {
            total_pop_var: "B01001_001E".to_string(),
            youth_vars: vec!["B01001_007E".to_string(), "B01001_031E".to_string()],
        }
    }

    #[test]
    fn test_api_response_builds_geoid_and_share() {
        let body = r#"[
            ["B01001_001E","B01001_007E","B01001_031E","state","county","tract","block group"],
            ["1000","150","100","06","001","400100","1"],
            ["0","0","0","06","001","400100","2"],
            ["500",null,"-666666666","06","001","400200","1"]
        ]"#;
        let source = CensusApiResponse::new("unused.json", api_schema());
        let normalized = source.normalize_str(body).unwrap();

        assert_eq!(normalized.records.len(), 3);
        let first = &normalized.records[0];
        assert_eq!(first.geoid, "060014001001");
        assert_eq!(first.county_fips.as_deref(), Some("06001"));
        assert_eq!(first.pop_18_29, Some(250));
        assert_eq!(first.youth_share, Some(0.25));

        // Zero population: share undefined, row kept
        assert_eq!(normalized.records[1].youth_share, None);

        // Null → absent, negative sentinel → 0
        assert_eq!(normalized.records[2].pop_18_29, Some(0));
        assert_eq!(normalized.records[2].youth_share, Some(0.0));
    }

    #[test]
    fn test_api_response_missing_variable_is_source_error() {
        let body = r#"[["B01001_001E","state","county","tract","block group"]]"#;
        let source = CensusApiResponse::new("unused.json", api_schema());
        let err = source.normalize_str(body).unwrap_err();
        assert!(matches!(err, PipelineError::Source { .. }));
        assert!(err.to_string().contains("B01001_007E"));
    }

    #[test]
    fn test_api_response_malformed_json() {
        let source = CensusApiResponse::new("unused.json", api_schema());
        let err = source.normalize_str("{not json").unwrap_err();
        assert!(err.to_string().contains("census_api"));
    }
}
