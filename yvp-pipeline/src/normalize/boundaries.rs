//! WKT boundary files
//!
//! Block group, precinct and district boundaries all arrive as CSV with a key
//! column and a WKT geometry column. A bad geometry never drops a keyed row:
//! the record is kept with `geometry: None` and counted.

use super::{field, open_csv, require_column};
use crate::error::Result;
use crate::models::{BoundaryRecord, DistrictRecord, Normalized, SourceStats};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use yvp_common::config::BoundarySchema;
use yvp_common::geometry;

/// Keyed boundary file (block groups or precincts)
#[derive(Debug, Clone)]
pub struct BoundaryFile {
    pub source_name: &'static str,
    pub path: PathBuf,
    pub schema: BoundarySchema,
}

impl BoundaryFile {
    pub fn new(source_name: &'static str, path: impl Into<PathBuf>, schema: BoundarySchema) -> Self {
        Self {
            source_name,
            path: path.into(),
            schema,
        }
    }

    pub fn normalize(&self) -> Result<Normalized<BoundaryRecord>> {
        let source = self.source_name;
        let mut reader = open_csv(source, &self.path, b',')?;
        let headers = reader.headers()?.clone();

        let key_idx = require_column(source, &headers, &self.schema.key_column)?;
        let geom_idx = require_column(source, &headers, &self.schema.geometry_column)?;
        let county_idx = self
            .schema
            .county_column
            .as_deref()
            .map(|c| require_column(source, &headers, c))
            .transpose()?;

        let mut stats = SourceStats::default();
        let mut records = Vec::new();

        for row in reader.records() {
            let row = row?;
            stats.rows_read += 1;

            let key = field(&row, key_idx);
            if key.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let county_fips = match county_idx {
                Some(i) if !field(&row, i).is_empty() => field(&row, i).to_string(),
                _ => key.chars().take(5).collect(),
            };

            let geometry = match geometry::parse_valid_wkt(field(&row, geom_idx)) {
                Ok(boundary) => Some(boundary),
                Err(e) => {
                    debug!(source, key, error = %e, "Invalid boundary geometry");
                    stats.geometry_errors += 1;
                    None
                }
            };

            records.push(BoundaryRecord {
                key: key.to_string(),
                county_fips,
                geometry,
            });
        }

        if stats.geometry_errors > 0 {
            warn!(
                source,
                geometry_errors = stats.geometry_errors,
                "Boundary file contained invalid geometries"
            );
        }
        info!(source, path = %self.path.display(), rows = stats.rows_read, "Normalized boundary file");
        Ok(Normalized::new(records, stats))
    }
}

/// Congressional district boundary file
#[derive(Debug, Clone)]
pub struct DistrictBoundaryFile {
    pub path: PathBuf,
    pub schema: BoundarySchema,
}

impl DistrictBoundaryFile {
    pub const SOURCE: &'static str = "district_boundaries";

    pub fn new(path: impl Into<PathBuf>, schema: BoundarySchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    /// Rows with a non-numeric district or no usable polygon are skipped
    pub fn normalize(&self) -> Result<Normalized<DistrictRecord>> {
        let source = Self::SOURCE;
        let mut reader = open_csv(source, &self.path, b',')?;
        let headers = reader.headers()?.clone();

        let key_idx = require_column(source, &headers, &self.schema.key_column)?;
        let geom_idx = require_column(source, &headers, &self.schema.geometry_column)?;

        let mut stats = SourceStats::default();
        let mut records = Vec::new();

        for row in reader.records() {
            let row = row?;
            stats.rows_read += 1;

            let Some(district) = parse_district_number(field(&row, key_idx)) else {
                stats.skipped += 1;
                continue;
            };

            match geometry::parse_valid_wkt(field(&row, geom_idx)) {
                Ok(geometry) => records.push(DistrictRecord { district, geometry }),
                Err(e) => {
                    warn!(source, district, error = %e, "Skipping district with invalid geometry");
                    stats.geometry_errors += 1;
                }
            }
        }

        info!(source, path = %self.path.display(), districts = records.len(), "Normalized district boundaries");
        Ok(Normalized::new(records, stats))
    }
}

/// `"01"` → 1; `"ZZ"`, blank, zero and non-numeric codes are unassigned
pub fn parse_district_number(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}
