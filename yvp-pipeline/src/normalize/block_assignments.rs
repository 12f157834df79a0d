//! Census block assignment files (BAF)
//!
//! Two pipe-delimited files share the `BLOCKID` column:
//! - block → VTD: `BLOCKID|COUNTYFP|DISTRICT`
//! - block → congressional district: `BLOCKID|DISTRICT`
//!
//! Joined on block id they give, per block, the precinct key it belongs to and
//! the district it lies in; the crosswalk takes a majority vote over them.

use super::boundaries::parse_district_number;
use super::{field, open_csv, require_column};
use crate::error::Result;
use crate::models::{BlockAssignmentRecord, Normalized, SourceStats};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

const SOURCE: &str = "block_assignments";

#[derive(Debug, Clone)]
pub struct BlockAssignmentFiles {
    pub vtd_path: PathBuf,
    pub cd_path: PathBuf,
}

impl BlockAssignmentFiles {
    pub fn new(vtd_path: impl Into<PathBuf>, cd_path: impl Into<PathBuf>) -> Self {
        Self {
            vtd_path: vtd_path.into(),
            cd_path: cd_path.into(),
        }
    }

    /// Join the two files; blocks missing a VTD or a numeric district are skipped
    pub fn normalize(&self) -> Result<Normalized<BlockAssignmentRecord>> {
        let mut stats = SourceStats::default();
        let districts = self.read_districts(&mut stats)?;

        let mut reader = open_csv(SOURCE, &self.vtd_path, b'|')?;
        let headers = reader.headers()?.clone();
        let block_idx = require_column(SOURCE, &headers, "BLOCKID")?;
        let county_idx = require_column(SOURCE, &headers, "COUNTYFP")?;
        let vtd_idx = require_column(SOURCE, &headers, "DISTRICT")?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            stats.rows_read += 1;

            let block = field(&row, block_idx);
            let county = field(&row, county_idx);
            let vtd = field(&row, vtd_idx);
            let state = match block.get(..2) {
                Some(state) if block.len() > 2 && !county.is_empty() && !vtd.is_empty() => state,
                _ => {
                    stats.skipped += 1;
                    continue;
                }
            };

            let Some(&district) = districts.get(block) else {
                stats.skipped += 1;
                continue;
            };

            records.push(BlockAssignmentRecord {
                block_geoid: block.to_string(),
                precinct_key: format!("{}{}{}", state, county, vtd),
                district,
            });
        }

        info!(
            source = SOURCE,
            blocks = records.len(),
            skipped = stats.skipped,
            "Joined block assignment files"
        );
        Ok(Normalized::new(records, stats))
    }

    fn read_districts(&self, stats: &mut SourceStats) -> Result<HashMap<String, i64>> {
        let mut reader = open_csv(SOURCE, &self.cd_path, b'|')?;
        let headers = reader.headers()?.clone();
        let block_idx = require_column(SOURCE, &headers, "BLOCKID")?;
        let district_idx = require_column(SOURCE, &headers, "DISTRICT")?;

        let mut districts = HashMap::new();
        for row in reader.records() {
            let row = row?;
            stats.rows_read += 1;

            let block = field(&row, block_idx);
            match parse_district_number(field(&row, district_idx)) {
                Some(district) if !block.is_empty() => {
                    districts.insert(block.to_string(), district);
                }
                _ => stats.skipped += 1,
            }
        }
        Ok(districts)
    }
}
