//! Phase 1: INGEST
//!
//! Normalize every configured raw source and bulk-load it. Sources that are
//! not configured are skipped and whatever was loaded before stays in place.

use super::{blocking, stage, PipelineOrchestrator};
use crate::db::loaders;
use crate::error::Result;
use crate::models::IngestReport;
use crate::normalize::{
    BlockAssignmentFiles, BoundaryFile, CensusApiResponse, DemographicSource, DistrictBoundaryFile,
    NhgisExtract,
};
use tracing::{info, warn};

impl PipelineOrchestrator {
    /// The demographic backend to use, primary extract first
    pub(super) fn demographic_source(&self) -> Option<Box<dyn DemographicSource>> {
        let sources = &self.config.sources;
        match (&sources.census_extract, &sources.census_api_response) {
            (Some(extract), alternate) => {
                if alternate.is_some() {
                    warn!("Both census extract and API response configured; using the extract");
                }
                Some(Box::new(NhgisExtract::new(extract, sources.nhgis_schema.clone())))
            }
            (None, Some(response)) => Some(Box::new(CensusApiResponse::new(
                response,
                sources.census_api_schema.clone(),
            ))),
            (None, None) => None,
        }
    }

    pub(super) async fn phase_ingest(&self) -> Result<IngestReport> {
        info!(stage = stage::INGEST, "Phase 1: INGEST");

        let sources = &self.config.sources;
        let vintage = self.config.census.vintage;
        let mut report = IngestReport::default();

        if let Some(source) = self.demographic_source() {
            let name = source.name();
            let normalized = blocking(stage::INGEST, move || source.normalize()).await?;
            loaders::upsert_demographic_counts(&self.db, &normalized.records, vintage).await?;
            report.record(name, normalized.stats);
        }

        if let Some(path) = &sources.block_group_boundaries {
            let file = BoundaryFile::new(
                "block_group_boundaries",
                path,
                sources.block_group_boundary_schema.clone(),
            );
            let normalized = blocking(stage::INGEST, move || file.normalize()).await?;
            loaders::upsert_demographic_boundaries(&self.db, &normalized.records, vintage).await?;
            report.record("block_group_boundaries", normalized.stats);
        }

        if let Some(path) = &sources.precinct_boundaries {
            let file = BoundaryFile::new(
                "precinct_boundaries",
                path,
                sources.precinct_boundary_schema.clone(),
            );
            let normalized = blocking(stage::INGEST, move || file.normalize()).await?;
            loaders::upsert_precinct_boundaries(&self.db, &normalized.records).await?;
            report.record("precinct_boundaries", normalized.stats);
        }

        if let Some(path) = &sources.district_boundaries {
            let file = DistrictBoundaryFile::new(path, sources.district_boundary_schema.clone());
            let normalized = blocking(stage::INGEST, move || file.normalize()).await?;
            loaders::upsert_district_boundaries(&self.db, &normalized.records).await?;
            report.record(DistrictBoundaryFile::SOURCE, normalized.stats);
        }

        match (&sources.block_vtd_assignments, &sources.block_cd_assignments) {
            (Some(vtd), Some(cd)) => {
                let files = BlockAssignmentFiles::new(vtd, cd);
                let normalized = blocking(stage::INGEST, move || files.normalize()).await?;
                loaders::upsert_block_assignments(&self.db, &normalized.records).await?;
                report.record("block_assignments", normalized.stats);
            }
            (None, None) => {}
            _ => warn!("Block assignments need both the VTD and the CD file; skipping"),
        }

        if report.is_empty() {
            info!(stage = stage::INGEST, "No raw sources configured; using stored data");
        }
        for (source, stats) in &report.sources {
            info!(
                stage = stage::INGEST,
                source = %source,
                rows = stats.rows_read,
                records = stats.records,
                skipped = stats.skipped,
                geometry_errors = stats.geometry_errors,
                "Source loaded"
            );
        }

        Ok(report)
    }
}
