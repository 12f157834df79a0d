//! Phase 2: CROSSWALK
//!
//! Apportion demographics onto precincts and assign congressional districts.
//! Both fields are recomputed for every precinct; a precinct no strategy can
//! resolve is written back as null rather than keeping a stale value.

use super::{blocking, stage, PipelineOrchestrator};
use crate::db::{self, precincts};
use crate::db::precincts::{DemographicUpdate, DistrictUpdate};
use crate::error::Result;
use crate::models::CrosswalkReport;
use crate::services::{demographic_chain, district_chain, PrecinctContext};
use tracing::{info, warn};

impl PipelineOrchestrator {
    pub(super) async fn phase_crosswalk(&self) -> Result<CrosswalkReport> {
        info!(stage = stage::CROSSWALK, "Phase 2: CROSSWALK");

        let shapes = precincts::load_precinct_shapes(&self.db).await?;
        if shapes.is_empty() {
            warn!(stage = stage::CROSSWALK, "No precincts loaded; nothing to crosswalk");
            return Ok(CrosswalkReport::default());
        }
        let units = db::load_demographic_units(&self.db).await?;
        let boundaries = db::load_district_boundaries(&self.db).await?;
        let blocks = db::load_block_districts(&self.db).await?;

        let (demographic_updates, district_updates, report) =
            blocking(stage::CROSSWALK, move || {
                let mut invalid_geometry = 0usize;
                let contexts: Vec<PrecinctContext> = shapes
                    .into_iter()
                    .map(|shape| {
                        let (ctx, invalid) =
                            PrecinctContext::from_wkt(shape.precinct_key, shape.geom_wkt.as_deref());
                        if invalid {
                            invalid_geometry += 1;
                        }
                        ctx
                    })
                    .collect();

                let (estimates, mut demographics) = demographic_chain(&units).resolve_all(&contexts);
                let (districts, mut district_report) =
                    district_chain(&blocks, &boundaries).resolve_all(&contexts);
                demographics.invalid_geometry = invalid_geometry;
                district_report.invalid_geometry = invalid_geometry;

                let demographic_updates: Vec<DemographicUpdate> = contexts
                    .iter()
                    .zip(estimates)
                    .map(|(ctx, estimate)| DemographicUpdate {
                        precinct_key: ctx.precinct_key.clone(),
                        total_pop: estimate.map(|e| e.total_pop),
                        pop_18_29: estimate.map(|e| e.pop_18_29),
                        youth_share: estimate.and_then(|e| e.youth_share),
                    })
                    .collect();
                let district_updates: Vec<DistrictUpdate> = contexts
                    .iter()
                    .zip(districts)
                    .map(|(ctx, cd_number)| DistrictUpdate {
                        precinct_key: ctx.precinct_key.clone(),
                        cd_number,
                    })
                    .collect();

                Ok((
                    demographic_updates,
                    district_updates,
                    CrosswalkReport {
                        demographics,
                        districts: district_report,
                    },
                ))
            })
            .await?;

        let mut tx = self.db.begin().await?;
        precincts::apply_demographics(&mut *tx, &demographic_updates).await?;
        precincts::apply_districts(&mut *tx, &district_updates).await?;
        tx.commit().await?;

        for (name, resolution) in [("demographics", &report.demographics), ("districts", &report.districts)] {
            info!(
                stage = stage::CROSSWALK,
                field = name,
                resolved = resolution.resolved(),
                unresolved = resolution.unresolved,
                invalid_geometry = resolution.invalid_geometry,
                by_strategy = ?resolution.resolved_by,
                "Crosswalk resolved"
            );
        }
        if report.demographics.invalid_geometry > 0 {
            warn!(
                stage = stage::CROSSWALK,
                count = report.demographics.invalid_geometry,
                "Precincts with invalid boundaries skipped by spatial strategies"
            );
        }

        Ok(report)
    }
}
