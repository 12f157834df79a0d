//! Phase 5: SIMPLIFY
//!
//! Regenerate display boundaries for every precinct that has one. Failures are
//! per precinct and never fail the stage.

use super::{blocking, stage, PipelineOrchestrator};
use crate::db::precincts;
use crate::error::Result;
use crate::models::SimplifyReport;
use crate::services::simplify_all;
use tracing::{info, warn};

impl PipelineOrchestrator {
    pub(super) async fn phase_simplify(&self) -> Result<SimplifyReport> {
        info!(stage = stage::SIMPLIFY, "Phase 5: SIMPLIFY");

        let tolerance = self.config.geometry.simplification_tolerance;
        let shapes = precincts::load_precinct_shapes(&self.db).await?;
        let (updates, report) =
            blocking(stage::SIMPLIFY, move || Ok(simplify_all(&shapes, tolerance))).await?;

        let mut tx = self.db.begin().await?;
        precincts::apply_simplified(&mut *tx, &updates).await?;
        tx.commit().await?;

        if report.failed > 0 {
            warn!(
                stage = stage::SIMPLIFY,
                failed = report.failed,
                "Some boundaries could not be simplified; readers fall back to full resolution"
            );
        }
        info!(
            stage = stage::SIMPLIFY,
            simplified = report.simplified,
            tolerance,
            "Simplification complete"
        );

        Ok(report)
    }
}
