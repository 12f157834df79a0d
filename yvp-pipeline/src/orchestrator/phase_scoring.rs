//! Phase 4: SCORING

use super::{stage, PipelineOrchestrator};
use crate::db::precincts;
use crate::error::Result;
use crate::models::ScoringReport;
use crate::services::{score_all, ScoringParams};
use tracing::info;

impl PipelineOrchestrator {
    /// Score every precinct and stamp scored rows with `run_id`
    pub(super) async fn phase_scoring(&self, run_id: i64) -> Result<ScoringReport> {
        info!(stage = stage::SCORING, "Phase 4: SCORING");

        let params = ScoringParams::from_config(&self.config);
        let inputs = precincts::load_scoring_inputs(&self.db).await?;
        let (updates, report) = score_all(&inputs, &params);

        let mut tx = self.db.begin().await?;
        precincts::apply_scores(&mut *tx, &updates, run_id).await?;
        tx.commit().await?;

        info!(
            stage = stage::SCORING,
            precincts = inputs.len(),
            scored = report.scored,
            reset = report.reset,
            by_tier = ?report.by_tier,
            "Scoring complete"
        );

        Ok(report)
    }
}
