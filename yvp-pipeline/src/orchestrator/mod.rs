//! Pipeline orchestrator
//!
//! Runs the stages in fixed order against the shared precinct store and keeps
//! the run ledger honest about the outcome.
//!
//! # Stage Progression
//! INGEST → CROSSWALK → MERGE → SCORING → SIMPLIFY
//!
//! Each stage is handled by a `phase_*` method in its own module. Every stage
//! commits on its own; a failure in a later stage leaves earlier commits in
//! place and marks the run `failed`.

use crate::db::runs;
use crate::error::{PipelineError, Result};
use crate::models::{PipelineRun, RunSummary};
use sqlx::SqlitePool;
use tracing::{error, info};
use yvp_common::PipelineConfig;

mod phase_crosswalk;
mod phase_ingest;
mod phase_merge;
mod phase_scoring;
mod phase_simplify;

/// Stage names as they appear in logs and failure messages
pub mod stage {
    pub const INGEST: &str = "ingest";
    pub const CROSSWALK: &str = "crosswalk";
    pub const MERGE: &str = "merge";
    pub const SCORING: &str = "scoring";
    pub const SIMPLIFY: &str = "simplify";
}

/// Pipeline orchestrator service
pub struct PipelineOrchestrator {
    db: SqlitePool,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator
    ///
    /// `config` must already be validated; it is not modified for the lifetime
    /// of the orchestrator.
    pub fn new(db: SqlitePool, config: PipelineConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one full run and record it in the ledger
    ///
    /// Returns the stage summary on success. On a stage failure the ledger row
    /// is marked `failed` before the error is returned.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut run = PipelineRun::start(self.config.snapshot());
        let run_id = runs::start_run(&self.db, &mut run).await?;
        info!(run_id, "Pipeline run started");

        match self.execute_stages(run_id).await {
            Ok(summary) => {
                let transition = run.complete(summary.scoring.scored as i64)?;
                runs::finish_run(&self.db, &run).await?;
                info!(
                    run_id,
                    status = %transition.new_status,
                    precincts_scored = summary.scoring.scored,
                    "Pipeline run finished"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(run_id, error = %e, "Pipeline run failed");
                run.fail(e.to_string())?;
                if let Err(ledger_err) = runs::finish_run(&self.db, &run).await {
                    error!(run_id, error = %ledger_err, "Failed to record run failure in ledger");
                }
                Err(e)
            }
        }
    }

    async fn execute_stages(&self, run_id: i64) -> Result<RunSummary> {
        let mut summary = RunSummary {
            run_id,
            ..RunSummary::default()
        };

        summary.ingest = self.phase_ingest().await.map_err(|e| in_stage(stage::INGEST, e))?;
        summary.crosswalk = self
            .phase_crosswalk()
            .await
            .map_err(|e| in_stage(stage::CROSSWALK, e))?;
        summary.merge = self.phase_merge().await.map_err(|e| in_stage(stage::MERGE, e))?;
        summary.scoring = self
            .phase_scoring(run_id)
            .await
            .map_err(|e| in_stage(stage::SCORING, e))?;
        summary.simplify = self
            .phase_simplify()
            .await
            .map_err(|e| in_stage(stage::SIMPLIFY, e))?;

        Ok(summary)
    }
}

/// Attach the stage name to errors that do not already identify their origin
fn in_stage(stage: &str, error: PipelineError) -> PipelineError {
    match error {
        e @ (PipelineError::Source { .. }
        | PipelineError::Stage { .. }
        | PipelineError::InvalidTransition { .. }) => e,
        other => PipelineError::stage_failure(stage, other.to_string()),
    }
}

/// Run blocking file parsing or geometry work off the async executor
async fn blocking<T, F>(stage: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::stage_failure(stage, format!("worker task failed: {}", e)))?
}
