//! Pipeline run ledger persistence

use crate::error::{PipelineError, Result};
use crate::models::{PipelineRun, RunStatus};
use sqlx::SqlitePool;
use yvp_common::db::PipelineRunRow;

/// Insert a `running` row and record its id on `run`
pub async fn start_run(pool: &SqlitePool, run: &mut PipelineRun) -> Result<i64> {
    let snapshot = serde_json::to_string(&run.snapshot)?;

    let id = sqlx::query(
        r#"
        INSERT INTO pipeline_runs (status, config_snapshot, started_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(RunStatus::Running.as_str())
    .bind(snapshot)
    .bind(run.started_at.to_rfc3339())
    .execute(pool)
    .await?
    .last_insert_rowid();

    run.id = id;
    Ok(id)
}

/// Persist a terminal run
///
/// The update only applies while the stored row is still `running`, so a
/// finished run can never be overwritten.
pub async fn finish_run(pool: &SqlitePool, run: &PipelineRun) -> Result<()> {
    let finished_at = run.finished_at.ok_or_else(|| PipelineError::InvalidTransition {
        from: RunStatus::Running.to_string(),
        to: run.status.to_string(),
    })?;
    let snapshot = serde_json::to_string(&run.snapshot)?;

    let result = sqlx::query(
        r#"
        UPDATE pipeline_runs
        SET status = ?,
            precincts_scored = ?,
            error_message = ?,
            config_snapshot = ?,
            finished_at = ?
        WHERE id = ? AND status = 'running'
        "#,
    )
    .bind(run.status.as_str())
    .bind(run.precincts_scored)
    .bind(run.error_message.clone())
    .bind(snapshot)
    .bind(finished_at.to_rfc3339())
    .bind(run.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let stored = get_run(pool, run.id).await?;
        return Err(PipelineError::InvalidTransition {
            from: stored
                .map(|r| r.status.to_string())
                .unwrap_or_else(|| "missing".to_string()),
            to: run.status.to_string(),
        });
    }

    Ok(())
}

pub async fn get_run(pool: &SqlitePool, id: i64) -> Result<Option<PipelineRun>> {
    let row = sqlx::query_as::<_, PipelineRunRow>(
        r#"
        SELECT id, status, config_snapshot, precincts_scored, error_message, started_at, finished_at
        FROM pipeline_runs
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(PipelineRun::from_row).transpose()
}

/// Most recent runs first
pub async fn list_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<PipelineRun>> {
    let rows = sqlx::query_as::<_, PipelineRunRow>(
        r#"
        SELECT id, status, config_snapshot, precincts_scored, error_message, started_at, finished_at
        FROM pipeline_runs
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PipelineRun::from_row).collect()
}
