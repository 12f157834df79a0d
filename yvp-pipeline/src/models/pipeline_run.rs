//! Pipeline run ledger state machine
//!
//! A run progresses through exactly one transition:
//! RUNNING → SUCCESS | FAILED
//!
//! Terminal runs are never reopened; attempting it is an error rather than a
//! silent overwrite.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use yvp_common::db::PipelineRunRow;
use yvp_common::ConfigSnapshot;

/// Ledger status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Written before the first stage starts
    Running,
    /// Every stage committed
    Success,
    /// A stage raised a fatal error; earlier stages stay committed
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(PipelineError::stage_failure(
                "ledger",
                format!("unknown run status '{}'", other),
            )),
        }
    }
}

/// Transition record, logged by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTransition {
    pub run_id: i64,
    pub old_status: RunStatus,
    pub new_status: RunStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// One execution of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Ledger row id; 0 until the row has been inserted
    pub id: i64,
    pub status: RunStatus,
    /// Configuration the run was started with
    pub snapshot: ConfigSnapshot,
    pub precincts_scored: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set exactly when status is terminal
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// New run in `running`
    pub fn start(snapshot: ConfigSnapshot) -> Self {
        Self {
            id: 0,
            status: RunStatus::Running,
            snapshot,
            precincts_scored: None,
            error_message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// RUNNING → SUCCESS with the final scored count
    pub fn complete(&mut self, precincts_scored: i64) -> Result<RunTransition> {
        let transition = self.transition_to(RunStatus::Success)?;
        self.precincts_scored = Some(precincts_scored);
        Ok(transition)
    }

    /// RUNNING → FAILED with the error description
    pub fn fail(&mut self, message: impl Into<String>) -> Result<RunTransition> {
        let transition = self.transition_to(RunStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(transition)
    }

    fn transition_to(&mut self, new_status: RunStatus) -> Result<RunTransition> {
        if self.status.is_terminal() || !new_status.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                from: self.status.to_string(),
                to: new_status.to_string(),
            });
        }

        let now = Utc::now();
        let transition = RunTransition {
            run_id: self.id,
            old_status: self.status,
            new_status,
            transitioned_at: now,
        };
        self.status = new_status;
        self.finished_at = Some(now);

        Ok(transition)
    }

    /// Still `running` after `threshold_minutes`: probably an interrupted process
    pub fn is_suspect(&self, now: DateTime<Utc>, threshold_minutes: i64) -> bool {
        self.status == RunStatus::Running
            && now - self.started_at > Duration::minutes(threshold_minutes)
    }

    /// Rebuild from a stored ledger row
    pub fn from_row(row: PipelineRunRow) -> Result<Self> {
        let status = RunStatus::from_str(&row.status)?;
        let snapshot: ConfigSnapshot = serde_json::from_str(&row.config_snapshot)?;
        let started_at = parse_timestamp(&row.started_at)?;
        let finished_at = row.finished_at.as_deref().map(parse_timestamp).transpose()?;

        Ok(Self {
            id: row.id,
            status,
            snapshot,
            precincts_scored: row.precincts_scored,
            error_message: row.error_message,
            started_at,
            finished_at,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::stage_failure("ledger", format!("bad timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yvp_common::PipelineConfig;

    fn new_run() -> PipelineRun {
        PipelineRun::start(PipelineConfig::default().snapshot())
    }

    #[test]
    fn test_complete_sets_finished_and_count() {
        let mut run = new_run();
        let transition = run.complete(42).unwrap();

        assert_eq!(transition.old_status, RunStatus::Running);
        assert_eq!(transition.new_status, RunStatus::Success);
        assert_eq!(run.precincts_scored, Some(42));
        assert!(run.finished_at.is_some());
        assert!(run.error_message.is_none());
    }

    #[test]
    fn test_fail_records_message() {
        let mut run = new_run();
        run.fail("merge exploded").unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("merge exploded"));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_terminal_run_cannot_be_reopened() {
        let mut run = new_run();
        run.complete(1).unwrap();

        assert!(matches!(run.fail("late"), Err(PipelineError::InvalidTransition { .. })));
        assert!(matches!(run.complete(2), Err(PipelineError::InvalidTransition { .. })));
        assert_eq!(run.precincts_scored, Some(1));
        assert_eq!(run.status, RunStatus::Success);
    }

    #[test]
    fn test_suspect_only_when_running_and_old() {
        let mut run = new_run();
        run.started_at = Utc::now() - Duration::minutes(300);
        assert!(run.is_suspect(Utc::now(), 120));
        assert!(!run.is_suspect(Utc::now(), 600));

        run.complete(0).unwrap();
        assert!(!run.is_suspect(Utc::now(), 120));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!("FAILED".parse::<RunStatus>().is_err());
    }
}
