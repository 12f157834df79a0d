//! Phase 3: MERGE
//!
//! Append the configured election extract (if any), then copy the configured
//! contest onto precincts using the two-tier key match.

use super::{blocking, stage, PipelineOrchestrator};
use crate::db::{election, loaders};
use crate::error::Result;
use crate::models::MergeReport;
use crate::normalize::{ElectionSource, LongCandidateCsv, WidePrecinctCsv};
use tracing::{info, warn};

impl PipelineOrchestrator {
    /// The election backend to use, wide layout first
    pub(super) fn election_source(&self) -> Option<Box<dyn ElectionSource>> {
        let sources = &self.config.sources;
        let state_fips = self.config.census.state_fips.clone();
        match (&sources.election_wide, &sources.election_long) {
            (Some(wide), alternate) => {
                if alternate.is_some() {
                    warn!("Both wide and long election files configured; using the wide file");
                }
                Some(Box::new(WidePrecinctCsv::new(
                    wide,
                    sources.election_schema.clone(),
                    state_fips,
                )))
            }
            (None, Some(long)) => Some(Box::new(LongCandidateCsv::new(
                long,
                sources.election_schema.clone(),
                state_fips,
                self.config.election.contest.clone(),
            ))),
            (None, None) => None,
        }
    }

    pub(super) async fn phase_merge(&self) -> Result<MergeReport> {
        info!(stage = stage::MERGE, "Phase 3: MERGE");

        let date = self.config.election.date.as_str();
        let contest = self.config.election.contest.as_str();

        if let Some(source) = self.election_source() {
            let name = source.name();
            let normalized = blocking(stage::MERGE, move || source.normalize()).await?;
            let inserted =
                loaders::insert_election_results(&self.db, &normalized.records, date, contest).await?;
            info!(
                stage = stage::MERGE,
                source = name,
                records = normalized.stats.records,
                inserted,
                skipped = normalized.stats.skipped,
                "Election results loaded"
            );
        }

        let mut tx = self.db.begin().await?;
        let report = election::merge_contest(&mut *tx, date, contest).await?;
        tx.commit().await?;

        if report.contest_rows == 0 {
            warn!(
                stage = stage::MERGE,
                election_date = date,
                contest,
                "No election results stored for the configured contest; electoral fields are null"
            );
        }
        info!(
            stage = stage::MERGE,
            contest_rows = report.contest_rows,
            primary = report.primary_matches,
            fallback = report.fallback_matches,
            match_rate = %format!("{:.1}%", report.match_rate() * 100.0),
            "Election merge complete"
        );

        Ok(report)
    }
}
