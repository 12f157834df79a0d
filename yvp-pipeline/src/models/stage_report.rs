//! Per-stage counters
//!
//! Reports are returned by each stage and logged by the orchestrator. Only the
//! scored count is persisted (in the run ledger).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalization counters for one source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub rows_read: usize,
    pub records: usize,
    /// Empty or unparsable geometries (record kept, geometry absent)
    pub geometry_errors: usize,
    /// Rows with no usable key (skipped)
    pub skipped: usize,
}

/// Normalized records plus their counters
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub stats: SourceStats,
}

impl<T> Normalized<T> {
    pub fn new(records: Vec<T>, mut stats: SourceStats) -> Self {
        stats.records = records.len();
        Self { records, stats }
    }
}

/// Rows written per ingested source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub sources: BTreeMap<String, SourceStats>,
}

impl IngestReport {
    pub fn record(&mut self, source: &str, stats: SourceStats) {
        self.sources.insert(source.to_string(), stats);
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Outcome of one strategy chain over all precincts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Precincts resolved, keyed by strategy name
    pub resolved_by: BTreeMap<String, usize>,
    /// Precincts no strategy could resolve (fields reset to null)
    pub unresolved: usize,
    /// Precincts with no usable boundary for the spatial strategies
    pub invalid_geometry: usize,
}

impl ResolutionReport {
    pub fn resolved(&self) -> usize {
        self.resolved_by.values().sum()
    }

    pub fn resolved_with(&self, strategy: &str) -> usize {
        self.resolved_by.get(strategy).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrosswalkReport {
    pub demographics: ResolutionReport,
    pub districts: ResolutionReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Election rows for the configured contest
    pub contest_rows: usize,
    pub primary_matches: usize,
    pub fallback_matches: usize,
}

impl MergeReport {
    /// Matched / contest rows; diagnostic only
    pub fn match_rate(&self) -> f64 {
        if self.contest_rows == 0 {
            0.0
        } else {
            (self.primary_matches + self.fallback_matches) as f64 / self.contest_rows as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringReport {
    pub scored: usize,
    /// Previously scored precincts reset to null this run
    pub reset: usize,
    pub by_tier: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplifyReport {
    pub simplified: usize,
    pub failed: usize,
}

/// Everything one run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub ingest: IngestReport,
    pub crosswalk: CrosswalkReport,
    pub merge: MergeReport,
    pub scoring: ScoringReport,
    pub simplify: SimplifyReport,
}
