//! Data models for the precinct pipeline

pub mod pipeline_run;
pub mod records;
pub mod stage_report;

pub use pipeline_run::{PipelineRun, RunStatus, RunTransition};
pub use records::{
    BlockAssignmentRecord, BoundaryRecord, DemographicRecord, DistrictRecord, ElectionRecord,
};
pub use stage_report::{
    CrosswalkReport, IngestReport, MergeReport, Normalized, ResolutionReport, RunSummary,
    ScoringReport, SimplifyReport, SourceStats,
};
