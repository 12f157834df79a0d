//! Source normalizers
//!
//! Turn raw extract files into canonical records with resolved join keys.
//! Normalizers never write to the store; the bulk loaders in [`crate::db`]
//! persist what they return.
//!
//! Demographic counts and election results each have two interchangeable
//! backends behind one trait ([`DemographicSource`], [`ElectionSource`]).

pub mod block_assignments;
pub mod boundaries;
pub mod census;
pub mod coerce;
pub mod election;

pub use block_assignments::BlockAssignmentFiles;
pub use boundaries::{BoundaryFile, DistrictBoundaryFile};
pub use census::{CensusApiResponse, DemographicSource, NhgisExtract};
pub use election::{ElectionSource, LongCandidateCsv, WidePrecinctCsv};

use crate::error::{PipelineError, Result};
use std::fs::File;
use std::path::Path;

/// Open a delimited file, mapping open failures to a named source error
pub(crate) fn open_csv(source: &str, path: &Path, delimiter: u8) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| {
        PipelineError::source_failure(source, format!("cannot open {}: {}", path.display(), e))
    })?;

    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(file))
}

/// Index of a required header
pub(crate) fn require_column(source: &str, headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PipelineError::source_failure(source, format!("missing required column '{}'", name)))
}

/// Field by index; short rows read as empty
pub(crate) fn field<'r>(record: &'r csv::StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("").trim()
}
