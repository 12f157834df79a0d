//! yvp-pipeline library interface
//!
//! Ingests census, boundary and election extracts into the precinct store,
//! then crosswalks, merges, scores and simplifies precincts in one ledgered run.
//! The binary in `main.rs` is a thin CLI over [`PipelineOrchestrator`].

pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod services;

pub use crate::error::{PipelineError, Result};
pub use crate::orchestrator::PipelineOrchestrator;
