//! # YVP Common Library
//!
//! Shared code for the precinct prioritization pipeline and its readers:
//! - Configuration loading, validation and snapshots
//! - Geometry store primitives (WKT, area, intersection, containment)
//! - Database schema and row models
//! - Typed precinct query builder for read-only consumers

pub mod config;
pub mod db;
pub mod error;
pub mod geometry;

pub use config::{ConfigSnapshot, PipelineConfig};
pub use error::{Error, Result};
