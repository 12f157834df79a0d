//! Stage services
//!
//! Pure computations over loaded rows. Persistence stays in [`crate::db`] and
//! sequencing in [`crate::orchestrator`].

pub mod apportionment;
pub mod district_assigner;
pub mod scoring;
pub mod simplifier;
pub mod strategy;

pub use apportionment::{demographic_chain, AreaWeighted, DemographicEstimate, KeyMatch};
pub use district_assigner::{district_chain, BlockMajority, CentroidContainment};
pub use scoring::{score_all, score_precinct, tier_for, ScoreOutcome, ScoringParams};
pub use simplifier::{simplify_all, simplify_wkt};
pub use strategy::{PrecinctContext, ResolveStrategy, StrategyChain};
