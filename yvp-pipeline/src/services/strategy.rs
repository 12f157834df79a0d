//! Ordered resolution strategies
//!
//! A [`StrategyChain`] tries its strategies in order and stops at the first
//! that produces a value. It counts how many items each strategy resolved so
//! the crosswalk can report, for example, how many precincts were matched by
//! key versus by area.

use crate::models::ResolutionReport;
use geo::Point;
use yvp_common::geometry::{self, Boundary};

/// A precinct as seen by the crosswalk strategies
#[derive(Debug, Clone)]
pub struct PrecinctContext {
    pub precinct_key: String,
    /// Parsed, validated boundary; `None` when absent or invalid
    pub boundary: Option<Boundary>,
}

impl PrecinctContext {
    /// Parse the stored WKT; invalid geometry becomes `None`
    pub fn from_wkt(precinct_key: String, geom_wkt: Option<&str>) -> (Self, bool) {
        let (boundary, invalid) = match geom_wkt {
            None => (None, false),
            Some(text) => match geometry::parse_valid_wkt(text) {
                Ok(b) => (Some(b), false),
                Err(e) => {
                    tracing::debug!(precinct_key = %precinct_key, error = %e, "Unusable precinct boundary");
                    (None, true)
                }
            },
        };
        (
            Self {
                precinct_key,
                boundary,
            },
            invalid,
        )
    }

    pub fn representative_point(&self) -> Option<Point<f64>> {
        self.boundary.as_ref().and_then(geometry::representative_point)
    }
}

/// One way of resolving a value for an item
pub trait ResolveStrategy<I, O>: Send + Sync {
    /// Name reported in per-strategy counts
    fn name(&self) -> &'static str;

    fn resolve(&self, item: &I) -> Option<O>;
}

/// Strategies in priority order
pub struct StrategyChain<I, O> {
    strategies: Vec<Box<dyn ResolveStrategy<I, O>>>,
}

impl<I, O> Default for StrategyChain<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> StrategyChain<I, O> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a lower-priority strategy
    pub fn then(mut self, strategy: impl ResolveStrategy<I, O> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First successful strategy and its value
    pub fn resolve(&self, item: &I) -> Option<(&'static str, O)> {
        self.strategies
            .iter()
            .find_map(|s| s.resolve(item).map(|value| (s.name(), value)))
    }

    /// Resolve every item; output is aligned with input
    pub fn resolve_all(&self, items: &[I]) -> (Vec<Option<O>>, ResolutionReport) {
        let mut report = ResolutionReport::default();
        for name in self.names() {
            report.resolved_by.insert(name.to_string(), 0);
        }

        let values = items
            .iter()
            .map(|item| match self.resolve(item) {
                Some((name, value)) => {
                    *report.resolved_by.entry(name.to_string()).or_insert(0) += 1;
                    Some(value)
                }
                None => {
                    report.unresolved += 1;
                    None
                }
            })
            .collect();

        (values, report)
    }
}
