//! Congressional district assignment
//!
//! Strategies, in order:
//! 1. [`BlockMajority`]: majority vote over the precinct's census blocks
//! 2. [`CentroidContainment`]: the district polygon containing the precinct
//!    centroid
//!
//! Ties go to the lowest district number in both strategies.

use super::strategy::{PrecinctContext, ResolveStrategy, StrategyChain};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use yvp_common::db::DistrictBoundary;
use yvp_common::geometry::{self, Boundary};

pub const BLOCK_MAJORITY: &str = "block_majority";
pub const CENTROID_CONTAINMENT: &str = "centroid_containment";

/// Winning district per precinct key, from block assignments
pub struct BlockMajority {
    winners: HashMap<String, i64>,
}

impl BlockMajority {
    pub fn new(block_districts: &[(String, i64)]) -> Self {
        let mut votes: HashMap<&str, BTreeMap<i64, usize>> = HashMap::new();
        for (precinct_key, district) in block_districts {
            *votes
                .entry(precinct_key.as_str())
                .or_default()
                .entry(*district)
                .or_insert(0) += 1;
        }

        let winners = votes
            .into_iter()
            .filter_map(|(key, tally)| majority(&tally).map(|d| (key.to_string(), d)))
            .collect();

        Self { winners }
    }
}

/// Highest count wins; BTreeMap iteration is ascending so the first maximum is the lowest number
fn majority(tally: &BTreeMap<i64, usize>) -> Option<i64> {
    let mut best: Option<(i64, usize)> = None;
    for (&district, &count) in tally {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((district, count));
        }
    }
    best.map(|(d, _)| d)
}

impl ResolveStrategy<PrecinctContext, i64> for BlockMajority {
    fn name(&self) -> &'static str {
        BLOCK_MAJORITY
    }

    fn resolve(&self, precinct: &PrecinctContext) -> Option<i64> {
        self.winners.get(&precinct.precinct_key).copied()
    }
}

/// Point-in-polygon against district boundaries
pub struct CentroidContainment {
    /// Ascending by district number
    districts: Vec<(i64, Boundary)>,
}

impl CentroidContainment {
    pub fn new(boundaries: &[DistrictBoundary]) -> Self {
        let mut districts: Vec<(i64, Boundary)> = boundaries
            .iter()
            .filter_map(|d| match geometry::parse_valid_wkt(&d.geom_wkt) {
                Ok(b) => Some((d.district, b)),
                Err(e) => {
                    warn!(district = d.district, error = %e, "Ignoring unusable district boundary");
                    None
                }
            })
            .collect();
        districts.sort_by_key(|(d, _)| *d);
        Self { districts }
    }
}

impl ResolveStrategy<PrecinctContext, i64> for CentroidContainment {
    fn name(&self) -> &'static str {
        CENTROID_CONTAINMENT
    }

    fn resolve(&self, precinct: &PrecinctContext) -> Option<i64> {
        let point = precinct.representative_point()?;
        self.districts
            .iter()
            .find(|(_, boundary)| geometry::contains_point(boundary, &point))
            .map(|(d, _)| *d)
    }
}

/// Block majority first, centroid containment fallback
pub fn district_chain(
    block_districts: &[(String, i64)],
    boundaries: &[DistrictBoundary],
) -> StrategyChain<PrecinctContext, i64> {
    StrategyChain::new()
        .then(BlockMajority::new(block_districts))
        .then(CentroidContainment::new(boundaries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
        format!("POLYGON(({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))")
    }

    fn precinct(key: &str, wkt: Option<String>) -> PrecinctContext {
        PrecinctContext::from_wkt(key.to_string(), wkt.as_deref()).0
    }

    #[test]
    fn test_block_majority_and_tie_break() {
        let blocks = vec![
            ("P1".to_string(), 7),
            ("P1".to_string(), 3),
            ("P1".to_string(), 7),
            ("P2".to_string(), 9),
            ("P2".to_string(), 4),
        ];
        let strategy = BlockMajority::new(&blocks);

        assert_eq!(strategy.resolve(&precinct("P1", None)), Some(7));
        assert_eq!(strategy.resolve(&precinct("P2", None)), Some(4));
        assert_eq!(strategy.resolve(&precinct("P3", None)), None);
    }

    #[test]
    fn test_centroid_containment_prefers_lowest_district() {
        let boundaries = vec![
            DistrictBoundary { district: 12, geom_wkt: square(0.0, 0.0, 10.0, 10.0) },
            DistrictBoundary { district: 5, geom_wkt: square(0.0, 0.0, 10.0, 10.0) },
            DistrictBoundary { district: 20, geom_wkt: square(10.0, 0.0, 20.0, 10.0) },
        ];
        let strategy = CentroidContainment::new(&boundaries);

        assert_eq!(strategy.resolve(&precinct("P", Some(square(1.0, 1.0, 2.0, 2.0)))), Some(5));
        assert_eq!(strategy.resolve(&precinct("Q", Some(square(14.0, 1.0, 16.0, 2.0)))), Some(20));
        assert_eq!(strategy.resolve(&precinct("R", Some(square(30.0, 1.0, 31.0, 2.0)))), None);
    }

    #[test]
    fn test_chain_falls_back_to_containment() {
        let blocks = vec![("P1".to_string(), 3)];
        let boundaries = vec![DistrictBoundary { district: 8, geom_wkt: square(0.0, 0.0, 10.0, 10.0) }];
        let chain = district_chain(&blocks, &boundaries);

        let (values, report) = chain.resolve_all(&[
            precinct("P1", Some(square(1.0, 1.0, 2.0, 2.0))),
            precinct("P2", Some(square(1.0, 1.0, 2.0, 2.0))),
            precinct("P3", None),
        ]);

        assert_eq!(values, vec![Some(3), Some(8), None]);
        assert_eq!(report.resolved_with(BLOCK_MAJORITY), 1);
        assert_eq!(report.resolved_with(CENTROID_CONTAINMENT), 1);
        assert_eq!(report.unresolved, 1);
    }
}
