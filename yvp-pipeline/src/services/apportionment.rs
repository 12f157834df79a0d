//! Demographic apportionment
//!
//! Strategies, in order:
//! 1. [`KeyMatch`]: the precinct key equals a block group GEOID
//! 2. [`AreaWeighted`]: each intersecting unit contributes
//!    `population × intersected_area / unit_area`
//!
//! Apportioned sums are rounded to whole people before the youth share is
//! recomputed, so the stored share always agrees with the stored counts.

use super::strategy::{PrecinctContext, ResolveStrategy, StrategyChain};
use crate::normalize::coerce::youth_share;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use std::collections::HashMap;
use tracing::debug;
use yvp_common::db::DemographicUnit;
use yvp_common::geometry::{self, Boundary};

pub const KEY_MATCH: &str = "key_match";
pub const AREA_WEIGHTED: &str = "area_weighted";

/// Demographic fields resolved for one precinct
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemographicEstimate {
    pub total_pop: i64,
    pub pop_18_29: i64,
    /// `None` when the total is zero
    pub youth_share: Option<f64>,
}

impl DemographicEstimate {
    pub fn from_counts(total_pop: i64, pop_18_29: i64) -> Self {
        Self {
            total_pop,
            pop_18_29,
            youth_share: youth_share(Some(total_pop), Some(pop_18_29)),
        }
    }
}

/// Direct key equality with a unit that has counts
pub struct KeyMatch {
    counts: HashMap<String, (i64, i64)>,
}

impl KeyMatch {
    pub fn new(units: &[DemographicUnit]) -> Self {
        let counts = units
            .iter()
            .filter_map(|u| u.total_pop.map(|t| (u.geoid.clone(), (t, u.pop_18_29.unwrap_or(0)))))
            .collect();
        Self { counts }
    }
}

impl ResolveStrategy<PrecinctContext, DemographicEstimate> for KeyMatch {
    fn name(&self) -> &'static str {
        KEY_MATCH
    }

    fn resolve(&self, precinct: &PrecinctContext) -> Option<DemographicEstimate> {
        self.counts
            .get(&precinct.precinct_key)
            .map(|&(total, youth)| DemographicEstimate::from_counts(total, youth))
    }
}

/// Unit prepared for the area path
struct IndexedUnit {
    boundary: Boundary,
    area: f64,
    total_pop: i64,
    pop_18_29: i64,
}

type UnitEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Area-weighted overlay against unit boundaries, pre-filtered by an R-tree
pub struct AreaWeighted {
    units: Vec<IndexedUnit>,
    index: RTree<UnitEnvelope>,
}

impl AreaWeighted {
    /// Units without counts, without a boundary or with zero area are ignored
    pub fn new(units: &[DemographicUnit]) -> Self {
        let mut indexed = Vec::new();
        let mut ignored = 0usize;

        for unit in units {
            let (Some(total_pop), Some(wkt)) = (unit.total_pop, unit.geom_wkt.as_deref()) else {
                ignored += 1;
                continue;
            };
            let Ok(boundary) = geometry::parse_valid_wkt(wkt) else {
                ignored += 1;
                continue;
            };
            let area = geometry::area(&boundary);
            if area <= 0.0 {
                ignored += 1;
                continue;
            }
            indexed.push(IndexedUnit {
                boundary,
                area,
                total_pop,
                pop_18_29: unit.pop_18_29.unwrap_or(0),
            });
        }

        let envelopes = indexed
            .iter()
            .enumerate()
            .filter_map(|(i, u)| {
                geometry::bounding_box(&u.boundary).map(|r| {
                    let (min, max) = (r.min(), r.max());
                    GeomWithData::new(Rectangle::from_corners([min.x, min.y], [max.x, max.y]), i)
                })
            })
            .collect();

        debug!(units = indexed.len(), ignored, "Built demographic unit index");
        Self {
            units: indexed,
            index: RTree::bulk_load(envelopes),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl ResolveStrategy<PrecinctContext, DemographicEstimate> for AreaWeighted {
    fn name(&self) -> &'static str {
        AREA_WEIGHTED
    }

    fn resolve(&self, precinct: &PrecinctContext) -> Option<DemographicEstimate> {
        let boundary = precinct.boundary.as_ref()?;
        let rect = geometry::bounding_box(boundary)?;
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut total = 0.0;
        let mut youth = 0.0;
        let mut contributing = 0usize;

        for candidate in self.index.locate_in_envelope_intersecting(&envelope) {
            let unit = &self.units[candidate.data];
            let overlap = geometry::intersection_area(boundary, &unit.boundary);
            if overlap <= 0.0 {
                continue;
            }
            let fraction = (overlap / unit.area).min(1.0);
            total += unit.total_pop as f64 * fraction;
            youth += unit.pop_18_29 as f64 * fraction;
            contributing += 1;
        }

        if contributing == 0 {
            return None;
        }

        Some(DemographicEstimate::from_counts(
            total.round() as i64,
            youth.round() as i64,
        ))
    }
}

/// Key match first, area-weighted fallback
pub fn demographic_chain(units: &[DemographicUnit]) -> StrategyChain<PrecinctContext, DemographicEstimate> {
    StrategyChain::new()
        .then(KeyMatch::new(units))
        .then(AreaWeighted::new(units))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
        format!("POLYGON(({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))")
    }

    fn unit(geoid: &str, total: i64, youth: i64, wkt: Option<String>) -> DemographicUnit {
        DemographicUnit {
            geoid: geoid.to_string(),
            county_fips: Some("06001".to_string()),
            total_pop: Some(total),
            pop_18_29: Some(youth),
            youth_share: youth_share(Some(total), Some(youth)),
            geom_wkt: wkt,
            vintage: 2022,
        }
    }

    fn precinct(key: &str, wkt: Option<String>) -> PrecinctContext {
        PrecinctContext::from_wkt(key.to_string(), wkt.as_deref()).0
    }

    #[test]
    fn test_sixty_forty_split() {
        let units = vec![
            unit("A", 1000, 300, Some(square(0.0, 0.0, 10.0, 10.0))),
            unit("B", 500, 100, Some(square(10.0, 0.0, 20.0, 10.0))),
        ];
        let strategy = AreaWeighted::new(&units);

        let estimate = strategy
            .resolve(&precinct("P", Some(square(4.0, 0.0, 14.0, 10.0))))
            .unwrap();

        assert_eq!(estimate.total_pop, 800);
        assert_eq!(estimate.pop_18_29, 220);
        assert_eq!(estimate.youth_share, Some(0.275));
    }

    #[test]
    fn test_no_overlap_is_unresolved() {
        let units = vec![unit("A", 1000, 300, Some(square(0.0, 0.0, 1.0, 1.0)))];
        let strategy = AreaWeighted::new(&units);
        assert!(strategy
            .resolve(&precinct("P", Some(square(5.0, 5.0, 6.0, 6.0))))
            .is_none());
        assert!(strategy.resolve(&precinct("P", None)).is_none());
    }

    #[test]
    fn test_key_match_preferred_and_needs_no_boundary() {
        let units = vec![
            unit("060014001001", 1000, 250, Some(square(0.0, 0.0, 10.0, 10.0))),
        ];
        let chain = demographic_chain(&units);

        let (name, estimate) = chain.resolve(&precinct("060014001001", None)).unwrap();
        assert_eq!(name, KEY_MATCH);
        assert_eq!(estimate.total_pop, 1000);
        assert_eq!(estimate.youth_share, Some(0.25));

        let (name, _) = chain
            .resolve(&precinct("other", Some(square(0.0, 0.0, 5.0, 10.0))))
            .unwrap();
        assert_eq!(name, AREA_WEIGHTED);
    }

    #[test]
    fn test_zero_population_share_is_null() {
        let units = vec![unit("A", 0, 0, Some(square(0.0, 0.0, 10.0, 10.0)))];
        let estimate = AreaWeighted::new(&units)
            .resolve(&precinct("P", Some(square(0.0, 0.0, 5.0, 5.0))))
            .unwrap();
        assert_eq!(estimate.total_pop, 0);
        assert_eq!(estimate.youth_share, None);
    }

    #[test]
    fn test_units_without_boundary_ignored_by_area_path() {
        let units = vec![unit("A", 1000, 300, None)];
        assert!(AreaWeighted::new(&units).is_empty());
    }
}
