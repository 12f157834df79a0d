//! Display-resolution boundaries
//!
//! A precinct whose boundary cannot be simplified keeps a null simplified
//! boundary; readers then fall back to the full-resolution one.

use crate::db::precincts::{PrecinctShape, SimplifiedUpdate};
use crate::models::SimplifyReport;
use tracing::warn;
use yvp_common::geometry;

/// Simplify one WKT boundary, `None` on any failure
pub fn simplify_wkt(precinct_key: &str, wkt: &str, tolerance: f64) -> Option<String> {
    let result = geometry::parse_wkt(wkt)
        .and_then(|boundary| geometry::simplify_preserving_topology(&boundary, tolerance));

    match result {
        Ok(simplified) => Some(geometry::to_wkt(&simplified)),
        Err(e) => {
            warn!(precinct_key, error = %e, "Simplification failed, keeping full resolution only");
            None
        }
    }
}

/// One update per precinct that has a boundary
pub fn simplify_all(shapes: &[PrecinctShape], tolerance: f64) -> (Vec<SimplifiedUpdate>, SimplifyReport) {
    let mut report = SimplifyReport::default();

    let updates = shapes
        .iter()
        .filter_map(|shape| {
            let wkt = shape.geom_wkt.as_deref()?;
            let simplified = simplify_wkt(&shape.precinct_key, wkt, tolerance);
            if simplified.is_some() {
                report.simplified += 1;
            } else {
                report.failed += 1;
            }
            Some(SimplifiedUpdate {
                precinct_key: shape.precinct_key.clone(),
                geom_simplified_wkt: simplified,
            })
        })
        .collect();

    (updates, report)
}
