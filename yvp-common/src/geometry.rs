//! Geometry store primitives
//!
//! Boundaries are persisted as WKT text and evaluated in-process. This module is
//! the only place that knows about the geometry representation; stages see a
//! [`Boundary`] and the predicates below.
//!
//! Coordinates are EPSG:4326 degrees. Areas are planar in degree units, which is
//! fine for the ratios the crosswalk needs but not for absolute measurements.

use crate::{Error, Result};
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Contains, CoordsIter, Geometry, Intersects,
    MultiPolygon, Point, Rect, SimplifyVwPreserve,
};
use wkt::{ToWkt, TryFromWkt};

/// Full- or reduced-resolution boundary of a precinct, unit or district
pub type Boundary = MultiPolygon<f64>;

/// Parse `POLYGON` or `MULTIPOLYGON` WKT into a [`Boundary`]
///
/// Single polygons are promoted to a one-member multipolygon.
pub fn parse_wkt(text: &str) -> Result<Boundary> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Geometry("empty WKT".to_string()));
    }

    let geometry = Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|e| Error::Geometry(format!("unparsable WKT: {}", e)))?;

    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        other => Err(Error::Geometry(format!(
            "expected POLYGON or MULTIPOLYGON, got {}",
            geometry_kind(&other)
        ))),
    }
}

/// Parse and validate in one step
pub fn parse_valid_wkt(text: &str) -> Result<Boundary> {
    let boundary = parse_wkt(text)?;
    validate(&boundary)?;
    Ok(boundary)
}

/// Serialize a boundary back to WKT
pub fn to_wkt(boundary: &Boundary) -> String {
    boundary.wkt_string()
}

/// Reject geometries the crosswalk cannot reason about
///
/// Checks: at least one polygon, finite coordinates, every ring closed with
/// at least four positions, and non-zero area.
pub fn validate(boundary: &Boundary) -> Result<()> {
    if boundary.0.is_empty() {
        return Err(Error::Geometry("empty multipolygon".to_string()));
    }

    if !boundary.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        return Err(Error::Geometry("non-finite coordinate".to_string()));
    }

    for polygon in &boundary.0 {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for ring in rings {
            if ring.0.len() < 4 || !ring.is_closed() {
                return Err(Error::Geometry(format!(
                    "ring with {} positions is not a closed polygon ring",
                    ring.0.len()
                )));
            }
        }
    }

    if boundary.unsigned_area() <= 0.0 {
        return Err(Error::Geometry("zero-area polygon".to_string()));
    }

    Ok(())
}

/// Unsigned planar area
pub fn area(boundary: &Boundary) -> f64 {
    boundary.unsigned_area()
}

/// Area of the overlap between two boundaries (0.0 when disjoint)
pub fn intersection_area(a: &Boundary, b: &Boundary) -> f64 {
    if !bounding_boxes_intersect(a, b) {
        return 0.0;
    }
    a.intersection(b).unsigned_area()
}

/// Axis-aligned bounding box, `None` for an empty boundary
pub fn bounding_box(boundary: &Boundary) -> Option<Rect<f64>> {
    boundary.bounding_rect()
}

fn bounding_boxes_intersect(a: &Boundary, b: &Boundary) -> bool {
    match (bounding_box(a), bounding_box(b)) {
        (Some(ra), Some(rb)) => ra.intersects(&rb),
        _ => false,
    }
}

/// Representative point used for containment-based assignment (the centroid)
pub fn representative_point(boundary: &Boundary) -> Option<Point<f64>> {
    boundary.centroid()
}

/// Point-in-polygon; points on the boundary are not contained
pub fn contains_point(boundary: &Boundary, point: &Point<f64>) -> bool {
    boundary.contains(point)
}

/// Topology-preserving simplification
///
/// `tolerance` is a distance; Visvalingam–Whyatt works on triangle areas, so
/// the threshold handed to it is `tolerance²`. The result is validated so that
/// callers never persist a collapsed shape.
pub fn simplify_preserving_topology(boundary: &Boundary, tolerance: f64) -> Result<Boundary> {
    if !(tolerance > 0.0) {
        return Err(Error::InvalidInput(format!(
            "simplification tolerance must be positive, got {}",
            tolerance
        )));
    }
    validate(boundary)?;

    let epsilon = tolerance * tolerance;
    let simplified = boundary.simplify_vw_preserve(&epsilon);
    validate(&simplified)
        .map_err(|e| Error::Geometry(format!("simplification collapsed geometry: {}", e)))?;
    Ok(simplified)
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "POINT",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::LineString(_) | Geometry::Line(_) => "LINESTRING",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        _ => "non-polygonal geometry",
    }
}
