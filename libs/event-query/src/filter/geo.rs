//! Geographic predicates over an event's location geometry.
//!
//! A geometry matches when every one of its coordinates satisfies the
//! predicate. Events without a location never match a geo predicate.
//! Distances are great-circle (haversine) distances in meters; polygon
//! membership uses the even-odd rule with edges counted as inside.

use serde::{Deserialize, Serialize};

use crate::models::{Coordinate, Geometry};
use crate::{Error, Result};

/// Mean Earth radius (IUGG), meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

const EDGE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeoPredicate {
    BoundingBox { min: Coordinate, max: Coordinate },
    Radius { center: Coordinate, meters: f64 },
    Polygon { vertices: Vec<Coordinate> },
}

impl GeoPredicate {
    pub fn name(&self) -> &'static str {
        match self {
            GeoPredicate::BoundingBox { .. } => "geo.bounding_box",
            GeoPredicate::Radius { .. } => "geo.radius",
            GeoPredicate::Polygon { .. } => "geo.polygon",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(Error::invalid_predicate(self.name(), reason));
        match self {
            GeoPredicate::BoundingBox { min, max } => {
                if !min.is_valid() || !max.is_valid() {
                    return invalid("corner coordinates out of range".to_string());
                }
                if min.lat > max.lat || min.lon > max.lon {
                    return invalid(format!(
                        "min ({}, {}) exceeds max ({}, {})",
                        min.lat, min.lon, max.lat, max.lon
                    ));
                }
            }
            GeoPredicate::Radius { center, meters } => {
                if !center.is_valid() {
                    return invalid("center coordinate out of range".to_string());
                }
                if !meters.is_finite() || *meters <= 0.0 {
                    return invalid(format!("radius must be a positive distance, got {meters}"));
                }
            }
            GeoPredicate::Polygon { vertices } => {
                if vertices.iter().any(|v| !v.is_valid()) {
                    return invalid("vertex coordinates out of range".to_string());
                }
                if distinct_vertices(vertices) < 3 {
                    return invalid("polygon needs at least 3 distinct vertices".to_string());
                }
            }
        }
        Ok(())
    }
}

pub fn matches(geometry: Option<&Geometry>, predicate: &GeoPredicate) -> bool {
    let Some(geometry) = geometry else {
        return false;
    };
    let coordinates = geometry.coordinates();
    if coordinates.is_empty() {
        return false;
    }

    match predicate {
        GeoPredicate::BoundingBox { min, max } => coordinates.iter().all(|c| {
            c.lat >= min.lat && c.lat <= max.lat && c.lon >= min.lon && c.lon <= max.lon
        }),
        GeoPredicate::Radius { center, meters } => coordinates
            .iter()
            .all(|c| haversine_distance(center, c) <= *meters),
        GeoPredicate::Polygon { vertices } => {
            coordinates.iter().all(|c| point_in_polygon(c, vertices))
        }
    }
}

/// Great-circle distance between two coordinates, meters.
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Even-odd point-in-polygon test; points on an edge are inside.
///
/// Independent of winding order; the ring may be open or closed.
pub fn point_in_polygon(point: &Coordinate, vertices: &[Coordinate]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (vertices[i].lon, vertices[i].lat);
        let (xj, yj) = (vertices[j].lon, vertices[j].lat);

        if on_segment(x, y, xi, yi, xj, yj) {
            return true;
        }

        if (yi > y) != (yj > y) {
            let x_cross = xi + (y - yi) * (xj - xi) / (yj - yi);
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(x: f64, y: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    let cross = (x - x1) * (y2 - y1) - (y - y1) * (x2 - x1);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    x >= x1.min(x2) && x <= x1.max(x2) && y >= y1.min(y2) && y <= y1.max(y2)
}

fn distinct_vertices(vertices: &[Coordinate]) -> usize {
    let mut seen: Vec<&Coordinate> = Vec::with_capacity(vertices.len());
    for v in vertices {
        if !seen.iter().any(|s| *s == v) {
            seen.push(v);
        }
    }
    seen.len()
}
