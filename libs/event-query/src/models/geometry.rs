use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Location geometry: a single point or a polygon ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Point { coordinate: Coordinate },
    Polygon { vertices: Vec<Coordinate> },
}

impl Geometry {
    pub fn point(lat: f64, lon: f64) -> Self {
        Geometry::Point {
            coordinate: Coordinate::new(lat, lon),
        }
    }

    /// Every coordinate of the geometry; a point yields one.
    pub fn coordinates(&self) -> &[Coordinate] {
        match self {
            Geometry::Point { coordinate } => std::slice::from_ref(coordinate),
            Geometry::Polygon { vertices } => vertices,
        }
    }

    /// Parse a GeoJSON `Point` or `Polygon` (outer ring only), as produced by `ST_AsGeoJSON`.
    pub fn from_geojson(value: &JsonValue) -> Result<Self> {
        let invalid =
            |reason: &str| Error::StorageUnavailable(format!("malformed geometry: {reason}").into());

        let kind = value
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| invalid("missing GeoJSON type"))?;
        let coordinates = value
            .get("coordinates")
            .ok_or_else(|| invalid("missing GeoJSON coordinates"))?;

        match kind {
            "Point" => Ok(Geometry::Point {
                coordinate: position(coordinates).ok_or_else(|| invalid("bad Point position"))?,
            }),
            "Polygon" => {
                let ring = coordinates
                    .as_array()
                    .and_then(|rings| rings.first())
                    .and_then(JsonValue::as_array)
                    .ok_or_else(|| invalid("Polygon without outer ring"))?;
                let vertices = ring
                    .iter()
                    .map(position)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| invalid("bad Polygon position"))?;
                Ok(Geometry::Polygon { vertices })
            }
            other => Err(invalid(&format!("unsupported geometry type '{other}'"))),
        }
    }

    /// Well-known text with lon/lat axis order, closing polygon rings.
    pub fn to_wkt(&self) -> String {
        match self {
            Geometry::Point { coordinate } => format!("POINT({} {})", coordinate.lon, coordinate.lat),
            Geometry::Polygon { vertices } => polygon_wkt(vertices),
        }
    }
}

pub(crate) fn polygon_wkt(vertices: &[Coordinate]) -> String {
    let mut ring: Vec<String> = vertices
        .iter()
        .map(|c| format!("{} {}", c.lon, c.lat))
        .collect();
    if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
        if first != last {
            ring.push(format!("{} {}", first.lon, first.lat));
        }
    }
    format!("POLYGON(({}))", ring.join(", "))
}

// GeoJSON positions are [lon, lat].
fn position(value: &JsonValue) -> Option<Coordinate> {
    let pair = value.as_array()?;
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    Some(Coordinate::new(lat, lon))
}
