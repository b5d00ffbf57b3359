//! Farm boundary polygons.
//!
//! A polygon is an ordered ring of `[longitude, latitude]` pairs (WGS84). The
//! ring may or may not repeat its first vertex at the end; both forms are
//! accepted and stored exactly as given so that a persisted polygon
//! deserializes back to the identical coordinate sequence.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of distinct vertices for a usable ring.
const MIN_DISTINCT_VERTICES: usize = 3;

/// Errors raised when a coordinate ring cannot describe a farm boundary.
#[derive(Debug, Error, PartialEq)]
pub enum PolygonError {
    #[error("polygon needs at least {MIN_DISTINCT_VERTICES} distinct vertices, got {0}")]
    TooFewVertices(usize),

    #[error("vertex {index} is out of range: longitude {lon}, latitude {lat}")]
    OutOfRange { index: usize, lon: f64, lat: f64 },

    #[error("polygon has no rings")]
    Empty,
}

/// A `[longitude, latitude]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate(pub f64, pub f64);

impl Coordinate {
    pub fn lon(&self) -> f64 {
        self.0
    }

    pub fn lat(&self) -> f64 {
        self.1
    }

    fn is_valid(&self) -> bool {
        self.0.is_finite()
            && self.1.is_finite()
            && (-180.0..=180.0).contains(&self.0)
            && (-90.0..=90.0).contains(&self.1)
    }
}

/// A validated farm boundary. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Polygon {
    vertices: Vec<Coordinate>,
}

impl Polygon {
    pub fn new(vertices: Vec<Coordinate>) -> Result<Self, PolygonError> {
        if let Some((index, c)) = vertices.iter().enumerate().find(|(_, c)| !c.is_valid()) {
            return Err(PolygonError::OutOfRange {
                index,
                lon: c.lon(),
                lat: c.lat(),
            });
        }

        let distinct = count_distinct(&vertices);
        if distinct < MIN_DISTINCT_VERTICES {
            return Err(PolygonError::TooFewVertices(distinct));
        }

        Ok(Self { vertices })
    }

    /// The vertices exactly as supplied.
    pub fn vertices(&self) -> &[Coordinate] {
        &self.vertices
    }

    /// GeoJSON `Polygon` geometry with the ring closed, as raster queries expect.
    pub fn to_geojson(&self) -> serde_json::Value {
        let mut ring: Vec<[f64; 2]> = self.vertices.iter().map(|c| [c.0, c.1]).collect();
        if self.vertices.first() != self.vertices.last() {
            ring.push([self.vertices[0].0, self.vertices[0].1]);
        }
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [ring],
        })
    }
}

impl TryFrom<Vec<Coordinate>> for Polygon {
    type Error = PolygonError;

    fn try_from(vertices: Vec<Coordinate>) -> Result<Self, Self::Error> {
        Polygon::new(vertices)
    }
}

impl From<Polygon> for Vec<Coordinate> {
    fn from(p: Polygon) -> Self {
        p.vertices
    }
}

/// Polygon payload as sent by clients: either a bare ring or GeoJSON-style
/// nested rings, in which case the outer ring is the farm boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PolygonInput {
    Ring(Vec<Coordinate>),
    Rings(Vec<Vec<Coordinate>>),
}

impl TryFrom<PolygonInput> for Polygon {
    type Error = PolygonError;

    fn try_from(input: PolygonInput) -> Result<Self, Self::Error> {
        match input {
            PolygonInput::Ring(ring) => Polygon::new(ring),
            PolygonInput::Rings(rings) => {
                let outer = rings.into_iter().next().ok_or(PolygonError::Empty)?;
                Polygon::new(outer)
            }
        }
    }
}

fn count_distinct(vertices: &[Coordinate]) -> usize {
    let mut seen: Vec<Coordinate> = Vec::with_capacity(vertices.len());
    for v in vertices {
        if !seen.contains(v) {
            seen.push(*v);
        }
    }
    seen.len()
}

#[cfg(test)]
pub(crate) fn square(lon: f64, lat: f64) -> Polygon {
    Polygon::new(vec![
        Coordinate(lon, lat),
        Coordinate(lon + 0.01, lat),
        Coordinate(lon + 0.01, lat + 0.01),
        Coordinate(lon, lat + 0.01),
    ])
    .unwrap()
}
