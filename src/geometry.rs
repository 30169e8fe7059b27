//! Parcel polygons in `[lon, lat]` degrees

use crate::error::{BloomError, BloomResult};
use serde::{Deserialize, Serialize};

/// Metres per degree at the equator
const METERS_PER_DEGREE: f64 = 111_320.0;
const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// A validated parcel outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    coordinates: Vec<[f64; 2]>,
}

impl Parcel {
    /// At least three finite `[lon, lat]` points with lon in [-180, 180] and
    /// lat in [-90, 90]
    pub fn new(coordinates: Vec<[f64; 2]>) -> BloomResult<Self> {
        if coordinates.len() < 3 {
            return Err(BloomError::InvalidParcel(format!(
                "at least 3 points are required to form a polygon, got {}",
                coordinates.len()
            )));
        }
        for [lon, lat] in &coordinates {
            if !lon.is_finite() || !lat.is_finite() || lon.abs() > 180.0 || lat.abs() > 90.0 {
                return Err(BloomError::InvalidParcel(format!(
                    "point [{}, {}] is not a valid [lon, lat] pair",
                    lon, lat
                )));
            }
        }
        Ok(Self { coordinates })
    }

    /// Accepts loosely shaped input (e.g. JSON arrays), rejecting points that
    /// are not pairs
    pub fn from_points(points: &[Vec<f64>]) -> BloomResult<Self> {
        let mut coordinates = Vec::with_capacity(points.len());
        for point in points {
            match point.as_slice() {
                [lon, lat] => coordinates.push([*lon, *lat]),
                _ => {
                    return Err(BloomError::InvalidParcel(
                        "each point must have the form [lon, lat]".to_string(),
                    ))
                }
            }
        }
        Self::new(coordinates)
    }

    pub fn coordinates(&self) -> &[[f64; 2]] {
        &self.coordinates
    }

    /// Mean of the vertices as `[lon, lat]`
    pub fn centroid(&self) -> [f64; 2] {
        let n = self.coordinates.len() as f64;
        let (lon, lat) = self
            .coordinates
            .iter()
            .fold((0.0_f64, 0.0_f64), |(a, b), [lon, lat]| (a + *lon, b + *lat));
        [lon / n, lat / n]
    }

    /// Shoelace area on raw degrees scaled by a flat metres-per-degree factor.
    /// Approximate; good enough for parcel-sized polygons near the equator.
    pub fn area_hectares(&self) -> f64 {
        let n = self.coordinates.len();
        let twice_area: f64 = (0..n)
            .map(|i| {
                let [x1, y1] = self.coordinates[i];
                let [x2, y2] = self.coordinates[(i + 1) % n];
                x1 * y2 - x2 * y1
            })
            .sum();
        let square_degrees = twice_area.abs() / 2.0;
        square_degrees * METERS_PER_DEGREE * METERS_PER_DEGREE / SQUARE_METERS_PER_HECTARE
    }

    pub fn bbox(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for [lon, lat] in &self.coordinates {
            bbox.min_lon = bbox.min_lon.min(*lon);
            bbox.min_lat = bbox.min_lat.min(*lat);
            bbox.max_lon = bbox.max_lon.max(*lon);
            bbox.max_lat = bbox.max_lat.max(*lat);
        }
        bbox
    }
}
