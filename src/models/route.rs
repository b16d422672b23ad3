use serde::{Deserialize, Serialize};

use super::hazard::{Coordinate, HazardPoint};
use super::message::BoundingBox;

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// A route as returned by the routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub id: Option<String>,
    pub path: Vec<Coordinate>,
    /// Total length in meters, echoed from the provider.
    #[serde(default)]
    pub distance_m: f64,
    /// Expected travel time in seconds, echoed from the provider.
    #[serde(default)]
    pub duration_s: f64,
}

impl Route {
    pub fn new(path: Vec<Coordinate>, distance_m: f64, duration_s: f64) -> Self {
        Self {
            id: None,
            path,
            distance_m,
            duration_s,
        }
    }

    /// A single-vertex route with no travel metrics, used to assess a location.
    pub fn at(point: Coordinate) -> Self {
        Self::new(vec![point], 0.0, 0.0)
    }

    /// Box around every vertex, widened by `padding_m` on each side. `None`
    /// for an empty path.
    pub fn bounding_box(&self, padding_m: f64) -> Option<BoundingBox> {
        let first = self.path.first()?;
        let init = (first.lat, first.lat, first.lng, first.lng);
        let (south, north, west, east) = self.path.iter().fold(init, |(s, n, w, e), c| {
            (s.min(c.lat), n.max(c.lat), w.min(c.lng), e.max(c.lng))
        });

        let dlat = padding_m / METERS_PER_DEGREE_LAT;
        let mid_lat = ((south + north) / 2.0).to_radians();
        let dlng = padding_m / (METERS_PER_DEGREE_LAT * mid_lat.cos().max(0.01));

        Some(BoundingBox {
            north: (north + dlat).min(90.0),
            south: (south - dlat).max(-90.0),
            east: (east + dlng).min(180.0),
            west: (west - dlng).max(-180.0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyHazard {
    pub hazard: HazardPoint,
    pub distance_m: f64,
}

/// Hazards found near a route. Built per evaluation and owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteProximityResult {
    pub route: Route,
    /// Hazards within the radius, one entry per hazard id, closest first.
    pub hazards: Vec<NearbyHazard>,
    /// Closest distance from any vertex to any hazard; infinite when the
    /// hazard set is empty.
    pub min_distance_m: f64,
    pub radius_m: f64,
    pub safe: bool,
}

impl RouteProximityResult {
    pub fn hazard_count(&self) -> usize {
        self.hazards.len()
    }
}
