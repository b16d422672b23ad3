use std::collections::HashMap;

use crate::error::{EvaluationError, ValidationError};
use crate::models::{Coordinate, HazardFeed, HazardPoint, NearbyHazard, Route, RouteProximityResult};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Flood-advisory buffer around a route or location.
pub const DEFAULT_RADIUS_M: f64 = 1500.0;

/// How to treat a hazard feed the source could not deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingDataPolicy {
    /// Fail with [`EvaluationError::DataUnavailable`].
    #[default]
    Reject,
    /// Evaluate as if no hazards were reported.
    TreatAsEmpty,
}

/// Great-circle distance in meters.
///
/// No validation: out-of-range or NaN inputs produce a meaningless (or NaN)
/// result. Use the evaluation functions for checked input.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Hazards within `radius_m` of `reference`, closest first.
///
/// The boundary is inclusive: a hazard exactly `radius_m` away is returned.
pub fn find_nearby_hazards(
    reference: Coordinate,
    hazards: &[HazardPoint],
    radius_m: f64,
) -> Result<Vec<NearbyHazard>, ValidationError> {
    validate_radius(radius_m)?;
    reference.validate()?;
    validate_hazards(hazards)?;

    let mut nearby: Vec<NearbyHazard> = hazards
        .iter()
        .map(|h| NearbyHazard {
            hazard: h.clone(),
            distance_m: distance(reference, h.location),
        })
        .filter(|n| n.distance_m <= radius_m)
        .collect();
    nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    Ok(nearby)
}

/// Scores a route against a hazard set.
///
/// A hazard is near the route when any vertex lies within `radius_m` of it.
/// Hazards sharing an id are reported once, at their closest distance.
pub fn evaluate_route(
    route: &Route,
    hazards: &[HazardPoint],
    radius_m: f64,
) -> Result<RouteProximityResult, ValidationError> {
    validate_radius(radius_m)?;
    if route.path.is_empty() {
        return Err(ValidationError::EmptyRoute);
    }
    for vertex in &route.path {
        vertex.validate()?;
    }
    validate_hazards(hazards)?;

    let mut min_distance_m = f64::INFINITY;
    let mut nearby: Vec<NearbyHazard> = Vec::new();
    let mut index_by_id: HashMap<&str, usize> = HashMap::new();

    for hazard in hazards {
        let closest = route
            .path
            .iter()
            .map(|v| distance(*v, hazard.location))
            .fold(f64::INFINITY, f64::min);
        min_distance_m = min_distance_m.min(closest);

        if closest > radius_m {
            continue;
        }
        match index_by_id.get(hazard.id.as_str()) {
            Some(&i) => {
                if closest < nearby[i].distance_m {
                    nearby[i] = NearbyHazard {
                        hazard: hazard.clone(),
                        distance_m: closest,
                    };
                }
            }
            None => {
                index_by_id.insert(hazard.id.as_str(), nearby.len());
                nearby.push(NearbyHazard {
                    hazard: hazard.clone(),
                    distance_m: closest,
                });
            }
        }
    }

    nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    let safe = nearby.is_empty();

    Ok(RouteProximityResult {
        route: route.clone(),
        hazards: nearby,
        min_distance_m,
        radius_m,
        safe,
    })
}

/// Same as [`evaluate_route`] for a single location.
pub fn evaluate_location(
    reference: Coordinate,
    hazards: &[HazardPoint],
    radius_m: f64,
) -> Result<RouteProximityResult, ValidationError> {
    evaluate_route(&Route::at(reference), hazards, radius_m)
}

/// Evaluates a route against whatever the hazard source returned.
pub fn evaluate_feed(
    route: &Route,
    feed: &HazardFeed,
    radius_m: f64,
    policy: MissingDataPolicy,
) -> Result<RouteProximityResult, EvaluationError> {
    match (feed, policy) {
        (HazardFeed::Available { hazards, .. }, _) => Ok(evaluate_route(route, hazards, radius_m)?),
        (HazardFeed::Unavailable { .. }, MissingDataPolicy::TreatAsEmpty) => {
            Ok(evaluate_route(route, &[], radius_m)?)
        }
        (HazardFeed::Unavailable { reason, .. }, MissingDataPolicy::Reject) => {
            Err(EvaluationError::DataUnavailable(reason.clone()))
        }
    }
}

fn validate_radius(radius_m: f64) -> Result<(), ValidationError> {
    if radius_m.is_finite() && radius_m >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidRadius(radius_m))
    }
}

fn validate_hazards(hazards: &[HazardPoint]) -> Result<(), ValidationError> {
    for h in hazards {
        h.location.validate().map_err(|e| ValidationError::InvalidRecord {
            id: h.id.clone(),
            field: "location",
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
