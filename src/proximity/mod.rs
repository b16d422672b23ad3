//! Distance, nearby-hazard and route safety evaluation.
//!
//! Everything here is pure: same inputs give the same output, and input is
//! validated before any arithmetic runs.

pub mod evaluator;
pub mod scoring;

pub use evaluator::{
    distance, evaluate_feed, evaluate_location, evaluate_route, find_nearby_hazards, MissingDataPolicy,
    DEFAULT_RADIUS_M, EARTH_RADIUS_M,
};
pub use scoring::{score_safety, score_safety_with, summarize, ScoringWeights};
