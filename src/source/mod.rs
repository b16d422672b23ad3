//! Hazard data collaborator: the HTTP service that serves flood data.

use async_trait::async_trait;
use tracing::warn;

use crate::error::{SourceError, ValidationError};
use crate::models::{BoundingBox, Coordinate, HazardFeed, HazardPoint};

pub mod endpoints;
pub mod http;

pub use http::HttpHazardSource;

/// The area to fetch hazards for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HazardQuery {
    Bounds(BoundingBox),
    Radius { center: Coordinate, radius_m: f64 },
}

impl HazardQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Bounds(b) => b.validate(),
            Self::Radius { center, radius_m } => {
                center.validate()?;
                if radius_m.is_finite() && *radius_m >= 0.0 {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidRadius(*radius_m))
                }
            }
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Bounds(_) => endpoints::FLOOD_DATA,
            Self::Radius { .. } => endpoints::FLOOD_DATA_BY_LOCATION,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Bounds(b) => vec![
                ("north", b.north.to_string()),
                ("south", b.south.to_string()),
                ("east", b.east.to_string()),
                ("west", b.west.to_string()),
            ],
            Self::Radius { center, radius_m } => vec![
                ("lat", center.lat.to_string()),
                ("lng", center.lng.to_string()),
                ("radius", radius_m.to_string()),
            ],
        }
    }
}

#[async_trait]
pub trait HazardSource: Send + Sync {
    async fn fetch(&self, query: &HazardQuery) -> Result<Vec<HazardPoint>, SourceError>;
}

/// Fetches hazards and records a failure as an unavailable feed instead of
/// an empty one.
pub async fn fetch_feed(source: &dyn HazardSource, query: &HazardQuery) -> HazardFeed {
    match source.fetch(query).await {
        Ok(hazards) => HazardFeed::available(hazards),
        Err(e) => {
            warn!("Hazard source unavailable: {}", e);
            HazardFeed::unavailable(e.to_string())
        }
    }
}
