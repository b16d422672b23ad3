pub mod hazard;
pub mod message;
pub mod route;
pub mod safety;

pub use hazard::{parse_hazard_records, AlertType, Coordinate, HazardFeed, HazardPoint, HazardRecord, Severity};
pub use message::{BoundingBox, ClientMessage, HazardAlert, ServerMessage, Subscription, SubscriptionFilters};
pub use route::{NearbyHazard, Route, RouteProximityResult};
pub use safety::{HazardBreakdown, Recommendation, RiskLevel, SafetyAssessment};
