use tracing::{debug, info, warn};

use crate::error::EvaluationError;
use crate::models::{HazardFeed, HazardPoint, RiskLevel, Route, SafetyAssessment, ServerMessage, SubscriptionFilters};
use crate::proximity::{self, MissingDataPolicy};
use crate::realtime::ChannelEvent;

/// The route being watched and how close a hazard has to be to count.
#[derive(Debug, Clone)]
pub struct WatchContext {
    pub route: Route,
    pub radius_m: f64,
    /// Applied to polled data, which the server has not filtered.
    pub filters: SubscriptionFilters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Live,
    Fallback,
}

/// Evaluates the watched route against a hazard set and logs the outcome.
pub fn process_hazards(
    ctx: &WatchContext,
    hazards: &[HazardPoint],
    origin: DataOrigin,
) -> Result<SafetyAssessment, EvaluationError> {
    let result = proximity::evaluate_route(&ctx.route, hazards, ctx.radius_m)?;
    debug!("{} of {} hazards within {} m of the route", result.hazard_count(), hazards.len(), ctx.radius_m);
    let assessment = proximity::score_safety(&result);
    log_assessment(&assessment, result.min_distance_m, origin);
    Ok(assessment)
}

/// Handles one channel event. Returns the new assessment when the event
/// carried hazard data.
pub fn process_event(ctx: &WatchContext, event: &ChannelEvent) -> Option<SafetyAssessment> {
    let outcome = match event {
        ChannelEvent::Message(ServerMessage::FloodUpdate(hazards)) => {
            debug!("Flood update with {} hazards", hazards.len());
            process_hazards(ctx, hazards, DataOrigin::Live)
        }
        ChannelEvent::Message(ServerMessage::FloodAlert(alert)) => {
            let threat = proximity::evaluate_route(&ctx.route, std::slice::from_ref(&alert.hazard), ctx.radius_m);
            match threat {
                Ok(r) if !r.safe => warn!(
                    hazard = %alert.hazard.id,
                    distance_m = r.min_distance_m.round(),
                    "Alert on watched route: {}",
                    alert.message
                ),
                Ok(_) => info!(hazard = %alert.hazard.id, "Alert away from watched route: {}", alert.message),
                Err(e) => warn!("Could not place alert {} at {}: {}", alert.hazard.id, alert.hazard.location, e),
            }
            return None;
        }
        ChannelEvent::FallbackData(feed) => {
            let filtered = filter_feed(feed, &ctx.filters);
            proximity::evaluate_feed(&ctx.route, &filtered, ctx.radius_m, MissingDataPolicy::Reject).map(|result| {
                let assessment = proximity::score_safety(&result);
                log_assessment(&assessment, result.min_distance_m, DataOrigin::Fallback);
                assessment
            })
        }
        _ => return None,
    };

    match outcome {
        Ok(assessment) => Some(assessment),
        Err(EvaluationError::DataUnavailable(reason)) => {
            warn!("Showing stale assessment: hazard data unavailable ({})", reason);
            None
        }
        Err(e) => {
            warn!("Skipping hazard data: {}", e);
            None
        }
    }
}

fn filter_feed(feed: &HazardFeed, filters: &SubscriptionFilters) -> HazardFeed {
    match feed {
        HazardFeed::Available { hazards, fetched_at } => HazardFeed::Available {
            hazards: hazards.iter().filter(|h| filters.matches(h)).cloned().collect(),
            fetched_at: *fetched_at,
        },
        unavailable => unavailable.clone(),
    }
}

fn log_assessment(assessment: &SafetyAssessment, min_distance_m: f64, origin: DataOrigin) {
    let source = match origin {
        DataOrigin::Live => "live",
        DataOrigin::Fallback => "polled (may be stale)",
    };
    let advice: Vec<&str> = assessment.recommendations.iter().map(|r| r.message()).collect();

    match assessment.risk_level {
        RiskLevel::Safe | RiskLevel::Low => info!(
            score = assessment.score,
            risk = %assessment.risk_level,
            hazards = assessment.breakdown.total,
            "Route assessment from {} data. {}",
            source,
            advice.join(" ")
        ),
        RiskLevel::Medium | RiskLevel::High => warn!(
            score = assessment.score,
            risk = %assessment.risk_level,
            hazards = assessment.breakdown.total,
            min_distance_m = min_distance_m.round(),
            "Route assessment from {} data. {}",
            source,
            advice.join(" ")
        ),
    }
}
