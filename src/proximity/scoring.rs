use crate::models::{
    AlertType, HazardBreakdown, HazardPoint, Recommendation, RiskLevel, RouteProximityResult, SafetyAssessment,
};

const MAX_SCORE: usize = 100;
const CRITICAL_DISTANCE_M: f64 = 500.0;
const CAUTION_DISTANCE_M: f64 = 1000.0;

/// Per-hazard score penalty by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScoringWeights {
    /// 20 per high-severity hazard, 10 per medium, nothing for low.
    pub const fn severity_weighted() -> Self {
        Self {
            high: 20,
            medium: 10,
            low: 0,
        }
    }

    /// 15 per hazard regardless of severity.
    pub const fn flat() -> Self {
        Self {
            high: 15,
            medium: 15,
            low: 15,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::severity_weighted()
    }
}

/// Counts hazards by severity and alert type.
pub fn summarize(hazards: &[HazardPoint]) -> HazardBreakdown {
    HazardBreakdown::from_hazards(hazards)
}

pub fn score_safety(result: &RouteProximityResult) -> SafetyAssessment {
    score_safety_with(result, ScoringWeights::default())
}

pub fn score_safety_with(result: &RouteProximityResult, weights: ScoringWeights) -> SafetyAssessment {
    let breakdown = HazardBreakdown::from_hazards(result.hazards.iter().map(|n| &n.hazard));

    if result.safe {
        return SafetyAssessment {
            score: 100,
            risk_level: RiskLevel::Safe,
            recommendations: vec![Recommendation::CheckLiveConditions],
            breakdown,
        };
    }

    let penalty = breakdown
        .high
        .saturating_mul(weights.high)
        .saturating_add(breakdown.medium.saturating_mul(weights.medium))
        .saturating_add(breakdown.low.saturating_mul(weights.low))
        .saturating_add(distance_penalty(result.min_distance_m));
    let score = u8::try_from(MAX_SCORE.saturating_sub(penalty)).unwrap_or(0);

    let risk_level = if breakdown.high > 0 || result.min_distance_m < CRITICAL_DISTANCE_M {
        RiskLevel::High
    } else if breakdown.total > 2 || result.min_distance_m < CAUTION_DISTANCE_M {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut recommendations = Vec::with_capacity(3);
    if risk_level == RiskLevel::High {
        recommendations.push(Recommendation::Reroute);
    }
    if result.hazards.iter().any(|n| n.hazard.alert_type == AlertType::Emergency) {
        recommendations.push(Recommendation::EmergencyAdvisory);
    }
    recommendations.push(Recommendation::CheckLiveConditions);

    SafetyAssessment {
        score,
        risk_level,
        recommendations,
        breakdown,
    }
}

fn distance_penalty(min_distance_m: f64) -> usize {
    if min_distance_m < CRITICAL_DISTANCE_M {
        30
    } else if min_distance_m < CAUTION_DISTANCE_M {
        20
    } else {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, NearbyHazard, Route, Severity};

    fn nearby(id: &str, severity: Severity, alert_type: AlertType, distance_m: f64) -> NearbyHazard {
        NearbyHazard {
            hazard: HazardPoint {
                id: id.to_string(),
                location: Coordinate { lat: 37.5665, lng: 126.9780 },
                alert_type,
                severity,
                name: None,
                sources: vec![],
                updated_at: None,
            },
            distance_m,
        }
    }

    fn result(hazards: Vec<NearbyHazard>) -> RouteProximityResult {
        let min_distance_m = hazards.iter().map(|n| n.distance_m).fold(f64::INFINITY, f64::min);
        RouteProximityResult {
            route: Route::at(Coordinate { lat: 37.5665, lng: 126.9780 }),
            safe: hazards.is_empty(),
            hazards,
            min_distance_m,
            radius_m: 1500.0,
        }
    }

    #[test]
    fn test_safe_route_scores_full() {
        let assessment = score_safety(&result(vec![]));
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.risk_level, RiskLevel::Safe);
        assert_eq!(assessment.recommendations, vec![Recommendation::CheckLiveConditions]);
        assert_eq!(assessment.breakdown, HazardBreakdown::default());
    }

    #[test]
    fn test_severity_weighted_penalties() {
        // 20 (high) + 10 (medium) + 0 (low) + 20 (closest at 800 m)
        let r = result(vec![
            nearby("a", Severity::High, AlertType::Warning, 1200.0),
            nearby("b", Severity::Medium, AlertType::Advisory, 800.0),
            nearby("c", Severity::Low, AlertType::Advisory, 1400.0),
        ]);
        let assessment = score_safety(&r);
        assert_eq!(assessment.score, 50);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.breakdown.total, 3);
        assert_eq!(assessment.breakdown.high, 1);
        assert_eq!(assessment.breakdown.advisory, 2);
    }

    #[test]
    fn test_flat_weights() {
        let r = result(vec![
            nearby("a", Severity::Low, AlertType::Advisory, 1200.0),
            nearby("b", Severity::Low, AlertType::Advisory, 1300.0),
        ]);
        // 2 * 15 + 10
        assert_eq!(score_safety_with(&r, ScoringWeights::flat()).score, 60);
        // 0 + 10
        assert_eq!(score_safety(&r).score, 90);
    }

    #[test]
    fn test_distance_bands() {
        let at = |d| score_safety(&result(vec![nearby("a", Severity::Medium, AlertType::Warning, d)]));
        assert_eq!(at(499.0).score, 60);
        assert_eq!(at(500.0).score, 70);
        assert_eq!(at(999.0).score, 70);
        assert_eq!(at(1000.0).score, 80);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let hazards = (0..10)
            .map(|i| nearby(&format!("h{i}"), Severity::High, AlertType::Emergency, 100.0))
            .collect();
        assert_eq!(score_safety(&result(hazards)).score, 0);
    }

    #[test]
    fn test_risk_levels() {
        let low = score_safety(&result(vec![nearby("a", Severity::Low, AlertType::Advisory, 1200.0)]));
        assert_eq!(low.risk_level, RiskLevel::Low);

        let medium_by_distance = score_safety(&result(vec![nearby("a", Severity::Low, AlertType::Advisory, 900.0)]));
        assert_eq!(medium_by_distance.risk_level, RiskLevel::Medium);

        let medium_by_count = score_safety(&result(vec![
            nearby("a", Severity::Low, AlertType::Advisory, 1200.0),
            nearby("b", Severity::Low, AlertType::Advisory, 1300.0),
            nearby("c", Severity::Medium, AlertType::Advisory, 1400.0),
        ]));
        assert_eq!(medium_by_count.risk_level, RiskLevel::Medium);

        let high_by_distance = score_safety(&result(vec![nearby("a", Severity::Low, AlertType::Advisory, 300.0)]));
        assert_eq!(high_by_distance.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_recommendation_order() {
        let r = result(vec![nearby("a", Severity::High, AlertType::Emergency, 200.0)]);
        assert_eq!(
            score_safety(&r).recommendations,
            vec![
                Recommendation::Reroute,
                Recommendation::EmergencyAdvisory,
                Recommendation::CheckLiveConditions,
            ]
        );

        let r = result(vec![nearby("a", Severity::Low, AlertType::Emergency, 1200.0)]);
        assert_eq!(
            score_safety(&r).recommendations,
            vec![Recommendation::EmergencyAdvisory, Recommendation::CheckLiveConditions]
        );
    }

    #[test]
    fn test_score_non_increasing_with_more_hazards() {
        let severities = [Severity::Low, Severity::High, Severity::Medium, Severity::Low, Severity::High];
        let distances = [1400.0, 1100.0, 700.0, 1300.0, 450.0];

        for weights in [ScoringWeights::severity_weighted(), ScoringWeights::flat()] {
            let mut hazards = Vec::new();
            let mut previous = score_safety_with(&result(vec![]), weights).score;
            for (i, (sev, d)) in severities.iter().zip(distances).enumerate() {
                hazards.push(nearby(&format!("h{i}"), *sev, AlertType::Warning, d));
                let score = score_safety_with(&result(hazards.clone()), weights).score;
                assert!(score <= previous, "score rose from {previous} to {score} at hazard {i}");
                previous = score;
            }
        }
    }

    #[test]
    fn test_summarize() {
        let hazards: Vec<HazardPoint> = vec![
            nearby("a", Severity::High, AlertType::Emergency, 0.0).hazard,
            nearby("b", Severity::Low, AlertType::Warning, 0.0).hazard,
        ];
        let b = summarize(&hazards);
        assert_eq!((b.total, b.high, b.low, b.emergency, b.warning), (2, 1, 1, 1, 1));
    }
}
