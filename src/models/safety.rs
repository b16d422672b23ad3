use serde::Serialize;
use std::fmt;

use super::hazard::{AlertType, HazardPoint, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Safe => "safe",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// Advice attached to an assessment. Variants are listed in the order they
/// are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Reroute,
    EmergencyAdvisory,
    CheckLiveConditions,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Reroute => "Flood risk on this route is high: choose an alternative route immediately.",
            Self::EmergencyAdvisory => {
                "An emergency flood alert is active nearby: avoid underpasses and riverside roads and follow evacuation guidance."
            }
            Self::CheckLiveConditions => "Check live flood conditions before departing.",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Hazard counts by severity and by alert type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HazardBreakdown {
    pub total: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub advisory: usize,
    pub warning: usize,
    pub emergency: usize,
}

impl HazardBreakdown {
    pub fn from_hazards<'a>(hazards: impl IntoIterator<Item = &'a HazardPoint>) -> Self {
        hazards.into_iter().fold(Self::default(), |mut acc, h| {
            acc.total += 1;
            match h.severity {
                Severity::Low => acc.low += 1,
                Severity::Medium => acc.medium += 1,
                Severity::High => acc.high += 1,
            }
            match h.alert_type {
                AlertType::Advisory => acc.advisory += 1,
                AlertType::Warning => acc.warning += 1,
                AlertType::Emergency => acc.emergency += 1,
            }
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyAssessment {
    /// 0 (worst) to 100 (no hazards).
    pub score: u8,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<Recommendation>,
    pub breakdown: HazardBreakdown,
}
