use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::ValidationError;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting values outside the WGS84 ranges.
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        let c = Self { lat, lng };
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let reason = if !self.lat.is_finite() || !self.lng.is_finite() {
            "coordinates must be finite numbers"
        } else if !(-90.0..=90.0).contains(&self.lat) {
            "latitude must be between -90 and 90"
        } else if !(-180.0..=180.0).contains(&self.lng) {
            "longitude must be between -180 and 180"
        } else {
            return Ok(());
        };
        Err(ValidationError::InvalidCoordinate {
            lat: self.lat,
            lng: self.lng,
            reason: reason.to_string(),
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Alert classification issued for a hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Advisory,
    Warning,
    Emergency,
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "warning" => Ok(Self::Warning),
            "emergency" => Ok(Self::Emergency),
            other => Err(format!("unknown alert type '{other}'")),
        }
    }
}

/// Severity tier, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// A reported flood-risk location. Never mutated after it is built; a refresh
/// replaces the whole set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardPoint {
    pub id: String,
    pub location: Coordinate,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub name: Option<String>,
    pub sources: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A hazard as it arrives on the wire, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HazardRecord {
    #[serde(default, deserialize_with = "parse_id_option")]
    pub id: Option<String>,
    #[serde(default, alias = "latitude", deserialize_with = "parse_f64_option")]
    pub lat: Option<f64>,
    #[serde(default, alias = "longitude", alias = "lon", deserialize_with = "parse_f64_option")]
    pub lng: Option<f64>,
    #[serde(default, alias = "alertType", alias = "type")]
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    /// Kept raw; an unreadable timestamp becomes `None` during validation.
    #[serde(default, alias = "updatedAt", deserialize_with = "parse_id_option")]
    pub updated_at: Option<String>,
}

impl HazardRecord {
    /// Decodes one element of a hazard array. A shape error names the
    /// record by its `id`, or by its position when the id is unreadable.
    pub fn from_value(index: usize, value: Value) -> Result<Self, ValidationError> {
        let id = match value.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("#{index}"),
        };
        serde_json::from_value(value).map_err(|e| invalid(&id, "record", e.to_string()))
    }
}

impl TryFrom<HazardRecord> for HazardPoint {
    type Error = ValidationError;

    fn try_from(record: HazardRecord) -> Result<Self, Self::Error> {
        let id = match record.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(invalid("<unknown>", "id", "is missing")),
        };

        let lat = record.lat.ok_or_else(|| invalid(&id, "lat", "is missing"))?;
        let lng = record.lng.ok_or_else(|| invalid(&id, "lng", "is missing"))?;
        let location = Coordinate::new(lat, lng).map_err(|e| invalid(&id, "location", e.to_string()))?;

        let alert_type = record
            .alert_type
            .as_deref()
            .ok_or_else(|| invalid(&id, "alert_type", "is missing"))?
            .parse::<AlertType>()
            .map_err(|e| invalid(&id, "alert_type", e))?;

        let severity = record
            .severity
            .as_deref()
            .ok_or_else(|| invalid(&id, "severity", "is missing"))?
            .parse::<Severity>()
            .map_err(|e| invalid(&id, "severity", e))?;

        let updated_at = match record.updated_at.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    warn!("Hazard {}: ignoring unreadable updated_at '{}'", id, raw);
                }
                parsed
            }
            _ => None,
        };

        Ok(Self {
            id,
            location,
            alert_type,
            severity,
            name: record.name,
            sources: record.sources,
            updated_at,
        })
    }
}

/// Accepts RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` (space or `T`
/// separated) taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.and_utc())
}

fn invalid(id: &str, field: &'static str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidRecord {
        id: id.to_string(),
        field,
        reason: reason.into(),
    }
}

/// Validates a batch of records, failing on the first bad one.
pub fn parse_hazard_records(records: Vec<HazardRecord>) -> Result<Vec<HazardPoint>, ValidationError> {
    records.into_iter().map(HazardPoint::try_from).collect()
}

/// Result of asking the hazard data source for the current set.
///
/// Keeps "the source answered with nothing" apart from "the source did not
/// answer".
#[derive(Debug, Clone, PartialEq)]
pub enum HazardFeed {
    Available {
        hazards: Vec<HazardPoint>,
        fetched_at: DateTime<Utc>,
    },
    Unavailable {
        reason: String,
        at: DateTime<Utc>,
    },
}

impl HazardFeed {
    pub fn available(hazards: Vec<HazardPoint>) -> Self {
        Self::Available {
            hazards,
            fetched_at: Utc::now(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn hazards(&self) -> Option<&[HazardPoint]> {
        match self {
            Self::Available { hazards, .. } => Some(hazards),
            Self::Unavailable { .. } => None,
        }
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

fn parse_id_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Int(i64),
    }

    let v: Option<StringOrNumber> = Option::deserialize(deserializer)?;
    Ok(v.map(|id| match id {
        StringOrNumber::String(s) => s,
        StringOrNumber::Int(n) => n.to_string(),
    }))
}
