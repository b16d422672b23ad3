use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hazard::{parse_hazard_records, AlertType, Coordinate, HazardPoint, HazardRecord, Severity};
use crate::error::{FrameError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Coordinate { lat: self.north, lng: self.east }
            .validate()
            .and_then(|_| Coordinate { lat: self.south, lng: self.west }.validate())
            .map_err(|e| ValidationError::InvalidBounds(e.to_string()))?;
        if self.south > self.north {
            return Err(ValidationError::InvalidBounds(format!(
                "south {} is above north {}",
                self.south, self.north
            )));
        }
        Ok(())
    }

    /// Whether the point lies inside the box. A box with `west > east`
    /// crosses the antimeridian.
    pub fn contains(&self, c: &Coordinate) -> bool {
        let in_lat = c.lat >= self.south && c.lat <= self.north;
        let in_lng = if self.west <= self.east {
            c.lng >= self.west && c.lng <= self.east
        } else {
            c.lng >= self.west || c.lng <= self.east
        };
        in_lat && in_lng
    }
}

/// Filters sent with a room subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<AlertType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
}

impl SubscriptionFilters {
    pub fn matches(&self, hazard: &HazardPoint) -> bool {
        self.min_severity.map_or(true, |min| hazard.severity >= min)
            && self.alert_type.map_or(true, |t| hazard.alert_type == t)
            && self.bounds.as_ref().map_or(true, |b| b.contains(&hazard.location))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub room: String,
    pub filters: SubscriptionFilters,
    pub created_at: DateTime<Utc>,
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        room: String,
        filters: SubscriptionFilters,
    },
    Unsubscribe {
        room: String,
    },
    Ping {
        timestamp: i64,
    },
    Request {
        request_id: String,
        action: String,
        payload: Value,
    },
    Publish {
        room: String,
        payload: Value,
    },
}

/// An alert pushed for a single hazard.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardAlert {
    pub hazard: HazardPoint,
    pub message: String,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct HazardAlertRecord {
    hazard: HazardRecord,
    #[serde(default)]
    message: String,
    #[serde(default, alias = "issuedAt")]
    issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RoomAck {
    room: String,
}

#[derive(Debug, Deserialize)]
struct PongPayload {
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    request_id: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Frames the server sends, validated into typed variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    FloodUpdate(Vec<HazardPoint>),
    FloodAlert(HazardAlert),
    Subscribed { room: String },
    Unsubscribed { room: String },
    Pong { timestamp: Option<i64> },
    ServerError { message: String },
    Response {
        request_id: String,
        result: Result<Value, String>,
    },
    /// A frame whose `type` this client does not know.
    Unknown { kind: String, data: Value },
}

/// The `{ "type": ..., "data": ... }` envelope every frame shares.
#[derive(Debug, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        Self::try_from(raw)
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::FloodUpdate(_) => "flood_update",
            Self::FloodAlert(_) => "flood_alert",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::Pong { .. } => "pong",
            Self::ServerError { .. } => "error",
            Self::Response { .. } => "response",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

impl TryFrom<RawFrame> for ServerMessage {
    type Error = FrameError;

    fn try_from(raw: RawFrame) -> Result<Self, FrameError> {
        let RawFrame { kind, data } = raw;
        let msg = match kind.as_str() {
            "flood_update" => {
                let items: Vec<Value> = payload(&kind, data)?;
                let records = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| HazardRecord::from_value(i, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::FloodUpdate(parse_hazard_records(records)?)
            }
            "flood_alert" => {
                let record: HazardAlertRecord = payload(&kind, data)?;
                Self::FloodAlert(HazardAlert {
                    hazard: HazardPoint::try_from(record.hazard)?,
                    message: record.message,
                    issued_at: record.issued_at,
                })
            }
            "subscribed" => {
                let ack: RoomAck = payload(&kind, data)?;
                Self::Subscribed { room: ack.room }
            }
            "unsubscribed" => {
                let ack: RoomAck = payload(&kind, data)?;
                Self::Unsubscribed { room: ack.room }
            }
            "pong" => {
                let pong: PongPayload = if data.is_null() {
                    PongPayload { timestamp: None }
                } else {
                    payload(&kind, data)?
                };
                Self::Pong { timestamp: pong.timestamp }
            }
            "error" => {
                let err: ErrorPayload = payload(&kind, data)?;
                Self::ServerError { message: err.message }
            }
            "response" => {
                let resp: ResponsePayload = payload(&kind, data)?;
                let result = match resp.error {
                    Some(e) => Err(e),
                    None => Ok(resp.payload),
                };
                Self::Response {
                    request_id: resp.request_id,
                    result,
                }
            }
            _ => Self::Unknown { kind, data },
        };
        Ok(msg)
    }
}

fn payload<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T, FrameError> {
    serde_json::from_value(data).map_err(|e| FrameError::Payload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parsing_flood_update_frame() {
        let payload = r#"
        {
            "type": "flood_update",
            "data": [
                { "id": "hz-1", "lat": 37.5700, "lng": 126.9820, "alertType": "emergency", "severity": "high" },
                { "id": "hz-2", "lat": "37.5512", "lng": "126.9882", "alertType": "advisory", "severity": "low" }
            ],
            "timestamp": 1764398681920
        }
        "#;

        let msg = ServerMessage::parse(payload).unwrap();
        match msg {
            ServerMessage::FloodUpdate(hazards) => {
                assert_eq!(hazards.len(), 2);
                assert_eq!(hazards[0].alert_type, AlertType::Emergency);
                assert_eq!(hazards[1].location.lat, 37.5512);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_flood_update_with_bad_record_is_rejected() {
        let payload = r#"{ "type": "flood_update", "data": [ { "id": "hz-1", "lng": 126.98, "alertType": "warning", "severity": "low" } ] }"#;
        assert!(matches!(
            ServerMessage::parse(payload),
            Err(FrameError::Validation(ValidationError::InvalidRecord { field: "lat", .. }))
        ));
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let msg = ServerMessage::parse(r#"{ "type": "river_level", "data": { "gauge": "Hangang", "m": 5.2 } }"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Unknown {
                kind: "river_level".to_string(),
                data: json!({ "gauge": "Hangang", "m": 5.2 }),
            }
        );
        assert_eq!(msg.kind(), "river_level");
    }

    #[test]
    fn test_known_type_with_wrong_shape_is_payload_error() {
        let err = ServerMessage::parse(r#"{ "type": "subscribed", "data": { "name": "flood_data" } }"#).unwrap_err();
        assert!(matches!(err, FrameError::Payload { ref kind, .. } if kind == "subscribed"));
    }

    #[test]
    fn test_response_frames() {
        let ok = ServerMessage::parse(r#"{ "type": "response", "data": { "request_id": "r1", "payload": { "count": 3 } } }"#).unwrap();
        assert_eq!(
            ok,
            ServerMessage::Response {
                request_id: "r1".to_string(),
                result: Ok(json!({ "count": 3 })),
            }
        );

        let err = ServerMessage::parse(r#"{ "type": "response", "data": { "request_id": "r2", "error": "no such area" } }"#).unwrap();
        assert_eq!(
            err,
            ServerMessage::Response {
                request_id: "r2".to_string(),
                result: Err("no such area".to_string()),
            }
        );
    }

    #[test]
    fn test_client_message_wire_shape() {
        let msg = ClientMessage::Subscribe {
            room: "flood_data".to_string(),
            filters: SubscriptionFilters {
                min_severity: Some(Severity::Medium),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "subscribe", "data": { "room": "flood_data", "filters": { "min_severity": "medium" } } })
        );
    }

    #[test]
    fn test_filters_match() {
        let hazard = HazardPoint {
            id: "hz-1".to_string(),
            location: Coordinate { lat: 37.57, lng: 126.98 },
            alert_type: AlertType::Warning,
            severity: Severity::Medium,
            name: None,
            sources: vec![],
            updated_at: None,
        };
        let seoul = BoundingBox { north: 37.7, south: 37.4, east: 127.2, west: 126.8 };
        let busan = BoundingBox { north: 35.3, south: 35.0, east: 129.2, west: 128.9 };

        assert!(SubscriptionFilters::default().matches(&hazard));
        assert!(SubscriptionFilters { min_severity: Some(Severity::Low), bounds: Some(seoul), ..Default::default() }.matches(&hazard));
        assert!(!SubscriptionFilters { min_severity: Some(Severity::High), ..Default::default() }.matches(&hazard));
        assert!(!SubscriptionFilters { alert_type: Some(AlertType::Emergency), ..Default::default() }.matches(&hazard));
        assert!(!SubscriptionFilters { bounds: Some(busan), ..Default::default() }.matches(&hazard));
    }

    #[test]
    fn test_bounding_box_validation() {
        assert!(BoundingBox { north: 37.7, south: 37.4, east: 127.2, west: 126.8 }.validate().is_ok());
        assert!(BoundingBox { north: 37.4, south: 37.7, east: 127.2, west: 126.8 }.validate().is_err());
        assert!(BoundingBox { north: 95.0, south: 37.7, east: 127.2, west: 126.8 }.validate().is_err());
    }
}
