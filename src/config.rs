use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::models::{AlertType, Coordinate, Route, Severity, SubscriptionFilters};
use crate::realtime::ChannelOptions;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub realtime_url: String,
    pub hazard_api_url: String,
    pub flood_room: String,
    pub filters: SubscriptionFilters,
    pub proximity_radius_m: f64,
    pub watch_route: Route,
    pub connect_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub fallback_poll_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let realtime_url = env::var("REALTIME_URL").unwrap_or_else(|_| "ws://localhost:3001/ws".to_string());
        let hazard_api_url = env::var("HAZARD_API_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());
        let flood_room = env::var("FLOOD_ROOM").unwrap_or_else(|_| "flood_data".to_string());

        let min_severity = match env::var("FILTER_MIN_SEVERITY") {
            Ok(s) if !s.trim().is_empty() => Some(s.parse::<Severity>().map_err(anyhow::Error::msg)?),
            _ => None,
        };
        let alert_type = match env::var("FILTER_ALERT_TYPE") {
            Ok(s) if !s.trim().is_empty() => Some(s.parse::<AlertType>().map_err(anyhow::Error::msg)?),
            _ => None,
        };
        let filters = SubscriptionFilters {
            min_severity,
            alert_type,
            bounds: None,
        };

        let proximity_radius_m = env::var("PROXIMITY_RADIUS_M")
            .unwrap_or_else(|_| "1500".to_string())
            .parse()
            .unwrap_or(1500.0);

        let watch_route_str =
            env::var("WATCH_ROUTE").unwrap_or_else(|_| "37.5665,126.9780;37.5700,126.9820".to_string());
        let watch_route = parse_route(&watch_route_str).context("invalid WATCH_ROUTE")?;

        let connect_timeout_secs = parse_or("CONNECT_TIMEOUT_SECS", 10);
        let heartbeat_interval_secs = parse_or("HEARTBEAT_INTERVAL_SECS", 30);
        let reconnect_base_delay_ms = parse_or("RECONNECT_BASE_DELAY_MS", 1000);
        let max_reconnect_attempts = env::var("MAX_RECONNECT_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let fallback_poll_interval_secs = parse_or("FALLBACK_POLL_INTERVAL_SECS", 30);
        let http_timeout_secs = parse_or("HTTP_TIMEOUT_SECS", 10);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            realtime_url,
            hazard_api_url,
            flood_room,
            filters,
            proximity_radius_m,
            watch_route,
            connect_timeout_secs,
            heartbeat_interval_secs,
            reconnect_base_delay_ms,
            max_reconnect_attempts,
            fallback_poll_interval_secs,
            http_timeout_secs,
            log_level,
        })
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            reconnect_base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
            fallback_poll_interval: Duration::from_secs(self.fallback_poll_interval_secs),
        }
    }
}

fn parse_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `lat,lng;lat,lng;...` into a route with no provider metrics.
pub fn parse_route(s: &str) -> Result<Route> {
    let mut path = Vec::new();
    for (i, pair) in s.split(';').map(str::trim).filter(|p| !p.is_empty()).enumerate() {
        let Some((lat, lng)) = pair.split_once(',') else {
            bail!("vertex {} '{}' is not 'lat,lng'", i, pair);
        };
        let lat: f64 = lat.trim().parse().with_context(|| format!("vertex {i}: bad latitude '{lat}'"))?;
        let lng: f64 = lng.trim().parse().with_context(|| format!("vertex {i}: bad longitude '{lng}'"))?;
        path.push(Coordinate::new(lat, lng).with_context(|| format!("vertex {i}"))?);
    }
    if path.is_empty() {
        bail!("route has no vertices");
    }
    Ok(Route::new(path, 0.0, 0.0))
}
