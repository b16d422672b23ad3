use async_trait::async_trait;
use serde::de::Error as _;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{endpoints, HazardQuery, HazardSource};
use crate::error::SourceError;
use crate::models::{parse_hazard_records, HazardPoint, HazardRecord};

/// Hazard source backed by the flood-data REST service.
#[derive(Debug, Clone)]
pub struct HttpHazardSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHazardSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Probes the service health endpoint.
    pub async fn health(&self) -> Result<bool, SourceError> {
        let resp = self.client.get(self.url_for(endpoints::HEALTH)).send().await?;
        let healthy = resp.status().is_success();
        info!("Hazard source health check: {}", resp.status());
        Ok(healthy)
    }
}

#[async_trait]
impl HazardSource for HttpHazardSource {
    async fn fetch(&self, query: &HazardQuery) -> Result<Vec<HazardPoint>, SourceError> {
        query.validate()?;
        let url = self.url_for(query.path());
        debug!("Fetching hazards from {} {:?}", url, query.params());

        let resp = self.client.get(&url).query(&query.params()).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let hazards = decode_hazards(&body)?;
        debug!("Fetched {} hazards", hazards.len());
        Ok(hazards)
    }
}

/// Decodes a response body that is either a bare array of hazards or an
/// object carrying the array under `data`.
pub fn decode_hazards(body: &str) -> Result<Vec<HazardPoint>, SourceError> {
    let items = match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Err(serde_json::Error::custom("response object has no `data` array").into()),
        },
        _ => return Err(serde_json::Error::custom("expected an array of hazards").into()),
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| HazardRecord::from_value(i, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parse_hazard_records(records)?)
}
