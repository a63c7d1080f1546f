use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use serde::Deserialize;

use crate::{
    error::FetchError,
    model::{FlowReading, Point},
};

use super::TrafficProvider;

pub const DEFAULT_ENDPOINT: &str =
    "https://api.tomtom.com/traffic/services/4/flowSegmentData/relative0/10/json";

#[derive(Debug, Clone)]
pub struct TomTomProvider {
    api_key: String,
    endpoint: String,
    timeout: Duration,
    http: Client,
}

impl TomTomProvider {
    pub fn new(api_key: String, endpoint: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for TomTom")?;

        Ok(Self { api_key, endpoint, timeout, http })
    }

    /// `GET <endpoint>?key=<key>&point=<lat>,<lon>` for one point.
    fn flow_request(&self, point: &Point) -> Result<Request, FetchError> {
        let coords = format!("{},{}", point.lat, point.lon);

        let req = self
            .http
            .get(&self.endpoint)
            .query(&[("key", self.api_key.as_str()), ("point", coords.as_str())])
            .timeout(self.timeout)
            .build()?;

        Ok(req)
    }
}

#[derive(Debug, Deserialize)]
struct TtFlowSegment {
    #[serde(rename = "currentSpeed")]
    current_speed: Option<f64>,
    #[serde(rename = "freeFlowSpeed")]
    free_flow_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TtResponse {
    #[serde(rename = "flowSegmentData")]
    flow_segment_data: Option<TtFlowSegment>,
}

#[async_trait]
impl TrafficProvider for TomTomProvider {
    async fn fetch_flow(&self, point: &Point) -> Result<FlowReading, FetchError> {
        let req = self.flow_request(point)?;
        let res = self.http.execute(req).await?;

        let status = res.status();
        let body = res.text().await?;

        parse_flow_response(status, &body)
    }
}

/// Map a raw TomTom response onto a reading. Only the status and payload
/// shape are checked here; speed validation happens when the record is
/// built.
fn parse_flow_response(status: StatusCode, body: &str) -> Result<FlowReading, FetchError> {
    if !status.is_success() {
        return Err(FetchError::Status { status, body: truncate_body(body) });
    }

    let parsed: TtResponse = serde_json::from_str(body)?;
    let segment = parsed.flow_segment_data.ok_or(FetchError::MissingPayload)?;

    Ok(FlowReading {
        current_speed: segment.current_speed,
        free_flow_speed: segment.free_flow_speed,
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
