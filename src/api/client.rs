/// HTTP calls against the telemetry backend
use log::debug;
use reqwest::{Client, StatusCode};
use std::fmt;
use url::Url;

use crate::config::ApiConfig;
use crate::models::{TelemetryAck, TelemetryPacket, TripLocations};

pub const API_KEY_HEADER: &str = "X-API-KEY";
pub const DEVICE_SOURCE_HEADER: &str = "X-Device-Source";

#[derive(Debug)]
pub enum ApiError {
    /// Connection, timeout or body errors from the HTTP client
    Transport(reqwest::Error),
    /// Backend answered with an unexpected status
    Status { status: StatusCode, body: String },
    /// Base URL cannot carry path segments
    InvalidUrl(String),
    /// Telemetry was accepted but no trip identifier came back
    MissingTripId,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(e) => write!(f, "request failed: {}", e),
            ApiError::Status { status, body } if body.is_empty() => write!(f, "{}", status),
            ApiError::Status { status, body } => write!(f, "{} - {}", status, body),
            ApiError::InvalidUrl(url) => write!(f, "cannot build endpoint from {}", url),
            ApiError::MissingTripId => write!(f, "response carried no trip id"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e)
    }
}

/// One client per run; every request carries the API key and device source
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    http: Client,
    api_url: Url,
    base_url: Url,
    api_key: String,
    device_id: String,
}

impl TelemetryClient {
    pub fn new(api: &ApiConfig, device_id: &str) -> Result<Self, ApiError> {
        let http = Client::builder().build()?;
        Ok(TelemetryClient {
            http,
            api_url: api.api_url.clone(),
            base_url: api.base_url.clone(),
            api_key: api.api_key.clone(),
            device_id: device_id.to_string(),
        })
    }

    /// POST a packet to the ingestion endpoint
    ///
    /// 200 and 201 count as accepted. The body is searched for a trip id; a
    /// body that is empty or not JSON simply yields an ack without one.
    pub async fn post_packet(&self, packet: &TelemetryPacket) -> Result<TelemetryAck, ApiError> {
        let response = self
            .http
            .post(self.api_url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .header(DEVICE_SOURCE_HEADER, &self.device_id)
            .json(packet)
            .send()
            .await?;

        let status = response.status();
        // The packet is stored once the status arrives; a broken body only loses the trip id
        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(ApiError::Status { status, body });
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            debug!("Telemetry response is not a JSON object ({}): {:?}", e, body);
            TelemetryAck::default()
        }))
    }

    /// PUT the display name for this device
    pub async fn set_device_name(&self, name: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "devices", self.device_id.as_str(), "name"])?;
        let response = self
            .http
            .put(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(DEVICE_SOURCE_HEADER, &self.device_id)
            .json(name)
            .send()
            .await?;
        expect_ok(response).await
    }

    /// PATCH start and end locations onto an existing trip
    pub async fn patch_trip_locations(
        &self,
        trip_id: &str,
        locations: &TripLocations,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "trips", trip_id])?;
        let response = self
            .http
            .patch(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(DEVICE_SOURCE_HEADER, &self.device_id)
            .json(locations)
            .send()
            .await?;
        expect_ok(response).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn expect_ok(response: reqwest::Response) -> Result<(), ApiError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}
