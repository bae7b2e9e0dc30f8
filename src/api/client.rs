//! Simulation API Client
//!
//! HTTP client for the simulation REST surface. Control endpoints take
//! their parameters as query strings with an empty body; that is the
//! server's wire contract.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::types::{Ack, SimulationHistoryRecord, SimulationMode, SimulationStatus, StartParams};
use crate::config::ConsoleConfig;
use crate::error::{ApiError, ApiResult};

/// The seven operations the console consumes.
///
/// The sync core is generic over this so sessions and tests can swap the
/// transport.
pub trait SimulationApi: Send + Sync + 'static {
    fn status(&self) -> impl Future<Output = ApiResult<SimulationStatus>> + Send;

    /// Oldest to newest, at most `limit` records.
    fn history(&self, limit: usize) -> impl Future<Output = ApiResult<Vec<SimulationHistoryRecord>>> + Send;

    fn start(&self, params: &StartParams) -> impl Future<Output = ApiResult<Ack>> + Send;

    fn stop(&self) -> impl Future<Output = ApiResult<Ack>> + Send;

    /// Clears server-side history.
    fn reset(&self) -> impl Future<Output = ApiResult<Ack>> + Send;

    fn set_speed(&self, speed: f64) -> impl Future<Output = ApiResult<Ack>> + Send;

    fn set_mode(&self, mode: SimulationMode) -> impl Future<Output = ApiResult<Ack>> + Send;
}

impl<T: SimulationApi> SimulationApi for Arc<T> {
    fn status(&self) -> impl Future<Output = ApiResult<SimulationStatus>> + Send {
        (**self).status()
    }

    fn history(&self, limit: usize) -> impl Future<Output = ApiResult<Vec<SimulationHistoryRecord>>> + Send {
        (**self).history(limit)
    }

    fn start(&self, params: &StartParams) -> impl Future<Output = ApiResult<Ack>> + Send {
        (**self).start(params)
    }

    fn stop(&self) -> impl Future<Output = ApiResult<Ack>> + Send {
        (**self).stop()
    }

    fn reset(&self) -> impl Future<Output = ApiResult<Ack>> + Send {
        (**self).reset()
    }

    fn set_speed(&self, speed: f64) -> impl Future<Output = ApiResult<Ack>> + Send {
        (**self).set_speed(speed)
    }

    fn set_mode(&self, mode: SimulationMode) -> impl Future<Output = ApiResult<Ack>> + Send {
        (**self).set_mode(mode)
    }
}

const NO_QUERY: &[(&str, &str)] = &[];

/// FastAPI error body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: Value,
}

/// reqwest-backed implementation
#[derive(Debug, Clone)]
pub struct HttpSimulationApi {
    base_url: String,
    request_timeout: Duration,
    start_timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpSimulationApi {
    pub fn new(config: &ConsoleConfig) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            start_timeout: config.start_timeout(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, timeout: Duration) -> ApiResult<T> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(e, timeout))?;

        if !status.is_success() {
            return Err(server_error(status, &body));
        }

        // Acks may come back with an empty body
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn post_action<Q: serde::Serialize + ?Sized>(&self, path: &str, query: &Q, timeout: Duration) -> ApiResult<Ack> {
        tracing::debug!("POST {}", path);
        let request = self.http_client.post(self.url(path)).query(query);
        self.send(request, timeout).await
    }
}

impl SimulationApi for HttpSimulationApi {
    async fn status(&self) -> ApiResult<SimulationStatus> {
        let request = self.http_client.get(self.url("/simulation/status"));
        self.send(request, self.request_timeout).await
    }

    async fn history(&self, limit: usize) -> ApiResult<Vec<SimulationHistoryRecord>> {
        let request = self
            .http_client
            .get(self.url("/simulation/history"))
            .query(&[("limit", limit)]);
        self.send(request, self.request_timeout).await
    }

    async fn start(&self, params: &StartParams) -> ApiResult<Ack> {
        self.post_action("/simulation/start", params, self.start_timeout).await
    }

    async fn stop(&self) -> ApiResult<Ack> {
        self.post_action("/simulation/stop", NO_QUERY, self.request_timeout).await
    }

    async fn reset(&self) -> ApiResult<Ack> {
        self.post_action("/simulation/reset", NO_QUERY, self.request_timeout).await
    }

    async fn set_speed(&self, speed: f64) -> ApiResult<Ack> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ApiError::InvalidRequest(format!("speed must be a positive number of seconds, got {}", speed)));
        }
        self.post_action("/simulation/set-speed", &[("speed", speed)], self.request_timeout).await
    }

    async fn set_mode(&self, mode: SimulationMode) -> ApiResult<Ack> {
        self.post_action("/simulation/set-mode", &[("mode", mode.as_str())], self.request_timeout).await
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(timeout.as_millis() as u64)
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Prefer the server's `detail`, then the raw body, then the status reason.
fn server_error(status: StatusCode, body: &str) -> ApiError {
    let detail = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { detail: Value::String(text) }) => text,
        Ok(ErrorResponse { detail }) => detail.to_string(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };

    ApiError::Server {
        status: status.as_u16(),
        detail,
    }
}
