#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client for the district health surveillance API.
//!
//! All network access goes through the [`Fetcher`] trait so the dashboard
//! can run against the real API ([`http::HttpFetcher`]) or an in-memory
//! stand-in. [`ApiClient`] layers URL construction, JSON decoding and date
//! normalization on top of a fetcher.
//!
//! Endpoints (relative to the base URL, e.g. `http://127.0.0.1:5000/api`):
//!
//! - `GET /dashboard-summary`
//! - `GET /symptom-reports[?latitude&longitude&radius_km&limit]`
//! - `GET /water-sources[?...]`
//! - `GET /alerts[?...]`
//! - `GET /chart-data`
//! - `POST /send-alert`

pub mod alert;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use outbreak_watch_surveillance_models::{
    Alert, ChartData, Coordinates, DashboardStats, SymptomReport, TransformDates, WaterSource,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use alert::SendAlertError;

/// Errors from fetching a resource. Every failure of a single request maps
/// to exactly one of these.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request never produced a response (connection refused, DNS,
    /// timeout).
    #[error("Failed to fetch {url}: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("Failed to fetch {url}: HTTP {status} {reason}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
    },

    /// The body was not valid JSON or did not match the expected shape.
    #[error("Invalid JSON from {url}: {message}")]
    Json {
        /// Requested URL.
        url: String,
        /// Parse error.
        message: String,
    },

    /// The configured base URL could not be turned into a request URL.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parse error.
        message: String,
    },
}

impl FetchError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Transport failures, rate limiting, server errors and truncated or
    /// garbled bodies are transient. Other 4xx statuses and bad URLs are
    /// not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Json { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl { .. } => false,
        }
    }
}

/// Raw reply to a `POST`, returned whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl RawResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The `fetch(url) -> JSON` capability the dashboard depends on.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issues a `GET` and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, non-success status, or
    /// a body that is not JSON.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, FetchError>;

    /// Issues a `POST` with a JSON body and returns the raw reply.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if no response was received.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, FetchError>;
}

/// A REST resource exposed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// `GET /dashboard-summary`
    DashboardSummary,
    /// `GET /symptom-reports`
    SymptomReports,
    /// `GET /water-sources`
    WaterSources,
    /// `GET /alerts`
    Alerts,
    /// `GET /chart-data`
    ChartData,
    /// `POST /send-alert`
    SendAlert,
}

impl Resource {
    /// Path relative to the API base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::DashboardSummary => "dashboard-summary",
            Self::SymptomReports => "symptom-reports",
            Self::WaterSources => "water-sources",
            Self::Alerts => "alerts",
            Self::ChartData => "chart-data",
            Self::SendAlert => "send-alert",
        }
    }
}

/// Proximity scoping for the report, water source and alert endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityParams {
    /// Center of the search circle.
    pub center: Coordinates,
    /// Search radius in kilometres.
    pub radius_km: u32,
    /// Maximum number of results.
    pub limit: u32,
}

impl ProximityParams {
    /// Query parameters in the order the API documents them.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", format_coordinate(self.center.lat)),
            ("longitude", format_coordinate(self.center.lon)),
            ("radius_km", self.radius_km.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Formats a coordinate so whole degrees keep their decimal point
/// (`95.0`, not `95`).
fn format_coordinate(value: f64) -> String {
    format!("{value:?}")
}

/// Builds absolute URLs for API resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base_url: String,
}

impl ApiEndpoints {
    /// Creates endpoints rooted at `base_url` (trailing slash optional).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `resource`, optionally proximity scoped.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if the base URL is not a valid
    /// absolute URL.
    pub fn url(
        &self,
        resource: Resource,
        params: Option<&ProximityParams>,
    ) -> Result<String, FetchError> {
        let raw = format!("{}/{}", self.base_url, resource.path());

        let parsed = match params {
            Some(params) => reqwest::Url::parse_with_params(&raw, params.query_pairs()),
            None => reqwest::Url::parse(&raw),
        };

        parsed
            .map(String::from)
            .map_err(|e| FetchError::InvalidUrl {
                url: raw,
                message: e.to_string(),
            })
    }
}

/// Typed access to the surveillance API.
#[derive(Clone)]
pub struct ApiClient {
    fetcher: Arc<dyn Fetcher>,
    endpoints: ApiEndpoints,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client that sends every request through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, endpoints: ApiEndpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// The endpoints this client talks to.
    #[must_use]
    pub const fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Fetches `resource` and decodes it as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the request fails or the body does not
    /// decode as `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: Resource,
        params: Option<&ProximityParams>,
    ) -> Result<T, FetchError> {
        let url = self.endpoints.url(resource, params)?;
        log::debug!("GET {url}");

        let value = self.fetcher.get_json(&url).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Json {
            url,
            message: e.to_string(),
        })
    }

    /// `GET /dashboard-summary`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn dashboard_summary(&self) -> Result<DashboardStats, FetchError> {
        self.get(Resource::DashboardSummary, None).await
    }

    /// `GET /symptom-reports`, dates normalized.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn symptom_reports(
        &self,
        params: Option<&ProximityParams>,
    ) -> Result<Vec<SymptomReport>, FetchError> {
        self.get::<Vec<SymptomReport>>(Resource::SymptomReports, params)
            .await
            .map(TransformDates::transform_dates)
    }

    /// `GET /water-sources`, dates normalized.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn water_sources(
        &self,
        params: Option<&ProximityParams>,
    ) -> Result<Vec<WaterSource>, FetchError> {
        self.get::<Vec<WaterSource>>(Resource::WaterSources, params)
            .await
            .map(TransformDates::transform_dates)
    }

    /// `GET /alerts`, dates normalized.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn alerts(&self, params: Option<&ProximityParams>) -> Result<Vec<Alert>, FetchError> {
        self.get::<Vec<Alert>>(Resource::Alerts, params)
            .await
            .map(TransformDates::transform_dates)
    }

    /// `GET /chart-data`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn chart_data(&self) -> Result<ChartData, FetchError> {
        self.get(Resource::ChartData, None).await
    }

    /// `POST /send-alert`. See [`alert::send_alert`].
    ///
    /// # Errors
    ///
    /// See [`SendAlertError`].
    pub async fn send_alert(&self, message: &str) -> Result<String, SendAlertError> {
        alert::send_alert(self.fetcher.as_ref(), &self.endpoints, message).await
    }
}
