//! Keyed query cache and the loading/error reducers.
//!
//! Every request the dashboard makes is identified by a [`QueryKey`].
//! Results are stored in a [`QueryCache`] under the key's stable hash and
//! replaced wholesale when a new result arrives. Because proximity-scoped
//! keys include the center of interest, a late response for an old center
//! lands under the old key and never shows up for the current one.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use outbreak_watch_client::FetchError;
use outbreak_watch_surveillance_models::{
    Alert, ChartData, Coordinates, DashboardStats, SymptomReport, WaterSource,
};
use serde::{Deserialize, Serialize};

/// Retry and freshness policy applied to every query.
///
/// Defaults mirror a typical browser query layer: three retries with
/// exponential backoff capped at 30 seconds, and data that is stale as
/// soon as it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPolicy {
    /// Retries after the first failed attempt.
    pub retry: u32,
    /// Delay before the first retry, doubled for each one after.
    pub retry_base_delay_ms: u64,
    /// Upper bound on any single retry delay.
    pub retry_max_delay_ms: u64,
    /// How long a successful result counts as fresh.
    pub stale_time_ms: u64,
    /// Per-request timeout applied by the HTTP fetcher.
    pub request_timeout_secs: u64,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            retry: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            stale_time_ms: 0,
            request_timeout_secs: 30,
        }
    }
}

impl QueryPolicy {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .retry_base_delay_ms
            .saturating_mul(1_u64 << exponent)
            .min(self.retry_max_delay_ms);
        Duration::from_millis(delay)
    }

    /// How long a result stays fresh.
    #[must_use]
    pub const fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Runs `op`, retrying transient failures according to `policy`.
///
/// `op` is called once per attempt so each attempt builds a fresh request.
/// Permanent failures (see [`FetchError::is_transient`]) are returned
/// immediately.
///
/// # Errors
///
/// Returns the last [`FetchError`] once retries are exhausted.
pub async fn with_retry<T, F, Fut>(policy: &QueryPolicy, label: &str, op: F) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.retry => {
                attempt += 1;
                let delay = policy.retry_delay(attempt);
                log::warn!(
                    "{label}: {e} (retry {attempt}/{} in {delay:?})",
                    policy.retry
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// The queries the dashboard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryName {
    /// Headline counters.
    DashboardStats,
    /// Reports near the center of interest.
    SymptomReports,
    /// Every report, for the map.
    SymptomReportsMap,
    /// Water sources near the center of interest.
    WaterSources,
    /// Every water source, for the map.
    WaterSourcesMap,
    /// Alerts near the center of interest.
    Alerts,
    /// Chart aggregates.
    ChartData,
}

impl QueryName {
    /// Name used as the first element of the query key.
    #[must_use]
    pub const fn key_name(self) -> &'static str {
        match self {
            Self::DashboardStats => "dashboardStats",
            Self::SymptomReports => "symptomReports",
            Self::SymptomReportsMap => "symptomReportsMap",
            Self::WaterSources => "waterSources",
            Self::WaterSourcesMap => "waterSourcesMap",
            Self::Alerts => "alerts",
            Self::ChartData => "chartData",
        }
    }

    /// Whether this query is scoped by the center of interest.
    #[must_use]
    pub const fn is_scoped(self) -> bool {
        matches!(self, Self::SymptomReports | Self::WaterSources | Self::Alerts)
    }
}

/// Identity of one cached result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryKey {
    /// Keyed by name alone.
    Unscoped(QueryName),
    /// Keyed by name, result limit and center of interest.
    Scoped {
        /// Query name.
        name: QueryName,
        /// Result limit.
        limit: u32,
        /// Center the results were requested for.
        center: Option<Coordinates>,
    },
}

impl QueryKey {
    /// Builds the key for `name`, scoping it when the query is scoped.
    #[must_use]
    pub const fn for_query(name: QueryName, limit: u32, center: Option<Coordinates>) -> Self {
        if name.is_scoped() {
            Self::Scoped {
                name,
                limit,
                center,
            }
        } else {
            Self::Unscoped(name)
        }
    }

    /// The query this key belongs to.
    #[must_use]
    pub const fn name(&self) -> QueryName {
        match self {
            Self::Unscoped(name) | Self::Scoped { name, .. } => *name,
        }
    }

    /// Stable string form of the key, used as the cache index.
    ///
    /// The key is rendered as a JSON array, e.g.
    /// `["symptomReports",3,{"lat":27.5,"lon":95.0}]`.
    #[must_use]
    pub fn hash(&self) -> String {
        let value = match self {
            Self::Unscoped(name) => serde_json::json!([name.key_name()]),
            Self::Scoped {
                name,
                limit,
                center,
            } => serde_json::json!([
                name.key_name(),
                limit,
                center.map(|c| serde_json::json!({ "lat": c.lat, "lon": c.lon })),
            ]),
        };
        value.to_string()
    }
}

/// A decoded query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    /// `dashboard-summary`
    Stats(DashboardStats),
    /// `symptom-reports`
    Reports(Vec<SymptomReport>),
    /// `water-sources`
    WaterSources(Vec<WaterSource>),
    /// `alerts`
    Alerts(Vec<Alert>),
    /// `chart-data`
    Chart(ChartData),
}

impl QueryData {
    /// The stats, if this is a stats result.
    #[must_use]
    pub const fn stats(&self) -> Option<DashboardStats> {
        match self {
            Self::Stats(stats) => Some(*stats),
            _ => None,
        }
    }

    /// The reports, if this is a report list.
    #[must_use]
    pub fn reports(&self) -> Option<Vec<SymptomReport>> {
        match self {
            Self::Reports(reports) => Some(reports.clone()),
            _ => None,
        }
    }

    /// The water sources, if this is a water source list.
    #[must_use]
    pub fn water_sources(&self) -> Option<Vec<WaterSource>> {
        match self {
            Self::WaterSources(sources) => Some(sources.clone()),
            _ => None,
        }
    }

    /// The alerts, if this is an alert list.
    #[must_use]
    pub fn alerts(&self) -> Option<Vec<Alert>> {
        match self {
            Self::Alerts(alerts) => Some(alerts.clone()),
            _ => None,
        }
    }

    /// The chart aggregates, if this is a chart result.
    #[must_use]
    pub fn chart(&self) -> Option<ChartData> {
        match self {
            Self::Chart(chart) => Some(chart.clone()),
            _ => None,
        }
    }
}

/// Loading and error flags of one query.
#[derive(Debug, Clone, Default)]
pub struct QueryStatus {
    /// No data yet and a fetch is pending.
    pub is_loading: bool,
    /// Failure of the most recent fetch.
    pub error: Option<FetchError>,
}

/// Result envelope handed to consumers.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Latest successful result.
    pub data: Option<T>,
    /// No data yet and a fetch is pending.
    pub is_loading: bool,
    /// Failure of the most recent fetch.
    pub error: Option<FetchError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> QueryState<T> {
    /// Loading and error flags without the data.
    #[must_use]
    pub fn status(&self) -> QueryStatus {
        QueryStatus {
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }
}

/// Combines per-query statuses into one.
///
/// Loading if any query is loading. The error is the first one found in
/// slice order, so callers pass statuses in their fixed check order.
#[must_use]
pub fn aggregate(statuses: &[QueryStatus]) -> QueryStatus {
    QueryStatus {
        is_loading: statuses.iter().any(|s| s.is_loading),
        error: statuses.iter().find_map(|s| s.error.clone()),
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    data: Option<QueryData>,
    error: Option<FetchError>,
    fetching: bool,
    settled_at: Option<Instant>,
}

/// Results indexed by [`QueryKey::hash`].
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl QueryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as fetching if it needs a fetch.
    ///
    /// Returns `false` (and changes nothing) when a fetch for `key` is
    /// already in flight, or when its last result was successful and is
    /// younger than `stale_time`.
    pub fn begin_fetch(&mut self, key: &QueryKey, now: Instant, stale_time: Duration) -> bool {
        let entry = self.entries.entry(key.hash()).or_default();

        if entry.fetching {
            return false;
        }

        let fresh = entry.error.is_none()
            && entry.data.is_some()
            && entry
                .settled_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_time);
        if fresh {
            return false;
        }

        entry.fetching = true;
        true
    }

    /// Stores the outcome of a fetch for `key`.
    ///
    /// Success replaces the data and clears any error. Failure records the
    /// error and keeps the previous data.
    pub fn settle(&mut self, key: &QueryKey, result: Result<QueryData, FetchError>, now: Instant) {
        let entry = self.entries.entry(key.hash()).or_default();
        entry.fetching = false;
        entry.settled_at = Some(now);

        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
            }
            Err(e) => entry.error = Some(e),
        }
    }

    /// Builds the consumer-facing state for `key`.
    ///
    /// Disabled queries never load and carry nothing. An enabled query is
    /// loading while it has no data and is either fetching or has never
    /// been fetched.
    pub fn state<T>(
        &self,
        key: &QueryKey,
        enabled: bool,
        extract: impl FnOnce(&QueryData) -> Option<T>,
    ) -> QueryState<T> {
        if !enabled {
            return QueryState::default();
        }

        let Some(entry) = self.entries.get(&key.hash()) else {
            return QueryState {
                data: None,
                is_loading: true,
                error: None,
            };
        };

        let data = entry.data.as_ref().and_then(extract);
        QueryState {
            is_loading: data.is_none() && (entry.fetching || entry.settled_at.is_none()),
            error: entry.error.clone(),
            data,
        }
    }

    /// Whether a fetch for `key` is in flight.
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries.get(&key.hash()).is_some_and(|e| e.fetching)
    }

    /// Number of keys with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn status_error() -> FetchError {
        FetchError::Status {
            url: "http://localhost/api/alerts".to_string(),
            status: 500,
            reason: "Internal Server Error".to_string(),
        }
    }

    fn reports_key(center: Coordinates) -> QueryKey {
        QueryKey::for_query(QueryName::SymptomReports, 3, Some(center))
    }

    #[test]
    fn key_hash_includes_limit_and_center() {
        let key = reports_key(Coordinates::new(27.5, 95.0));
        assert_eq!(key.hash(), r#"["symptomReports",3,{"lat":27.5,"lon":95.0}]"#);

        let unscoped = QueryKey::for_query(QueryName::SymptomReportsMap, 3, None);
        assert_eq!(unscoped.hash(), r#"["symptomReportsMap"]"#);
    }

    #[test]
    fn different_centers_are_different_keys() {
        let a = reports_key(Coordinates::new(27.5, 95.0));
        let b = reports_key(Coordinates::new(27.4842, 94.9123));
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn aggregate_is_or_of_loading_and_first_error() {
        let idle = QueryStatus::default();
        let loading = QueryStatus {
            is_loading: true,
            error: None,
        };
        let failed = QueryStatus {
            is_loading: false,
            error: Some(status_error()),
        };
        let other_failure = QueryStatus {
            is_loading: false,
            error: Some(FetchError::Transport {
                url: "http://localhost/api/chart-data".to_string(),
                message: "refused".to_string(),
            }),
        };

        let all_idle = aggregate(&[idle.clone(), idle.clone()]);
        assert!(!all_idle.is_loading);
        assert!(all_idle.error.is_none());

        assert!(aggregate(&[idle.clone(), loading]).is_loading);

        let combined = aggregate(&[idle, failed, other_failure]);
        assert!(matches!(
            combined.error,
            Some(FetchError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn never_fetched_query_is_loading() {
        let cache = QueryCache::new();
        let key = QueryKey::Unscoped(QueryName::DashboardStats);
        assert!(cache.state(&key, true, QueryData::stats).is_loading);
    }

    #[test]
    fn disabled_query_is_idle() {
        let cache = QueryCache::new();
        let key = QueryKey::for_query(QueryName::Alerts, 3, None);
        let state = cache.state(&key, false, |_| Some(()));
        assert!(!state.is_loading);
        assert!(state.data.is_none() && state.error.is_none());
    }

    #[test]
    fn settle_replaces_data_and_keeps_it_on_error() {
        let mut cache = QueryCache::new();
        let key = QueryKey::Unscoped(QueryName::DashboardStats);
        let now = Instant::now();

        assert!(cache.begin_fetch(&key, now, Duration::ZERO));
        assert!(cache.is_fetching(&key));
        assert!(cache.state(&key, true, QueryData::stats).is_loading);

        let stats = DashboardStats {
            total_reports_today: 10,
            ..DashboardStats::default()
        };
        cache.settle(&key, Ok(QueryData::Stats(stats)), now);
        let state = cache.state(&key, true, QueryData::stats);
        assert_eq!(state.data, Some(stats));
        assert!(!state.is_loading);

        assert!(cache.begin_fetch(&key, now, Duration::ZERO));
        cache.settle(&key, Err(status_error()), now);
        let state = cache.state(&key, true, QueryData::stats);
        assert_eq!(state.data, Some(stats));
        assert!(state.error.is_some());
    }

    #[test]
    fn in_flight_fetch_is_not_duplicated() {
        let mut cache = QueryCache::new();
        let key = QueryKey::Unscoped(QueryName::ChartData);
        let now = Instant::now();
        assert!(cache.begin_fetch(&key, now, Duration::ZERO));
        assert!(!cache.begin_fetch(&key, now, Duration::ZERO));
    }

    #[test]
    fn fresh_results_are_not_refetched() {
        let mut cache = QueryCache::new();
        let key = QueryKey::Unscoped(QueryName::ChartData);
        let now = Instant::now();
        let stale_time = Duration::from_secs(60);

        assert!(cache.begin_fetch(&key, now, stale_time));
        cache.settle(&key, Ok(QueryData::Chart(ChartData::default())), now);

        assert!(!cache.begin_fetch(&key, now + Duration::from_secs(10), stale_time));
        assert!(cache.begin_fetch(&key, now + Duration::from_secs(61), stale_time));
    }

    #[test]
    fn failed_results_are_always_refetched() {
        let mut cache = QueryCache::new();
        let key = QueryKey::Unscoped(QueryName::ChartData);
        let now = Instant::now();

        assert!(cache.begin_fetch(&key, now, Duration::from_secs(60)));
        cache.settle(&key, Err(status_error()), now);
        assert!(cache.begin_fetch(&key, now, Duration::from_secs(60)));
    }

    #[test]
    fn retry_delay_doubles_up_to_the_cap() {
        let policy = QueryPolicy::default();
        assert_eq!(policy.retry_delay(1), Duration::from_secs(1));
        assert_eq!(policy.retry_delay(2), Duration::from_secs(2));
        assert_eq!(policy.retry_delay(3), Duration::from_secs(4));
        assert_eq!(policy.retry_delay(10), Duration::from_secs(30));
    }

    fn instant_policy(retry: u32) -> QueryPolicy {
        QueryPolicy {
            retry,
            retry_base_delay_ms: 0,
            ..QueryPolicy::default()
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let attempts = &AtomicU32::new(0);
        let result = with_retry(&instant_policy(3), "test", move || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(status_error())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let attempts = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&instant_policy(2), "test", move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(status_error())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let attempts = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&instant_policy(3), "test", move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status {
                url: String::new(),
                status: 404,
                reason: "Not Found".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
