#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dashboard data coordinator.
//!
//! [`DashboardCoordinator`] owns the seven queries behind the dashboard:
//!
//! | Query                | Scope                         |
//! |----------------------|-------------------------------|
//! | `dashboardStats`     | global                        |
//! | `symptomReports`     | near the center of interest   |
//! | `waterSources`       | near the center of interest   |
//! | `alerts`             | near the center of interest   |
//! | `chartData`          | global                        |
//! | `symptomReportsMap`  | everything, for the map       |
//! | `waterSourcesMap`    | everything, for the map       |
//!
//! The nearby queries are keyed by the center of interest and disabled
//! while it is cleared. [`DashboardCoordinator::snapshot`] folds the seven
//! results into one [`DashboardData`] with a combined loading flag and the
//! first error in the order above.

pub mod center;
pub mod config;
pub mod query;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use outbreak_watch_client::http::HttpFetcher;
use outbreak_watch_client::{
    ApiClient, ApiEndpoints, FetchError, ProximityParams, SendAlertError,
};
use outbreak_watch_surveillance_models::{
    Alert, ChartData, Coordinates, DashboardStats, SymptomReport, WaterSource,
};

pub use center::CenterOfInterest;
pub use config::{ConfigError, DashboardConfig};
pub use query::{QueryPolicy, QueryState};

use config::ProximityConfig;
use query::{QueryCache, QueryData, QueryKey, QueryName, aggregate, with_retry};

/// Order in which query errors are checked when combining them.
const CHECK_ORDER: [QueryName; 7] = [
    QueryName::DashboardStats,
    QueryName::SymptomReports,
    QueryName::WaterSources,
    QueryName::Alerts,
    QueryName::ChartData,
    QueryName::SymptomReportsMap,
    QueryName::WaterSourcesMap,
];

const SCOPED: [QueryName; 3] = [
    QueryName::SymptomReports,
    QueryName::WaterSources,
    QueryName::Alerts,
];

/// Everything the dashboard renders, as of one moment.
#[derive(Debug, Clone)]
pub struct DashboardData {
    /// Center the nearby queries are scoped to.
    pub center: Option<Coordinates>,
    /// Headline counters.
    pub dashboard_stats: QueryState<DashboardStats>,
    /// Reports near the center.
    pub symptom_reports: QueryState<Vec<SymptomReport>>,
    /// Every report, for the map.
    pub symptom_reports_map: QueryState<Vec<SymptomReport>>,
    /// Water sources near the center.
    pub water_sources: QueryState<Vec<WaterSource>>,
    /// Every water source, for the map.
    pub water_sources_map: QueryState<Vec<WaterSource>>,
    /// Alerts near the center.
    pub alerts: QueryState<Vec<Alert>>,
    /// Chart aggregates.
    pub chart_data: QueryState<ChartData>,
    /// Whether any query is still waiting for its first result.
    pub is_loading: bool,
    /// First query error, in check order.
    pub error: Option<FetchError>,
}

#[derive(Debug, Clone, Copy)]
struct PlannedQuery {
    key: QueryKey,
    params: Option<ProximityParams>,
    enabled: bool,
}

/// Runs the dashboard queries and tracks the center of interest.
#[derive(Debug)]
pub struct DashboardCoordinator {
    client: ApiClient,
    policy: QueryPolicy,
    proximity: ProximityConfig,
    center: CenterOfInterest,
    cache: Mutex<QueryCache>,
}

impl DashboardCoordinator {
    /// Creates a coordinator that fetches through `client`, starting at the
    /// configured default center.
    #[must_use]
    pub fn new(client: ApiClient, config: &DashboardConfig) -> Self {
        Self {
            client,
            policy: config.query,
            proximity: config.proximity,
            center: CenterOfInterest::new(Some(config.default_center.coordinates())),
            cache: Mutex::new(QueryCache::new()),
        }
    }

    /// Creates a coordinator that talks HTTP to `config.api_base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config.query.request_timeout())?;
        let client = ApiClient::new(
            Arc::new(fetcher),
            ApiEndpoints::new(config.api_base_url.clone()),
        );
        Ok(Self::new(client, config))
    }

    /// The API client.
    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Shared handle to the center of interest.
    #[must_use]
    pub const fn center(&self) -> &CenterOfInterest {
        &self.center
    }

    /// Moves the center of interest. The nearby queries switch to the new
    /// key immediately; call [`Self::refetch_scoped`] or run
    /// [`Self::follow_center`] to fetch it.
    pub fn set_center_of_interest(&self, lat: f64, lon: f64) {
        self.center.set(lat, lon);
    }

    /// Clears the center of interest, disabling the nearby queries.
    pub fn clear_center_of_interest(&self) {
        self.center.clear();
    }

    fn cache(&self) -> MutexGuard<'_, QueryCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn plan(&self, name: QueryName, center: Option<Coordinates>) -> PlannedQuery {
        let key = QueryKey::for_query(name, self.proximity.limit, center);

        if !name.is_scoped() {
            return PlannedQuery {
                key,
                params: None,
                enabled: true,
            };
        }

        PlannedQuery {
            key,
            params: center.map(|center| ProximityParams {
                center,
                radius_km: self.proximity.radius_km,
                limit: self.proximity.limit,
            }),
            enabled: center.is_some(),
        }
    }

    async fn fetch(
        &self,
        name: QueryName,
        params: Option<&ProximityParams>,
    ) -> Result<QueryData, FetchError> {
        match name {
            QueryName::DashboardStats => self.client.dashboard_summary().await.map(QueryData::Stats),
            QueryName::SymptomReports | QueryName::SymptomReportsMap => self
                .client
                .symptom_reports(params)
                .await
                .map(QueryData::Reports),
            QueryName::WaterSources | QueryName::WaterSourcesMap => self
                .client
                .water_sources(params)
                .await
                .map(QueryData::WaterSources),
            QueryName::Alerts => self.client.alerts(params).await.map(QueryData::Alerts),
            QueryName::ChartData => self.client.chart_data().await.map(QueryData::Chart),
        }
    }

    async fn run(&self, query: PlannedQuery) {
        if !query.enabled {
            return;
        }

        let hash = query.key.hash();
        if !self
            .cache()
            .begin_fetch(&query.key, Instant::now(), self.policy.stale_time())
        {
            log::debug!("Skipping {hash}: fresh or already in flight");
            return;
        }

        log::debug!("Fetching {hash}");
        let name = query.key.name();
        let result = with_retry(&self.policy, name.key_name(), || {
            self.fetch(name, query.params.as_ref())
        })
        .await;

        match &result {
            Ok(_) => log::debug!("Settled {hash}"),
            Err(e) => log::warn!("Query {hash} failed: {e}"),
        }

        self.cache().settle(&query.key, result, Instant::now());
    }

    async fn run_all(&self, names: &[QueryName]) {
        let center = self.center.get();
        futures::future::join_all(names.iter().map(|&name| self.run(self.plan(name, center))))
            .await;
    }

    /// Fetches every enabled query concurrently, as on first mount or a
    /// manual refresh. Queries already in flight or still fresh are
    /// skipped.
    pub async fn mount(&self) {
        self.run_all(&CHECK_ORDER).await;
    }

    /// Fetches the nearby queries for the current center.
    pub async fn refetch_scoped(&self) {
        self.run_all(&SCOPED).await;
    }

    /// Spawns a task that refetches the nearby queries every time the
    /// center of interest is written. Abort the returned handle to stop it.
    #[must_use]
    pub fn follow_center(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let mut rx = self.center.subscribe();

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                coordinator.refetch_scoped().await;
            }
        })
    }

    /// Current state of every query, combined.
    #[must_use]
    pub fn snapshot(&self) -> DashboardData {
        let center = self.center.get();
        let cache = self.cache();
        let state = |name| {
            let query = self.plan(name, center);
            (query.key, query.enabled)
        };

        let (key, enabled) = state(QueryName::DashboardStats);
        let dashboard_stats = cache.state(&key, enabled, QueryData::stats);
        let (key, enabled) = state(QueryName::SymptomReports);
        let symptom_reports = cache.state(&key, enabled, QueryData::reports);
        let (key, enabled) = state(QueryName::WaterSources);
        let water_sources = cache.state(&key, enabled, QueryData::water_sources);
        let (key, enabled) = state(QueryName::Alerts);
        let alerts = cache.state(&key, enabled, QueryData::alerts);
        let (key, enabled) = state(QueryName::ChartData);
        let chart_data = cache.state(&key, enabled, QueryData::chart);
        let (key, enabled) = state(QueryName::SymptomReportsMap);
        let symptom_reports_map = cache.state(&key, enabled, QueryData::reports);
        let (key, enabled) = state(QueryName::WaterSourcesMap);
        let water_sources_map = cache.state(&key, enabled, QueryData::water_sources);

        let combined = aggregate(&[
            dashboard_stats.status(),
            symptom_reports.status(),
            water_sources.status(),
            alerts.status(),
            chart_data.status(),
            symptom_reports_map.status(),
            water_sources_map.status(),
        ]);

        DashboardData {
            center,
            dashboard_stats,
            symptom_reports,
            symptom_reports_map,
            water_sources,
            water_sources_map,
            alerts,
            chart_data,
            is_loading: combined.is_loading,
            error: combined.error,
        }
    }

    /// Broadcasts a public alert. See [`ApiClient::send_alert`].
    ///
    /// # Errors
    ///
    /// See [`SendAlertError`].
    pub async fn send_alert(&self, message: &str) -> Result<String, SendAlertError> {
        self.client.send_alert(message).await
    }
}

#[cfg(test)]
mod tests {
    use outbreak_watch_client::mock::{MockFetcher, MockReply};
    use serde_json::json;

    use super::*;

    const BASE: &str = "http://127.0.0.1:5000/api";

    fn url(path: &str) -> String {
        format!("{BASE}/{path}")
    }

    fn scoped_url(path: &str, lat: &str, lon: &str) -> String {
        format!("{BASE}/{path}?latitude={lat}&longitude={lon}&radius_km=50&limit=3")
    }

    fn report(id: &str, village: &str) -> serde_json::Value {
        json!({
            "id": id,
            "village": village,
            "coordinates": [27.48, 94.91],
            "symptoms": ["Diarrhea", "Fever"],
            "severity": "moderate",
            "reportedAt": "2025-07-01T08:30:00"
        })
    }

    fn fixture() -> Arc<MockFetcher> {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(
            &url("dashboard-summary"),
            MockReply::Json(json!({
                "totalReportsToday": 12,
                "activeAlerts": 2,
                "highRiskVillages": 1,
                "newReports24h": 5
            })),
        );
        fetcher.respond(
            &url("symptom-reports"),
            MockReply::Json(json!([report("r-1", "Lahowal"), report("r-2", "Khowang")])),
        );
        fetcher.respond(
            &url("water-sources"),
            MockReply::Json(json!([{
                "id": "w-1",
                "name": "Lahowal Well",
                "type": "well",
                "coordinates": [27.49, 94.92],
                "status": "contaminated",
                "lastTested": "2025-06-30",
                "reports": ["r-1"]
            }])),
        );
        fetcher.respond(
            &url("alerts"),
            MockReply::Json(json!([{
                "id": "a-1",
                "village": "Lahowal",
                "level": "high",
                "trigger": "Diarrhea cluster",
                "description": "Eight cases in two days",
                "timestamp": "2025-07-01T09:00:00",
                "status": "active",
                "reportCount": 8
            }])),
        );
        fetcher.respond(
            &url("chart-data"),
            MockReply::Json(json!({
                "symptoms": [{"name": "Diarrhea", "count": 8}],
                "timeline": [{"date": "2025-06", "reports": 40, "rainfall": 310.5}]
            })),
        );
        fetcher
    }

    fn test_config() -> DashboardConfig {
        DashboardConfig {
            query: QueryPolicy {
                retry: 0,
                ..QueryPolicy::default()
            },
            ..DashboardConfig::default()
        }
    }

    fn coordinator(fetcher: &Arc<MockFetcher>, config: &DashboardConfig) -> DashboardCoordinator {
        let client = ApiClient::new(fetcher.clone(), ApiEndpoints::new(BASE));
        DashboardCoordinator::new(client, config)
    }

    #[test]
    fn loading_before_first_fetch() {
        let fetcher = fixture();
        let data = coordinator(&fetcher, &test_config()).snapshot();
        assert!(data.is_loading);
        assert!(data.error.is_none());
        assert!(data.dashboard_stats.data.is_none());
    }

    #[tokio::test]
    async fn mount_fetches_all_seven_queries() {
        let fetcher = fixture();
        let coordinator = coordinator(&fetcher, &test_config());
        coordinator.mount().await;

        assert_eq!(fetcher.requests().len(), 7);
        assert_eq!(fetcher.request_count(&url("symptom-reports")), 1);
        assert_eq!(
            fetcher.request_count(&scoped_url("symptom-reports", "27.4842", "94.9123")),
            1
        );

        let data = coordinator.snapshot();
        assert!(!data.is_loading);
        assert!(data.error.is_none());
        assert_eq!(data.dashboard_stats.data.unwrap().total_reports_today, 12);
        assert_eq!(data.symptom_reports.data.unwrap().len(), 2);
        assert_eq!(data.symptom_reports_map.data.unwrap().len(), 2);
        assert_eq!(data.alerts.data.unwrap()[0].report_count, 8);
        assert_eq!(data.chart_data.data.unwrap().timeline[0].reports, 40);

        let sources = data.water_sources_map.data.unwrap();
        assert!(sources[0].last_tested.as_ref().unwrap().is_parsed());
    }

    #[tokio::test]
    async fn scoped_queries_use_the_center_of_interest() {
        let fetcher = fixture();
        let coordinator = coordinator(&fetcher, &test_config());
        coordinator.set_center_of_interest(27.5, 95.0);
        coordinator.refetch_scoped().await;

        for path in ["symptom-reports", "water-sources", "alerts"] {
            assert_eq!(
                fetcher.request_count(&scoped_url(path, "27.5", "95.0")),
                1,
                "{path}"
            );
        }
        assert_eq!(fetcher.requests().len(), 3);
    }

    #[tokio::test]
    async fn moving_the_center_leaves_unscoped_queries_alone() {
        let fetcher = fixture();
        let config = DashboardConfig {
            query: QueryPolicy {
                stale_time_ms: 60_000,
                ..test_config().query
            },
            ..test_config()
        };
        let coordinator = coordinator(&fetcher, &config);
        coordinator.mount().await;
        assert_eq!(fetcher.requests().len(), 7);

        coordinator.set_center_of_interest(27.5, 95.0);
        coordinator.mount().await;

        for path in ["symptom-reports", "water-sources", "alerts"] {
            assert_eq!(
                fetcher.request_count(&scoped_url(path, "27.5", "95.0")),
                1,
                "{path}"
            );
        }
        for path in [
            "dashboard-summary",
            "chart-data",
            "symptom-reports",
            "water-sources",
        ] {
            assert_eq!(fetcher.request_count(&url(path)), 1, "{path}");
        }
        let map_requests: Vec<String> = fetcher
            .requests()
            .into_iter()
            .filter(|r| r.contains('?') && !r.contains("latitude="))
            .collect();
        assert!(map_requests.is_empty(), "{map_requests:?}");
        assert_eq!(fetcher.requests().len(), 10);
    }

    #[tokio::test]
    async fn cleared_center_disables_scoped_queries() {
        let fetcher = fixture();
        let coordinator = coordinator(&fetcher, &test_config());
        coordinator.clear_center_of_interest();
        coordinator.mount().await;

        assert_eq!(fetcher.requests().len(), 4);

        let data = coordinator.snapshot();
        assert!(!data.is_loading);
        assert!(data.symptom_reports.data.is_none());
        assert!(!data.symptom_reports.is_loading);
        assert!(data.symptom_reports_map.data.is_some());
    }

    #[tokio::test]
    async fn first_error_in_check_order_wins() {
        let fetcher = fixture();
        fetcher.respond(&url("chart-data"), MockReply::Status(500));
        fetcher.respond(&url("alerts"), MockReply::Status(503));
        let coordinator = coordinator(&fetcher, &test_config());
        coordinator.mount().await;

        let data = coordinator.snapshot();
        assert!(!data.is_loading);
        assert!(matches!(
            data.error,
            Some(FetchError::Status { status: 503, .. })
        ));
        assert!(data.dashboard_stats.data.is_some());
    }

    #[tokio::test]
    async fn transient_failures_are_retried_before_settling() {
        let fetcher = fixture();
        fetcher.respond_sequence(
            &url("dashboard-summary"),
            vec![
                MockReply::Status(502),
                MockReply::Json(json!({"totalReportsToday": 3})),
            ],
        );
        let config = DashboardConfig {
            query: QueryPolicy {
                retry: 3,
                retry_base_delay_ms: 0,
                ..QueryPolicy::default()
            },
            ..DashboardConfig::default()
        };
        let coordinator = coordinator(&fetcher, &config);
        coordinator.mount().await;

        assert_eq!(fetcher.request_count(&url("dashboard-summary")), 2);
        let data = coordinator.snapshot();
        assert!(data.error.is_none());
        assert_eq!(data.dashboard_stats.data.unwrap().total_reports_today, 3);
    }

    #[tokio::test]
    async fn late_response_for_old_center_is_not_shown() {
        let fetcher = fixture();
        let old = scoped_url("symptom-reports", "27.4842", "94.9123");
        let new = scoped_url("symptom-reports", "26.1", "91.7");
        fetcher.respond(&old, MockReply::Json(json!([report("old", "Lahowal")])));
        fetcher.respond(&new, MockReply::Json(json!([report("new", "Khowang")])));
        fetcher.hold(&old);

        let coordinator = Arc::new(coordinator(&fetcher, &test_config()));
        let slow = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.refetch_scoped().await }
        });
        fetcher.wait_for_requests(3).await;

        coordinator.set_center_of_interest(26.1, 91.7);
        coordinator.refetch_scoped().await;

        let ids = |data: &DashboardData| {
            data.symptom_reports
                .data
                .as_ref()
                .map(|reports| reports.iter().map(|r| r.id.clone()).collect::<Vec<_>>())
        };
        assert_eq!(ids(&coordinator.snapshot()), Some(vec!["new".to_string()]));

        fetcher.release(&old);
        slow.await.unwrap();
        assert_eq!(ids(&coordinator.snapshot()), Some(vec!["new".to_string()]));

        coordinator.set_center_of_interest(27.4842, 94.9123);
        assert_eq!(ids(&coordinator.snapshot()), Some(vec!["old".to_string()]));
    }

    #[tokio::test]
    async fn follow_center_refetches_on_every_write() {
        let fetcher = fixture();
        let coordinator = Arc::new(coordinator(&fetcher, &test_config()));
        let follower = coordinator.follow_center();

        coordinator.set_center_of_interest(26.1, 91.7);
        fetcher.wait_for_requests(3).await;

        let reports = scoped_url("symptom-reports", "26.1", "91.7");
        assert_eq!(fetcher.request_count(&reports), 1);

        follower.abort();
    }

    #[tokio::test]
    async fn cluster_click_moves_the_center() {
        use outbreak_watch_cluster::map::ClusterMap;

        let fetcher = fixture();
        let coordinator = coordinator(&fetcher, &test_config());
        coordinator.mount().await;

        let data = coordinator.snapshot();
        let mut map = ClusterMap::new(Some(coordinator.center().click_callback()));
        map.update(
            data.symptom_reports_map.data.as_deref().unwrap_or_default(),
            data.water_sources_map.data.as_deref().unwrap_or_default(),
        );

        assert!(map.select("Khowang").is_some());
        assert_eq!(
            coordinator.center().get(),
            Some(Coordinates::new(27.48, 94.91))
        );
    }

    #[tokio::test]
    async fn send_alert_goes_through_the_client() {
        let fetcher = fixture();
        fetcher.respond(
            &url("send-alert"),
            MockReply::Json(json!({"success": true, "message": "Sent"})),
        );
        let coordinator = coordinator(&fetcher, &test_config());
        assert_eq!(coordinator.send_alert("Boil water").await.unwrap(), "Sent");
    }
}
