//! Map view state: the current clusters, water markers and selection.
//!
//! [`ClusterMap::update`] rebuilds everything from the latest report and
//! water-source lists. [`ClusterMap::select`] records the selected
//! cluster's detail and then hands its centroid to the click callback,
//! which is how the map steers the dashboard's center of interest.

use std::sync::Arc;

use outbreak_watch_surveillance_models::{Coordinates, SymptomReport, WaterSource};

use crate::overlay::{WaterMarker, water_markers};
use crate::{ClusterSummary, VillageCluster, cluster_reports};

/// Invoked with a cluster's centroid when the cluster is selected.
pub type ClusterClickCallback = Arc<dyn Fn(Coordinates) + Send + Sync>;

/// Clusters and overlays for one map view.
#[derive(Default)]
pub struct ClusterMap {
    clusters: Vec<VillageCluster>,
    water_markers: Vec<WaterMarker>,
    selected: Option<ClusterSummary>,
    on_cluster_click: Option<ClusterClickCallback>,
}

impl std::fmt::Debug for ClusterMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterMap")
            .field("clusters", &self.clusters.len())
            .field("water_markers", &self.water_markers.len())
            .field("selected", &self.selected)
            .field("on_cluster_click", &self.on_cluster_click.is_some())
            .finish()
    }
}

impl ClusterMap {
    /// Creates an empty map. `on_cluster_click` receives the centroid of
    /// every selected cluster.
    #[must_use]
    pub fn new(on_cluster_click: Option<ClusterClickCallback>) -> Self {
        Self {
            on_cluster_click,
            ..Self::default()
        }
    }

    /// Recomputes clusters and water markers from scratch.
    ///
    /// The current selection is kept; it describes the cluster as it was
    /// when it was clicked.
    pub fn update(&mut self, reports: &[SymptomReport], water_sources: &[WaterSource]) {
        self.clusters = cluster_reports(reports);
        self.water_markers = water_markers(water_sources);
    }

    /// Current village clusters.
    #[must_use]
    pub fn clusters(&self) -> &[VillageCluster] {
        &self.clusters
    }

    /// Current water-source markers.
    #[must_use]
    pub fn water_markers(&self) -> &[WaterMarker] {
        &self.water_markers
    }

    /// Detail of the most recently selected cluster.
    #[must_use]
    pub const fn selected(&self) -> Option<&ClusterSummary> {
        self.selected.as_ref()
    }

    /// Finds the cluster for `village` (exact match).
    #[must_use]
    pub fn cluster(&self, village: &str) -> Option<&VillageCluster> {
        self.clusters.iter().find(|c| c.village == village)
    }

    /// Selects the cluster for `village`.
    ///
    /// First stores the cluster's summary as the selection, then invokes
    /// the click callback with the centroid. Returns `None` and changes
    /// nothing if no cluster has that village name.
    pub fn select(&mut self, village: &str) -> Option<&ClusterSummary> {
        let summary = self.cluster(village)?.summary();
        let centroid = summary.coordinates;

        log::debug!(
            "Cluster selected: {} ({} reports) at {:.4}, {:.4}",
            summary.village,
            summary.count,
            centroid.lat,
            centroid.lon
        );

        self.selected = Some(summary);
        if let Some(callback) = &self.on_cluster_click {
            callback(centroid);
        }

        self.selected.as_ref()
    }

    /// Clears the current selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::test_support::report;

    #[test]
    fn select_records_detail_then_reports_centroid() {
        let seen: Arc<Mutex<Vec<Coordinates>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut map = ClusterMap::new(Some(Arc::new(move |c| {
            sink.lock().unwrap().push(c);
        })));

        map.update(
            &[
                report("1", "Duliajan", 27.0, 95.0, &["Fever"]),
                report("2", "Duliajan", 28.0, 96.0, &["Fever"]),
            ],
            &[],
        );

        let selected = map.select("Duliajan").cloned().unwrap();
        assert_eq!(selected.count, 2);
        assert_eq!(selected.coordinates, Coordinates::new(27.5, 95.5));
        assert_eq!(map.selected(), Some(&selected));
        assert_eq!(*seen.lock().unwrap(), [Coordinates::new(27.5, 95.5)]);
    }

    #[test]
    fn select_invokes_callback_once() {
        let calls = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&calls);
        let mut map = ClusterMap::new(Some(Arc::new(move |_| {
            *counter.lock().unwrap() += 1;
        })));
        map.update(&[report("1", "Tengakhat", 27.1, 95.1, &[])], &[]);

        assert!(map.select("Tengakhat").is_some());
        assert!(map.selected().is_some());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn unknown_village_changes_nothing() {
        let calls = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&calls);
        let mut map = ClusterMap::new(Some(Arc::new(move |_| {
            *counter.lock().unwrap() += 1;
        })));
        map.update(&[report("1", "Naharkatia", 27.3, 95.3, &[])], &[]);

        assert!(map.select("Nowhere").is_none());
        assert!(map.selected().is_none());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn update_recomputes_from_scratch() {
        let mut map = ClusterMap::new(None);
        map.update(&[report("1", "A", 27.0, 95.0, &[])], &[]);
        assert_eq!(map.clusters().len(), 1);

        map.update(
            &[
                report("2", "B", 27.0, 95.0, &[]),
                report("3", "C", 27.0, 95.0, &[]),
            ],
            &[],
        );
        let villages: Vec<&str> = map.clusters().iter().map(|c| c.village.as_str()).collect();
        assert_eq!(villages, ["B", "C"]);
        assert!(map.water_markers().is_empty());
    }

    #[test]
    fn works_without_a_callback() {
        let mut map = ClusterMap::new(None);
        map.update(&[report("1", "Sessa", 27.4, 94.9, &["Fever"])], &[]);
        assert_eq!(map.select("Sessa").map(|s| s.count), Some(1));

        map.clear_selection();
        assert!(map.selected().is_none());
    }
}
