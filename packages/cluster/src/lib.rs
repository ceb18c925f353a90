#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Village clustering for the outbreak map.
//!
//! Groups point-located symptom reports into one cluster per village,
//! computes each cluster's centroid, severity tier and dominant symptom,
//! and builds the water-source overlay. Everything here is a pure function
//! of its input; the map view in [`map`] recomputes from scratch on every
//! update.

pub mod map;
pub mod overlay;

use std::collections::BTreeMap;

use outbreak_watch_surveillance_models::{Coordinates, SymptomReport};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Dominant symptom reported for a cluster with no recorded symptoms.
pub const UNKNOWN_SYMPTOM: &str = "Unknown";

/// Cluster severity, derived purely from how many reports a village has.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SeverityTier {
    /// 5 reports or fewer
    Low,
    /// 6 to 10 reports
    Medium,
    /// 11 to 20 reports
    High,
    /// More than 20 reports
    Critical,
}

/// How a tier is drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierStyle {
    /// Fill color as a hex string.
    pub color: &'static str,
    /// Marker diameter in pixels.
    pub size: u32,
}

impl SeverityTier {
    /// Maps a report count onto a tier. Thresholds are exclusive, so the
    /// boundary counts 5, 10 and 20 fall into the lower tier.
    #[must_use]
    pub const fn from_report_count(count: usize) -> Self {
        if count > 20 {
            Self::Critical
        } else if count > 10 {
            Self::High
        } else if count > 5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Returns the marker style for this tier.
    #[must_use]
    pub const fn style(self) -> TierStyle {
        match self {
            Self::Low => TierStyle {
                color: "#22c55e",
                size: 20,
            },
            Self::Medium => TierStyle {
                color: "#eab308",
                size: 25,
            },
            Self::High => TierStyle {
                color: "#f97316",
                size: 30,
            },
            Self::Critical => TierStyle {
                color: "#ef4444",
                size: 40,
            },
        }
    }

    /// Circle marker radius in pixels (half the marker size).
    #[must_use]
    pub fn marker_radius(self) -> f64 {
        f64::from(self.style().size) / 2.0
    }

    /// Returns all variants of this enum, lowest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

/// All reports filed from one village, summarized for the map.
#[derive(Debug, Clone, PartialEq)]
pub struct VillageCluster {
    /// Cluster key. Every member report carries exactly this village name.
    pub village: String,
    /// Member reports in input order.
    pub reports: Vec<SymptomReport>,
    /// Unweighted mean of the member coordinates.
    pub centroid: Coordinates,
    /// Tier derived from the member count.
    pub tier: SeverityTier,
    /// Most frequently reported symptom.
    pub dominant_symptom: String,
}

/// The detail shown when a cluster is selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    /// Village name.
    pub village: String,
    /// Number of reports in the cluster.
    pub count: usize,
    /// Dominant symptom.
    pub main_symptom: String,
    /// Cluster centroid.
    pub coordinates: Coordinates,
}

impl VillageCluster {
    /// Number of member reports.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    /// Builds the selection detail for this cluster.
    #[must_use]
    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            village: self.village.clone(),
            count: self.report_count(),
            main_symptom: self.dominant_symptom.clone(),
            coordinates: self.centroid,
        }
    }

    /// Plain-text hover label.
    #[must_use]
    pub fn tooltip(&self) -> String {
        format!(
            "{}\n{} reports\nMain symptom: {}",
            self.village,
            self.report_count(),
            self.dominant_symptom
        )
    }
}

/// Groups reports into one cluster per village.
///
/// Villages are matched by exact string equality, with no case or
/// whitespace folding. Clusters come out in the order each village first
/// appears in `reports`.
#[must_use]
pub fn cluster_reports(reports: &[SymptomReport]) -> Vec<VillageCluster> {
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    let mut groups: Vec<(&str, Vec<SymptomReport>)> = Vec::new();

    for report in reports {
        let slot = *index.entry(report.village.as_str()).or_insert_with(|| {
            groups.push((report.village.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(report.clone());
    }

    let clusters: Vec<VillageCluster> = groups
        .into_iter()
        .filter_map(|(village, members)| {
            let centroid = centroid(&members)?;
            Some(VillageCluster {
                village: village.to_string(),
                tier: SeverityTier::from_report_count(members.len()),
                dominant_symptom: dominant_symptom(&members),
                centroid,
                reports: members,
            })
        })
        .collect();

    log::debug!(
        "Clustered {} reports into {} villages",
        reports.len(),
        clusters.len()
    );

    clusters
}

/// Componentwise arithmetic mean of the report coordinates.
///
/// This is a planar average, not a geodesic centroid. Returns `None` for
/// an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn centroid(reports: &[SymptomReport]) -> Option<Coordinates> {
    if reports.is_empty() {
        return None;
    }

    let n = reports.len() as f64;
    let lat = reports.iter().map(|r| r.coordinates.lat).sum::<f64>() / n;
    let lon = reports.iter().map(|r| r.coordinates.lon).sum::<f64>() / n;

    Some(Coordinates::new(lat, lon))
}

/// Most frequent symptom across all reports.
///
/// Ties go to the symptom encountered first. Returns [`UNKNOWN_SYMPTOM`]
/// when no symptoms were recorded.
#[must_use]
pub fn dominant_symptom(reports: &[SymptomReport]) -> String {
    let mut positions: BTreeMap<&str, usize> = BTreeMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for symptom in reports.iter().flat_map(|r| r.symptoms.iter()) {
        let slot = *positions.entry(symptom.as_str()).or_insert_with(|| {
            counts.push((symptom.as_str(), 0));
            counts.len() - 1
        });
        counts[slot].1 += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (symptom, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((symptom, count)),
        }
    }

    best.map_or_else(|| UNKNOWN_SYMPTOM.to_string(), |(s, _)| s.to_string())
}
