//! Water-source markers drawn on top of the village clusters.
//!
//! Sources are never clustered: each one sits at its own coordinate and is
//! colored by its latest test result.

use outbreak_watch_surveillance_models::{
    Coordinates, WaterSource, WaterSourceKind, WaterSourceStatus,
};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Marker color for a water source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarkerColor {
    /// Contaminated
    Red,
    /// Caution
    Orange,
    /// Everything else
    Blue,
}

impl MarkerColor {
    /// Hex value used when drawing the marker.
    #[must_use]
    pub const fn hex(self) -> &'static str {
        match self {
            Self::Red => "#ef4444",
            Self::Orange => "#f97316",
            Self::Blue => "#3b82f6",
        }
    }
}

/// Maps a water source status onto its marker color.
#[must_use]
pub const fn marker_color(status: WaterSourceStatus) -> MarkerColor {
    match status {
        WaterSourceStatus::Contaminated => MarkerColor::Red,
        WaterSourceStatus::Caution => MarkerColor::Orange,
        WaterSourceStatus::Safe => MarkerColor::Blue,
    }
}

/// A water source positioned on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterMarker {
    /// Source ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of source.
    pub kind: WaterSourceKind,
    /// Latest test result.
    pub status: WaterSourceStatus,
    /// The source's own coordinate.
    pub coordinates: Coordinates,
    /// Color derived from `status`.
    pub color: MarkerColor,
    /// Number of reports linked to the source.
    pub linked_reports: usize,
}

impl WaterMarker {
    /// Plain-text hover label.
    #[must_use]
    pub fn tooltip(&self) -> String {
        format!(
            "{}\nType: {}\nStatus: {}\nReports linked: {}",
            self.name, self.kind, self.status, self.linked_reports
        )
    }
}

impl From<&WaterSource> for WaterMarker {
    fn from(source: &WaterSource) -> Self {
        Self {
            id: source.id.clone(),
            name: source.name.clone(),
            kind: source.kind,
            status: source.status,
            coordinates: source.coordinates,
            color: marker_color(source.status),
            linked_reports: source.linked_report_ids.len(),
        }
    }
}

/// Builds one marker per water source, in input order.
#[must_use]
pub fn water_markers(sources: &[WaterSource]) -> Vec<WaterMarker> {
    sources.iter().map(WaterMarker::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sources() -> Vec<WaterSource> {
        serde_json::from_value(json!([
            {
                "id": "w-1", "name": "Lahowal Well", "type": "well",
                "coordinates": [27.40, 94.90], "status": "contaminated",
                "reports": ["r-1", "r-2", "r-3"]
            },
            {
                "id": "w-2", "name": "Chabua Tank", "type": "tank",
                "coordinates": [27.48, 95.17], "status": "caution", "reports": []
            },
            {
                "id": "w-3", "name": "Moran Borehole", "type": "borehole",
                "coordinates": [26.92, 94.83], "status": "safe", "reports": []
            }
        ]))
        .unwrap()
    }

    #[test]
    fn colors_follow_status() {
        let colors: Vec<MarkerColor> = water_markers(&sources()).iter().map(|m| m.color).collect();
        assert_eq!(
            colors,
            [MarkerColor::Red, MarkerColor::Orange, MarkerColor::Blue]
        );
    }

    #[test]
    fn markers_keep_literal_coordinates() {
        let input = sources();
        for (marker, source) in water_markers(&input).iter().zip(&input) {
            assert_eq!(marker.coordinates, source.coordinates);
        }
    }

    #[test]
    fn tooltip_lists_linked_reports() {
        let marker = WaterMarker::from(&sources()[0]);
        assert_eq!(
            marker.tooltip(),
            "Lahowal Well\nType: well\nStatus: contaminated\nReports linked: 3"
        );
        assert_eq!(marker.color.hex(), "#ef4444");
    }
}
