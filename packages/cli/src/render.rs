//! Plain-text rendering of dashboard data for the terminal.

use std::fmt::Write as _;

use outbreak_watch_client::FetchError;
use outbreak_watch_cluster::overlay::WaterMarker;
use outbreak_watch_cluster::{ClusterSummary, VillageCluster};
use outbreak_watch_dashboard::{DashboardData, QueryState};
use outbreak_watch_surveillance_models::{Alert, Coordinates, SymptomReport, WaterSource};

fn coordinates(c: Coordinates) -> String {
    format!("{:.4}, {:.4}", c.lat, c.lon)
}

fn status_line(is_loading: bool, error: Option<&FetchError>) -> String {
    match (is_loading, error) {
        (_, Some(e)) => format!("Error: {e}"),
        (true, None) => "Loading...".to_string(),
        (false, None) => "OK".to_string(),
    }
}

fn count<T>(state: &QueryState<Vec<T>>) -> String {
    state
        .data
        .as_ref()
        .map_or_else(|| "-".to_string(), |items| items.len().to_string())
}

/// Returns `data` when every query loaded, or the message shown in place
/// of the whole dashboard when one failed.
///
/// # Errors
///
/// Returns the aggregate error, so no panel renders half-loaded data.
pub fn loaded(data: &DashboardData) -> Result<&DashboardData, String> {
    match &data.error {
        Some(e) => Err(format!("Error loading dashboard data: {e}")),
        None => Ok(data),
    }
}

/// Headline stats, per-query counts and the combined status.
#[must_use]
pub fn summary(data: &DashboardData) -> String {
    let mut out = String::new();
    let stats = data.dashboard_stats.data.unwrap_or_default();

    let _ = writeln!(out, "Reports today:       {}", stats.total_reports_today);
    let _ = writeln!(out, "Active alerts:       {}", stats.active_alerts);
    let _ = writeln!(out, "High-risk villages:  {}", stats.high_risk_villages);
    let _ = writeln!(out, "New reports (24h):   {}", stats.new_reports_24h);
    let _ = writeln!(out);

    if let Some(center) = data.center {
        let _ = writeln!(out, "Center of interest:  {}", coordinates(center));
    }
    let _ = writeln!(out, "Nearby reports:      {}", count(&data.symptom_reports));
    let _ = writeln!(out, "Nearby water:        {}", count(&data.water_sources));
    let _ = writeln!(out, "Nearby alerts:       {}", count(&data.alerts));
    let _ = writeln!(out, "All reports:         {}", count(&data.symptom_reports_map));
    let _ = writeln!(out, "All water sources:   {}", count(&data.water_sources_map));

    if let Some(chart) = &data.chart_data.data {
        let _ = writeln!(out);
        let _ = writeln!(out, "Top symptoms:");
        for symptom in chart.symptoms.iter().take(5) {
            let _ = writeln!(out, "  {:<20} {}", symptom.name, symptom.count);
        }
    }

    let _ = writeln!(out);
    let _ = write!(out, "Status: {}", status_line(data.is_loading, data.error.as_ref()));
    out
}

/// One line per cluster, biggest first.
#[must_use]
pub fn clusters(clusters: &[VillageCluster]) -> String {
    let mut sorted: Vec<&VillageCluster> = clusters.iter().collect();
    sorted.sort_by(|a, b| b.report_count().cmp(&a.report_count()));

    let mut out = format!(
        "{:<20} {:>7} {:<9} {:<20} MAIN SYMPTOM",
        "VILLAGE", "REPORTS", "TIER", "CENTROID"
    );
    for cluster in sorted {
        let _ = write!(
            out,
            "\n{:<20} {:>7} {:<9} {:<20} {}",
            cluster.village,
            cluster.report_count(),
            cluster.tier.as_ref(),
            coordinates(cluster.centroid),
            cluster.dominant_symptom,
        );
    }
    out
}

/// One line per water marker.
#[must_use]
pub fn water_markers(markers: &[WaterMarker]) -> String {
    let mut out = format!(
        "{:<24} {:<9} {:<13} {:<7} LINKED REPORTS",
        "WATER SOURCE", "TYPE", "STATUS", "COLOR"
    );
    for marker in markers {
        let _ = write!(
            out,
            "\n{:<24} {:<9} {:<13} {:<7} {}",
            marker.name,
            marker.kind.as_ref(),
            marker.status.as_ref(),
            marker.color.hex(),
            marker.linked_reports,
        );
    }
    out
}

/// Detail panel for a selected cluster.
#[must_use]
pub fn selection(summary: &ClusterSummary) -> String {
    format!(
        "{}\n  Reports:       {}\n  Main symptom:  {}\n  Location:      {}",
        summary.village,
        summary.count,
        summary.main_symptom,
        coordinates(summary.coordinates),
    )
}

fn report_line(report: &SymptomReport) -> String {
    format!(
        "  [{}] {} ({}) {} - {}",
        report.id,
        report.village,
        report.severity,
        report.reported_at,
        report.symptoms.join(", "),
    )
}

fn water_line(source: &WaterSource) -> String {
    format!(
        "  [{}] {} ({}, {})",
        source.id, source.name, source.kind, source.status
    )
}

fn alert_line(alert: &Alert) -> String {
    format!(
        "  [{}] {} {} - {} ({} reports, {})",
        alert.level, alert.village, alert.trigger, alert.status, alert.report_count, alert.timestamp
    )
}

fn section<T>(out: &mut String, title: &str, state: &QueryState<Vec<T>>, line: fn(&T) -> String) {
    let _ = writeln!(out, "{title}:");
    match (&state.data, &state.error) {
        (_, Some(e)) => {
            let _ = writeln!(out, "  error: {e}");
        }
        (Some(items), None) if items.is_empty() => {
            let _ = writeln!(out, "  none");
        }
        (Some(items), None) => {
            for item in items {
                let _ = writeln!(out, "{}", line(item));
            }
        }
        (None, None) => {
            let _ = writeln!(out, "  -");
        }
    }
}

/// Reports, water sources and alerts near the center of interest.
#[must_use]
pub fn nearby(data: &DashboardData) -> String {
    let mut out = String::new();
    match data.center {
        Some(center) => {
            let _ = writeln!(out, "Near {}", coordinates(center));
        }
        None => {
            let _ = writeln!(out, "No center of interest");
        }
    }
    section(&mut out, "Reports", &data.symptom_reports, report_line);
    section(&mut out, "Water sources", &data.water_sources, water_line);
    section(&mut out, "Alerts", &data.alerts, alert_line);
    out.truncate(out.trim_end().len());
    out
}
