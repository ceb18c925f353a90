#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Surveillance record types for the outbreak dashboard.
//!
//! These types mirror the JSON returned by the district health API:
//! symptom reports filed from villages, monitored water sources, raised
//! alerts, and the dashboard summary and chart aggregates. Date-bearing
//! fields decode in wire format and are normalized through
//! [`TransformDates`].

pub mod dates;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use dates::{DateValue, TransformDates, parse_wire_date};

/// A WGS84 point. Transmitted as a `[lat, lon]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Coordinates {
    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lat, c.lon]
    }
}

/// Severity a reporter assigned to an individual symptom report.
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
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportSeverity {
    /// Mild symptoms.
    Mild,
    /// Moderate symptoms.
    Moderate,
    /// Severe symptoms or a contaminated source nearby.
    Severe,
}

/// Self-reported gender of the person filing a report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReporterGender {
    /// Male
    Male,
    /// Female
    Female,
    /// Other or undisclosed
    Other,
}

/// A single point-located symptom report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomReport {
    /// Unique report ID.
    pub id: String,
    /// Village the report was filed from. Used verbatim as the cluster key.
    pub village: String,
    /// Where the report was filed.
    pub coordinates: Coordinates,
    /// Symptoms in the order they were recorded.
    #[serde(default)]
    pub symptoms: Vec<String>,
    /// Reporter-assigned severity.
    pub severity: ReportSeverity,
    /// When the report was filed.
    pub reported_at: DateValue,
    /// Name of the water source the reporter drinks from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_source: Option<String>,
    /// Age of the reporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_age: Option<u32>,
    /// Gender of the reporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_gender: Option<ReporterGender>,
}

impl TransformDates for SymptomReport {
    fn transform_dates(mut self) -> Self {
        self.reported_at = self.reported_at.transform_dates();
        self
    }
}

/// Kind of monitored water source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WaterSourceKind {
    /// Dug well
    Well,
    /// Drilled borehole
    Borehole,
    /// River intake
    River,
    /// Pond
    Pond,
    /// Storage tank
    Tank,
    /// Several sources in one village reported as a single entry
    Aggregated,
    /// Any kind this client does not know about
    #[serde(other)]
    Other,
}

/// Result of the most recent water quality test.
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
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WaterSourceStatus {
    /// Safe to drink.
    Safe,
    /// Borderline readings, boil before use.
    Caution,
    /// Contaminated, do not use.
    Contaminated,
}

/// A monitored water source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterSource {
    /// Unique source ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of source.
    #[serde(rename = "type")]
    pub kind: WaterSourceKind,
    /// Where the source is.
    pub coordinates: Coordinates,
    /// Latest test result.
    pub status: WaterSourceStatus,
    /// When the source was last tested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested: Option<DateValue>,
    /// IDs of symptom reports linked to this source.
    #[serde(default, rename = "reports")]
    pub linked_report_ids: Vec<String>,
    /// Number of flagged samples behind an aggregated source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_count: Option<u32>,
    /// Distance in kilometres from the center of a proximity query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl TransformDates for WaterSource {
    fn transform_dates(mut self) -> Self {
        self.last_tested = self.last_tested.transform_dates();
        self
    }
}

/// Urgency of a raised alert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertLevel {
    /// Immediate response required.
    High,
    /// Monitor closely.
    Medium,
    /// Informational.
    Low,
}

/// Lifecycle state of an alert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertStatus {
    /// Newly raised.
    Active,
    /// A team is looking into it.
    Investigating,
    /// Closed.
    Resolved,
}

/// An outbreak alert raised for a village.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique alert ID.
    pub id: String,
    /// Village the alert concerns.
    pub village: String,
    /// Urgency.
    pub level: AlertLevel,
    /// Short description of what triggered the alert.
    pub trigger: String,
    /// Longer description.
    pub description: String,
    /// When the alert was raised.
    pub timestamp: DateValue,
    /// Lifecycle state.
    pub status: AlertStatus,
    /// Number of symptom reports behind the alert.
    pub report_count: u32,
}

impl TransformDates for Alert {
    fn transform_dates(mut self) -> Self {
        self.timestamp = self.timestamp.transform_dates();
        self
    }
}

/// Headline counters for the dashboard.
///
/// The API answers `{}` when it has no data, so every field defaults to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardStats {
    /// Reports received today.
    pub total_reports_today: u64,
    /// Alerts currently active.
    pub active_alerts: u64,
    /// Villages flagged as high risk.
    pub high_risk_villages: u64,
    /// Reports received in the last 24 hours.
    pub new_reports_24h: u64,
}

/// One bar of the symptom histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomCount {
    /// Symptom name.
    pub name: String,
    /// Number of occurrences.
    pub count: u64,
}

/// One month of the report timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Month in `YYYY-MM` form.
    pub date: String,
    /// Reports filed that month.
    pub reports: u64,
    /// Rainfall for the month in millimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rainfall: Option<f64>,
}

/// Aggregates backing the dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartData {
    /// Symptom histogram.
    pub symptoms: Vec<SymptomCount>,
    /// Reports over time with rainfall.
    pub timeline: Vec<TimelinePoint>,
}

/// Body of `POST /send-alert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAlertRequest {
    /// Message broadcast to subscribed recipients.
    pub message: String,
}

/// Response of `POST /send-alert`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendAlertResponse {
    /// Whether the alert went out.
    pub success: bool,
    /// Human-readable status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure detail when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Delivery channel used (e.g. `"telegram"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}
