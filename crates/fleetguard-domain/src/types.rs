use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of one physical record in the vendor store.
pub type RecordId = String;

/// Connection credentials for one tenant account on the telematics platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantCredentials {
    pub endpoint: String,
    pub database: String,
    pub username: String,
    pub secret: String,
}

/// An authenticated session against one tenant's API.
///
/// Owned by the session cache; replaced on renewal, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub tenant_id: String,
    pub api_key: String,
    pub expires_at: DateTime<Utc>,
}

/// One raw record as returned by the vendor's flat record API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub tag: String,
    pub body: String,
}

/// An incident event from the tenant's event feed.
///
/// Sourced externally and immutable; consumed but never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    pub id: String,
    pub device_id: String,
    pub driver_id: Option<String>,
    pub rule_name: String,
    pub active_from: DateTime<Utc>,
    pub active_to: DateTime<Utc>,
}

/// One page of the incremental event feed plus the cursor to resume from.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedBatch {
    pub events: Vec<IncidentEvent>,
    pub to_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReading {
    pub code: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition: String,
    pub temperature_c: f64,
    pub visibility_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub id: String,
    pub name: String,
    pub license_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub vin: Option<String>,
}

/// Hours-of-service snapshot for the driver at the time of the incident.
///
/// Full-package only; dropped during compaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoursOfService {
    pub driving_minutes_today: u32,
    pub on_duty_minutes_today: u32,
}

/// Evidence gathered for one incident window.
///
/// The full variant carries the richer optional fields (g-force, HOS,
/// photos); only the compacted variant is ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePackage {
    pub gps_trail: Vec<GpsPoint>,
    pub diagnostics: Vec<DiagnosticReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverInfo>,
    pub speed_at_event_kmh: f64,
    pub max_speed_kmh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deceleration_ms2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g_force: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_of_service: Option<HoursOfService>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<Vec<u8>>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        write!(f, "{}", s)
    }
}

/// A generated incident report.
///
/// Created once per qualifying incident or manual request. Only the
/// compacted variant is persisted; the full variant exists transiently for
/// document rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub id: String,
    pub incident_id: Option<String>,
    pub tenant_id: String,
    pub device_id: String,
    pub vehicle_name: String,
    pub driver_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub severity: Severity,
    pub summary: String,
    pub evidence: EvidencePackage,
    pub share_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Terminal states are absorbing: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Processing => "Processing",
            RequestStatus::Completed => "Completed",
            RequestStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// A manual report request created by a user action.
///
/// Mutated only through the request lifecycle; never deleted automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub id: String,
    pub device_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub incidents_found: u32,
    pub reports_generated: u32,
    #[serde(default)]
    pub force_report: bool,
}

impl ReportRequest {
    pub fn new(
        device_id: impl Into<String>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            from,
            to,
            requested_by: requested_by.into(),
            requested_at: Utc::now(),
            status: RequestStatus::Pending,
            error_message: None,
            incidents_found: 0,
            reports_generated: 0,
            force_report: false,
        }
    }
}
