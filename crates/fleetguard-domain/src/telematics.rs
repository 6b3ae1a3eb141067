use crate::error::DomainResult;
use crate::types::{
    DeviceInfo, DiagnosticReading, DriverInfo, FeedBatch, GpsPoint, IncidentEvent, IncidentReport,
    RecordId, SessionHandle, StoredRecord, TenantCredentials, WeatherSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Typed seam over the vendor's telematics API.
///
/// The flat record operations (`search_records`/`add_record`/`remove_record`)
/// are the only backing store this system has: an opaque append-log with a
/// tag filter and no atomic update. Any backend offering the same operations
/// is substitutable.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelematicsApi: Send + Sync {
    /// Authenticate against one tenant's account; returns the opaque API key
    async fn authenticate(&self, credentials: &TenantCredentials) -> DomainResult<String>;

    /// Search all records carrying the given tag
    async fn search_records(
        &self,
        session: &SessionHandle,
        tag: &str,
    ) -> DomainResult<Vec<StoredRecord>>;

    /// Append one record; returns its physical id
    async fn add_record(
        &self,
        session: &SessionHandle,
        tag: &str,
        body: &str,
    ) -> DomainResult<RecordId>;

    /// Remove one record by physical id
    async fn remove_record(&self, session: &SessionHandle, id: &str) -> DomainResult<()>;

    /// Pull the incremental incident-event feed from an opaque cursor.
    /// `None` starts from the beginning of retained history.
    async fn incident_feed(
        &self,
        session: &SessionHandle,
        from_version: Option<String>,
    ) -> DomainResult<FeedBatch>;

    /// Search incidents for one device over a closed date range
    async fn search_incidents(
        &self,
        session: &SessionHandle,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<IncidentEvent>>;

    /// Fetch the GPS trail for one device over a date range
    async fn gps_trail(
        &self,
        session: &SessionHandle,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<GpsPoint>>;

    /// Fetch diagnostic snapshots for one device over a date range
    async fn diagnostics(
        &self,
        session: &SessionHandle,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<DiagnosticReading>>;

    /// Look up a driver by id
    async fn driver(
        &self,
        session: &SessionHandle,
        driver_id: &str,
    ) -> DomainResult<Option<DriverInfo>>;

    /// Look up a device (vehicle) by id
    async fn device(
        &self,
        session: &SessionHandle,
        device_id: &str,
    ) -> DomainResult<Option<DeviceInfo>>;
}

/// Weather lookup collaborator. Failure degrades evidence collection,
/// never fails it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn conditions_at(
        &self,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> DomainResult<WeatherSnapshot>;
}

/// Regenerates the full report document on demand. Page layout and
/// typography live behind this seam.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, report: &IncidentReport) -> DomainResult<Vec<u8>>;
}

/// E-mail delivery collaborator for the public share path.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_report(
        &self,
        report: &IncidentReport,
        recipient: &str,
        message: &str,
    ) -> DomainResult<()>;
}
