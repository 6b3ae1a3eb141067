use crate::error::{DomainError, DomainResult};
use crate::telematics::{TelematicsApi, WeatherProvider};
use crate::types::{
    DeviceInfo, DiagnosticReading, DriverInfo, FeedBatch, GpsPoint, IncidentEvent, RecordId,
    SessionHandle, StoredRecord, TenantCredentials, WeatherSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct TenantState {
    records: Vec<StoredRecord>,
    incidents: Vec<IncidentEvent>,
    trails: HashMap<String, Vec<GpsPoint>>,
    diagnostics: HashMap<String, Vec<DiagnosticReading>>,
    drivers: HashMap<String, DriverInfo>,
    devices: HashMap<String, DeviceInfo>,
}

#[derive(Default)]
struct State {
    tenants: HashMap<String, TenantState>,
    next_record_id: u64,
}

/// In-memory implementation of the vendor API, one isolated record/event
/// space per tenant database. Used by the integration tests and the demo
/// wiring of the all-in-one binary.
#[derive(Default)]
pub struct InMemoryTelematicsApi {
    state: Mutex<State>,
}

impl InMemoryTelematicsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_incident(&self, tenant_id: &str, incident: IncidentEvent) {
        let mut state = self.state.lock().await;
        state
            .tenants
            .entry(tenant_id.to_string())
            .or_default()
            .incidents
            .push(incident);
    }

    pub async fn seed_trail(&self, tenant_id: &str, device_id: &str, trail: Vec<GpsPoint>) {
        let mut state = self.state.lock().await;
        state
            .tenants
            .entry(tenant_id.to_string())
            .or_default()
            .trails
            .insert(device_id.to_string(), trail);
    }

    pub async fn seed_diagnostics(
        &self,
        tenant_id: &str,
        device_id: &str,
        diagnostics: Vec<DiagnosticReading>,
    ) {
        let mut state = self.state.lock().await;
        state
            .tenants
            .entry(tenant_id.to_string())
            .or_default()
            .diagnostics
            .insert(device_id.to_string(), diagnostics);
    }

    pub async fn seed_driver(&self, tenant_id: &str, driver: DriverInfo) {
        let mut state = self.state.lock().await;
        state
            .tenants
            .entry(tenant_id.to_string())
            .or_default()
            .drivers
            .insert(driver.id.clone(), driver);
    }

    pub async fn seed_device(&self, tenant_id: &str, device: DeviceInfo) {
        let mut state = self.state.lock().await;
        state
            .tenants
            .entry(tenant_id.to_string())
            .or_default()
            .devices
            .insert(device.id.clone(), device);
    }

    pub async fn record_count(&self, tenant_id: &str, tag: &str) -> usize {
        let state = self.state.lock().await;
        state
            .tenants
            .get(tenant_id)
            .map(|t| t.records.iter().filter(|r| r.tag == tag).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl TelematicsApi for InMemoryTelematicsApi {
    async fn authenticate(&self, credentials: &TenantCredentials) -> DomainResult<String> {
        if credentials.secret.is_empty() {
            return Err(DomainError::AuthenticationFailed(
                credentials.database.clone(),
            ));
        }
        let mut state = self.state.lock().await;
        state
            .tenants
            .entry(credentials.database.clone())
            .or_default();
        Ok(format!("session-{}", credentials.database))
    }

    async fn search_records(
        &self,
        session: &SessionHandle,
        tag: &str,
    ) -> DomainResult<Vec<StoredRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tenants
            .get(&session.tenant_id)
            .map(|t| {
                t.records
                    .iter()
                    .filter(|r| r.tag == tag)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_record(
        &self,
        session: &SessionHandle,
        tag: &str,
        body: &str,
    ) -> DomainResult<RecordId> {
        let mut state = self.state.lock().await;
        state.next_record_id += 1;
        let id = format!("rec-{}", state.next_record_id);
        state
            .tenants
            .entry(session.tenant_id.clone())
            .or_default()
            .records
            .push(StoredRecord {
                id: id.clone(),
                tag: tag.to_string(),
                body: body.to_string(),
            });
        Ok(id)
    }

    async fn remove_record(&self, session: &SessionHandle, id: &str) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        if let Some(tenant) = state.tenants.get_mut(&session.tenant_id) {
            tenant.records.retain(|r| r.id != id);
        }
        Ok(())
    }

    async fn incident_feed(
        &self,
        session: &SessionHandle,
        from_version: Option<String>,
    ) -> DomainResult<FeedBatch> {
        let state = self.state.lock().await;
        let incidents = state
            .tenants
            .get(&session.tenant_id)
            .map(|t| t.incidents.clone())
            .unwrap_or_default();

        let from = match from_version {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| DomainError::MalformedRecord(format!("bad feed cursor: {}", v)))?,
            None => 0,
        };
        let events = incidents.get(from..).unwrap_or(&[]).to_vec();
        Ok(FeedBatch {
            events,
            to_version: incidents.len().to_string(),
        })
    }

    async fn search_incidents(
        &self,
        session: &SessionHandle,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<IncidentEvent>> {
        let state = self.state.lock().await;
        Ok(state
            .tenants
            .get(&session.tenant_id)
            .map(|t| {
                t.incidents
                    .iter()
                    .filter(|i| {
                        i.device_id == device_id && i.active_from >= from && i.active_from <= to
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn gps_trail(
        &self,
        session: &SessionHandle,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<GpsPoint>> {
        let state = self.state.lock().await;
        Ok(state
            .tenants
            .get(&session.tenant_id)
            .and_then(|t| t.trails.get(device_id))
            .map(|trail| {
                trail
                    .iter()
                    .filter(|p| p.timestamp >= from && p.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn diagnostics(
        &self,
        session: &SessionHandle,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<DiagnosticReading>> {
        let state = self.state.lock().await;
        Ok(state
            .tenants
            .get(&session.tenant_id)
            .and_then(|t| t.diagnostics.get(device_id))
            .map(|readings| {
                readings
                    .iter()
                    .filter(|d| d.recorded_at >= from && d.recorded_at <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn driver(
        &self,
        session: &SessionHandle,
        driver_id: &str,
    ) -> DomainResult<Option<DriverInfo>> {
        let state = self.state.lock().await;
        Ok(state
            .tenants
            .get(&session.tenant_id)
            .and_then(|t| t.drivers.get(driver_id))
            .cloned())
    }

    async fn device(
        &self,
        session: &SessionHandle,
        device_id: &str,
    ) -> DomainResult<Option<DeviceInfo>> {
        let state = self.state.lock().await;
        Ok(state
            .tenants
            .get(&session.tenant_id)
            .and_then(|t| t.devices.get(device_id))
            .cloned())
    }
}

/// Weather provider returning a fixed snapshot, or an upstream error when
/// constructed empty.
#[derive(Default)]
pub struct FixedWeatherProvider {
    snapshot: Option<WeatherSnapshot>,
}

impl FixedWeatherProvider {
    pub fn new(snapshot: Option<WeatherSnapshot>) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl WeatherProvider for FixedWeatherProvider {
    async fn conditions_at(
        &self,
        _latitude: f64,
        _longitude: f64,
        _at: DateTime<Utc>,
    ) -> DomainResult<WeatherSnapshot> {
        self.snapshot
            .clone()
            .ok_or_else(|| DomainError::UpstreamUnavailable("weather".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn session(tenant: &str) -> SessionHandle {
        SessionHandle {
            tenant_id: tenant.to_string(),
            api_key: "key".to_string(),
            expires_at: ts(3600),
        }
    }

    fn incident(id: &str, secs: i64) -> IncidentEvent {
        IncidentEvent {
            id: id.to_string(),
            device_id: "device-1".to_string(),
            driver_id: None,
            rule_name: "Collision".to_string(),
            active_from: ts(secs),
            active_to: ts(secs + 10),
        }
    }

    #[tokio::test]
    async fn test_records_are_tenant_isolated() {
        let api = InMemoryTelematicsApi::new();
        api.add_record(&session("acme"), "t", "a").await.unwrap();

        let other = api.search_records(&session("zeta"), "t").await.unwrap();
        assert!(other.is_empty());
        let own = api.search_records(&session("acme"), "t").await.unwrap();
        assert_eq!(own.len(), 1);
    }

    #[tokio::test]
    async fn test_add_then_remove_record() {
        let api = InMemoryTelematicsApi::new();
        let sess = session("acme");
        let id = api.add_record(&sess, "t", "body").await.unwrap();
        api.remove_record(&sess, &id).await.unwrap();
        assert!(api.search_records(&sess, "t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_cursor_resumes() {
        let api = InMemoryTelematicsApi::new();
        api.seed_incident("acme", incident("i1", 0)).await;
        api.seed_incident("acme", incident("i2", 60)).await;

        let sess = session("acme");
        let first = api.incident_feed(&sess, None).await.unwrap();
        assert_eq!(first.events.len(), 2);

        api.seed_incident("acme", incident("i3", 120)).await;
        let second = api
            .incident_feed(&sess, Some(first.to_version))
            .await
            .unwrap();
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].id, "i3");
    }

    #[tokio::test]
    async fn test_search_incidents_respects_range() {
        let api = InMemoryTelematicsApi::new();
        api.seed_incident("acme", incident("i1", 0)).await;
        api.seed_incident("acme", incident("i2", 1000)).await;

        let hits = api
            .search_incidents(&session("acme"), "device-1", ts(500), ts(2000))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "i2");
    }

    #[tokio::test]
    async fn test_authenticate_requires_secret() {
        let api = InMemoryTelematicsApi::new();
        let result = api
            .authenticate(&TenantCredentials {
                endpoint: "e".to_string(),
                database: "acme".to_string(),
                username: "u".to_string(),
                secret: String::new(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::AuthenticationFailed(_))));
    }
}
