use chrono::Duration;
use fleetguard_domain::error::{DomainError, DomainResult};
use fleetguard_domain::{
    CredentialStore, Envelope, IncidentReport, RecordStore, SessionCache, ShareTokenCodec,
    TelematicsApi, REPORT_TAG,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const MAX_CACHED_REPORTS: usize = 1024;

struct CacheEntry {
    report: IncidentReport,
    cached_at: Instant,
}

/// Resolves share tokens to persisted reports for the public read path.
///
/// The token carries the report and tenant ids; the reader verifies the
/// signature, authenticates against the tenant and scans the report records
/// for a match. Resolved reports are cached for a short TTL since a shared
/// link tends to be opened in bursts.
pub struct ShareReportReader {
    codec: ShareTokenCodec,
    sessions: SessionCache,
    store: RecordStore,
    cache_ttl: std::time::Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl ShareReportReader {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn TelematicsApi>,
        codec: ShareTokenCodec,
        session_ttl: Duration,
        cache_ttl: std::time::Duration,
    ) -> Self {
        Self {
            codec,
            sessions: SessionCache::new(credentials, Arc::clone(&api), session_ttl),
            store: RecordStore::new(api),
            cache_ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a share token to its report, hitting the cache first.
    #[instrument(skip(self, token))]
    pub async fn fetch(&self, token: &str) -> DomainResult<IncidentReport> {
        let (report_id, tenant_id) = self.codec.decode(token)?;

        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&report_id) {
                if entry.cached_at.elapsed() < self.cache_ttl {
                    debug!(report_id = %report_id, "report cache hit");
                    return Ok(entry.report.clone());
                }
            }
        }

        let session = self.sessions.get_session(&tenant_id).await?;
        let envelopes = self.store.list_envelopes(&session, REPORT_TAG).await?;
        for (_, envelope) in envelopes {
            if let Envelope::Report(report) = envelope {
                if report.id == report_id && report.tenant_id == tenant_id {
                    self.cache_report(report.clone()).await;
                    return Ok(report);
                }
            }
        }

        debug!(report_id = %report_id, "no report record for token");
        Err(DomainError::ReportNotFound(report_id))
    }

    async fn cache_report(&self, report: IncidentReport) {
        let mut cache = self.cache.lock().await;
        if cache.len() >= MAX_CACHED_REPORTS {
            let ttl = self.cache_ttl;
            cache.retain(|_, entry| entry.cached_at.elapsed() < ttl);
        }
        // Still full after pruning means a burst of distinct reports; serve
        // those uncached rather than evicting live entries
        if cache.len() < MAX_CACHED_REPORTS {
            cache.insert(
                report.id.clone(),
                CacheEntry {
                    report,
                    cached_at: Instant::now(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleetguard_domain::{
        EvidencePackage, MockCredentialStore, MockTelematicsApi, Severity, StoredRecord,
        TenantCredentials,
    };

    fn report(id: &str, tenant: &str) -> IncidentReport {
        IncidentReport {
            id: id.to_string(),
            incident_id: Some("i1".to_string()),
            tenant_id: tenant.to_string(),
            device_id: "device-1".to_string(),
            vehicle_name: "Truck 12".to_string(),
            driver_name: Some("J. Doe".to_string()),
            occurred_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            generated_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
            severity: Severity::High,
            summary: "Collision on Truck 12".to_string(),
            evidence: EvidencePackage {
                gps_trail: vec![],
                diagnostics: vec![],
                weather: None,
                driver: None,
                speed_at_event_kmh: 52.0,
                max_speed_kmh: 61.0,
                deceleration_ms2: Some(-4.2),
                g_force: None,
                hours_of_service: None,
                photos: vec![],
            },
            share_url: None,
            notes: None,
        }
    }

    fn mock_credentials() -> MockCredentialStore {
        let mut store = MockCredentialStore::new();
        store.expect_get_credentials().returning(|tenant| {
            Ok(TenantCredentials {
                endpoint: "https://fleet.example.com".to_string(),
                database: tenant.to_string(),
                username: "svc".to_string(),
                secret: "secret".to_string(),
            })
        });
        store
    }

    fn api_with_report(report: IncidentReport) -> MockTelematicsApi {
        let body = Envelope::Report(report).encode().unwrap();
        let mut api = MockTelematicsApi::new();
        api.expect_authenticate().returning(|_| Ok("key".to_string()));
        api.expect_search_records().returning(move |_, _| {
            Ok(vec![StoredRecord {
                id: "rec-1".to_string(),
                tag: REPORT_TAG.to_string(),
                body: body.clone(),
            }])
        });
        api
    }

    fn reader(api: MockTelematicsApi) -> ShareReportReader {
        ShareReportReader::new(
            Arc::new(mock_credentials()),
            Arc::new(api),
            ShareTokenCodec::new("test-secret"),
            Duration::minutes(30),
            std::time::Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_valid_token_resolves_report() {
        let reader = reader(api_with_report(report("r1", "acme")));
        let token = ShareTokenCodec::new("test-secret").encode("r1", "acme");

        let found = reader.fetch(&token).await.unwrap();
        assert_eq!(found.id, "r1");
        assert_eq!(found.vehicle_name, "Truck 12");
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let body = Envelope::Report(report("r1", "acme")).encode().unwrap();
        let mut api = MockTelematicsApi::new();
        api.expect_authenticate().returning(|_| Ok("key".to_string()));
        api.expect_search_records().times(1).returning(move |_, _| {
            Ok(vec![StoredRecord {
                id: "rec-1".to_string(),
                tag: REPORT_TAG.to_string(),
                body: body.clone(),
            }])
        });

        let reader = reader(api);
        let token = ShareTokenCodec::new("test-secret").encode("r1", "acme");
        reader.fetch(&token).await.unwrap();
        reader.fetch(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_token_rejected_without_upstream_calls() {
        // No expectations set: any upstream call would panic the mock
        let reader = reader(MockTelematicsApi::new());
        let result = reader.fetch("bm90YXRva2Vu").await;
        assert!(matches!(result, Err(DomainError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_signed_token_for_missing_report() {
        let mut api = MockTelematicsApi::new();
        api.expect_authenticate().returning(|_| Ok("key".to_string()));
        api.expect_search_records().returning(|_, _| Ok(vec![]));

        let reader = reader(api);
        let token = ShareTokenCodec::new("test-secret").encode("r-gone", "acme");
        let result = reader.fetch(&token).await;
        assert!(matches!(result, Err(DomainError::ReportNotFound(id)) if id == "r-gone"));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_key_rejected() {
        let reader = reader(MockTelematicsApi::new());
        let token = ShareTokenCodec::new("other-secret").encode("r1", "acme");
        let result = reader.fetch(&token).await;
        assert!(matches!(result, Err(DomainError::InvalidToken)));
    }
}
