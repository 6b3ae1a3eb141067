use crate::config::TenantSettings;
use crate::error::{DomainError, DomainResult};
use crate::telematics::TelematicsApi;
use crate::types::{IncidentReport, RecordId, ReportRequest, SessionHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const REPORT_TAG: &str = "fleetguard:report";
pub const REQUEST_TAG: &str = "fleetguard:report_request";
pub const CONFIG_TAG: &str = "fleetguard:config";

/// Tagged wrapper letting heterogeneous payloads share one physical record
/// collection. The only unit ever written to the vendor store; each envelope
/// pairs 1:1 with one opaque record id, tracked only transiently during
/// lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    Report(IncidentReport),
    Request(ReportRequest),
    Config(TenantSettings),
}

impl Envelope {
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::Report(_) => REPORT_TAG,
            Envelope::Request(_) => REQUEST_TAG,
            Envelope::Config(_) => CONFIG_TAG,
        }
    }

    pub fn encode(&self) -> DomainResult<String> {
        serde_json::to_string(self)
            .map_err(|e| DomainError::MalformedRecord(format!("encode failed: {}", e)))
    }

    pub fn decode(raw: &str) -> DomainResult<Self> {
        serde_json::from_str(raw).map_err(|e| DomainError::MalformedRecord(e.to_string()))
    }

    /// Serialized size in bytes, used against the store's record-size limit
    pub fn encoded_len(&self) -> DomainResult<usize> {
        Ok(self.encode()?.len())
    }
}

/// Envelope-level view over the vendor's flat record API.
///
/// The backing store has no atomic update, so `replace_envelope` is always
/// remove-then-add. A crash between the two loses the record; that window is
/// accepted for status-update records only, never for report creation,
/// which is a pure add.
pub struct RecordStore {
    api: Arc<dyn TelematicsApi>,
}

impl RecordStore {
    pub fn new(api: Arc<dyn TelematicsApi>) -> Self {
        Self { api }
    }

    /// List all envelopes under a tag. A record that fails to parse is
    /// skipped with a warning; one corrupt tenant record must never block
    /// processing of the rest.
    pub async fn list_envelopes(
        &self,
        session: &SessionHandle,
        tag: &str,
    ) -> DomainResult<Vec<(RecordId, Envelope)>> {
        let records = self.api.search_records(session, tag).await?;
        let mut envelopes = Vec::with_capacity(records.len());
        for record in records {
            match Envelope::decode(&record.body) {
                Ok(envelope) => envelopes.push((record.id, envelope)),
                Err(e) => {
                    warn!(
                        record_id = %record.id,
                        tenant_id = %session.tenant_id,
                        "skipping malformed record: {}",
                        e
                    );
                }
            }
        }
        Ok(envelopes)
    }

    pub async fn add_envelope(
        &self,
        session: &SessionHandle,
        envelope: &Envelope,
    ) -> DomainResult<RecordId> {
        let body = envelope.encode()?;
        let id = self.api.add_record(session, envelope.tag(), &body).await?;
        debug!(record_id = %id, tag = envelope.tag(), "added envelope");
        Ok(id)
    }

    pub async fn remove_envelope(&self, session: &SessionHandle, id: &str) -> DomainResult<()> {
        self.api.remove_record(session, id).await
    }

    /// Update = remove old, then add new. Never add-before-remove: at most
    /// one physical record may exist per logical envelope at any time.
    pub async fn replace_envelope(
        &self,
        session: &SessionHandle,
        old_id: &str,
        envelope: &Envelope,
    ) -> DomainResult<RecordId> {
        self.remove_envelope(session, old_id).await?;
        self.add_envelope(session, envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telematics::MockTelematicsApi;
    use crate::types::{EvidencePackage, Severity, StoredRecord};
    use chrono::Utc;
    use mockall::Sequence;

    fn test_session() -> SessionHandle {
        SessionHandle {
            tenant_id: "acme".to_string(),
            api_key: "key".to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(10),
        }
    }

    fn test_report() -> IncidentReport {
        IncidentReport {
            id: "report-1".to_string(),
            incident_id: Some("incident-1".to_string()),
            tenant_id: "acme".to_string(),
            device_id: "device-1".to_string(),
            vehicle_name: "Truck 12".to_string(),
            driver_name: Some("J. Doe".to_string()),
            occurred_at: Utc::now(),
            generated_at: Utc::now(),
            severity: Severity::High,
            summary: "Collision at 62 km/h".to_string(),
            evidence: EvidencePackage {
                gps_trail: vec![],
                diagnostics: vec![],
                weather: None,
                driver: None,
                speed_at_event_kmh: 62.0,
                max_speed_kmh: 80.0,
                deceleration_ms2: Some(-5.2),
                g_force: None,
                hours_of_service: None,
                photos: vec![],
            },
            share_url: None,
            notes: None,
        }
    }

    #[test]
    fn test_report_envelope_round_trip() {
        let envelope = Envelope::Report(test_report());
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_request_envelope_round_trip() {
        let envelope = Envelope::Request(ReportRequest::new(
            "device-1",
            Utc::now(),
            Utc::now(),
            "ops@example.com",
        ));
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_config_envelope_round_trip() {
        let envelope = Envelope::Config(TenantSettings {
            feed_cursor: Some("v42".to_string()),
            ..Default::default()
        });
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let result = Envelope::decode("not json at all");
        assert!(matches!(result, Err(DomainError::MalformedRecord(_))));
    }

    #[tokio::test]
    async fn test_list_skips_malformed_records() {
        let good = Envelope::Config(TenantSettings::default());
        let good_body = good.encode().unwrap();

        let mut api = MockTelematicsApi::new();
        api.expect_search_records().returning(move |_, _| {
            Ok(vec![
                StoredRecord {
                    id: "r1".to_string(),
                    tag: CONFIG_TAG.to_string(),
                    body: "{corrupt".to_string(),
                },
                StoredRecord {
                    id: "r2".to_string(),
                    tag: CONFIG_TAG.to_string(),
                    body: good_body.clone(),
                },
            ])
        });

        let store = RecordStore::new(Arc::new(api));
        let envelopes = store
            .list_envelopes(&test_session(), CONFIG_TAG)
            .await
            .unwrap();

        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].0, "r2");
    }

    #[tokio::test]
    async fn test_replace_removes_before_adding() {
        let mut api = MockTelematicsApi::new();
        let mut seq = Sequence::new();
        api.expect_remove_record()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        api.expect_add_record()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("new-id".to_string()));

        let store = RecordStore::new(Arc::new(api));
        let new_id = store
            .replace_envelope(
                &test_session(),
                "old-id",
                &Envelope::Config(TenantSettings::default()),
            )
            .await
            .unwrap();
        assert_eq!(new_id, "new-id");
    }

    #[tokio::test]
    async fn test_replace_does_not_add_when_remove_fails() {
        let mut api = MockTelematicsApi::new();
        api.expect_remove_record()
            .returning(|_, _| Err(DomainError::RepositoryError(anyhow::anyhow!("api outage"))));
        api.expect_add_record().times(0);

        let store = RecordStore::new(Arc::new(api));
        let result = store
            .replace_envelope(
                &test_session(),
                "old-id",
                &Envelope::Config(TenantSettings::default()),
            )
            .await;
        assert!(result.is_err());
    }
}
