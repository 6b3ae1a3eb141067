use chrono::Duration;
use fleetguard_domain::{
    CompactionLimits, CredentialStore, Envelope, EvidenceCollector, EvidenceWindow,
    IncidentEvent, RecordId, RecordStore, ReportBuilder, ReportCompactor, ReportRequest,
    RequestLifecycle, RequestStatus, SessionCache, SessionHandle, ShareTokenCodec,
    TelematicsApi, TenantSettings, WeatherProvider, CONFIG_TAG, REQUEST_TAG,
};
use fleetguard_domain::error::DomainResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub struct TenantPollerConfig {
    /// Evidence window before the incident start, in seconds
    pub window_before_secs: i64,
    /// Evidence window after the incident end, in seconds
    pub window_after_secs: i64,
    /// Cached sessions expire after this many minutes
    pub session_ttl_minutes: i64,
    /// Base URL the share links are built against
    pub public_base_url: String,
    /// Signing secret for share tokens
    pub share_secret: String,
    pub compaction: CompactionLimits,
}

impl Default for TenantPollerConfig {
    fn default() -> Self {
        Self {
            window_before_secs: 300,
            window_after_secs: 120,
            session_ttl_minutes: 30,
            public_base_url: "http://localhost:8080".to_string(),
            share_secret: "change-me-in-production".to_string(),
            compaction: CompactionLimits::default(),
        }
    }
}

/// Counts from one full poller pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub tenants_polled: usize,
    pub tenants_failed: usize,
    pub reports_generated: usize,
    pub requests_processed: usize,
    pub incidents_failed: usize,
}

/// Drives the per-tenant pipeline: pull the incremental feed, filter,
/// generate and persist reports, advance the cursor; then drain pending
/// manual requests. Single full pass per run; restart cadence is an
/// external scheduling concern.
pub struct TenantPoller {
    credentials: Arc<dyn CredentialStore>,
    api: Arc<dyn TelematicsApi>,
    sessions: SessionCache,
    store: RecordStore,
    collector: EvidenceCollector,
    compactor: ReportCompactor,
    builder: ReportBuilder,
    window_before: Duration,
    window_after: Duration,
}

impl TenantPoller {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn TelematicsApi>,
        weather: Arc<dyn WeatherProvider>,
        config: TenantPollerConfig,
    ) -> Self {
        let sessions = SessionCache::new(
            Arc::clone(&credentials),
            Arc::clone(&api),
            Duration::minutes(config.session_ttl_minutes),
        );
        let builder = ReportBuilder::new(
            ShareTokenCodec::new(&config.share_secret),
            config.public_base_url.clone(),
        );
        Self {
            sessions,
            store: RecordStore::new(Arc::clone(&api)),
            collector: EvidenceCollector::new(Arc::clone(&api), weather),
            compactor: ReportCompactor::new(config.compaction),
            builder,
            credentials,
            api,
            window_before: Duration::seconds(config.window_before_secs),
            window_after: Duration::seconds(config.window_after_secs),
        }
    }

    /// One full pass over all tenants. A tenant failing is logged and
    /// counted; it never aborts the run for the others.
    #[instrument(skip(self, shutdown))]
    pub async fn run_once(&self, shutdown: CancellationToken) -> DomainResult<PollSummary> {
        let tenants = self.credentials.list_tenants().await?;
        info!(tenant_count = tenants.len(), "starting poller pass");

        let mut summary = PollSummary::default();
        for tenant_id in tenants {
            if shutdown.is_cancelled() {
                warn!("shutdown requested, stopping poller pass early");
                break;
            }
            match self.poll_tenant(&tenant_id, &shutdown).await {
                Ok(tenant_summary) => {
                    summary.tenants_polled += 1;
                    summary.reports_generated += tenant_summary.reports_generated;
                    summary.requests_processed += tenant_summary.requests_processed;
                    summary.incidents_failed += tenant_summary.incidents_failed;
                }
                Err(e) => {
                    error!(tenant_id = %tenant_id, "tenant pass failed: {}", e);
                    summary.tenants_failed += 1;
                }
            }
        }

        info!(
            tenants_polled = summary.tenants_polled,
            tenants_failed = summary.tenants_failed,
            reports_generated = summary.reports_generated,
            requests_processed = summary.requests_processed,
            "poller pass complete"
        );
        Ok(summary)
    }

    #[instrument(skip(self, shutdown), fields(tenant_id = %tenant_id))]
    async fn poll_tenant(
        &self,
        tenant_id: &str,
        shutdown: &CancellationToken,
    ) -> DomainResult<PollSummary> {
        let session = self.sessions.get_session(tenant_id).await?;
        let (settings_record, mut settings) = self.load_settings(&session).await?;
        let mut summary = PollSummary::default();

        // (a) incremental feed
        let feed = self
            .api
            .incident_feed(&session, settings.feed_cursor.clone())
            .await?;
        let qualifying: Vec<&IncidentEvent> = feed
            .events
            .iter()
            .filter(|e| settings.matches_rule(&e.rule_name))
            .collect();
        debug!(
            feed_events = feed.events.len(),
            qualifying = qualifying.len(),
            "fetched incident feed"
        );

        for incident in qualifying {
            if shutdown.is_cancelled() {
                return Ok(summary);
            }
            match self.generate_incident_report(&session, &settings, incident).await {
                Ok(true) => summary.reports_generated += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(incident_id = %incident.id, "report generation failed: {}", e);
                    summary.incidents_failed += 1;
                }
            }
        }

        // The cursor advances only after the whole batch succeeded; a
        // partially failed batch is retried next run (at-least-once,
        // duplicate reports possible but not corrupting).
        if summary.incidents_failed == 0 {
            settings.feed_cursor = Some(feed.to_version);
            self.save_settings(&session, &settings_record, &settings)
                .await?;
        } else {
            warn!(
                failed = summary.incidents_failed,
                "batch incomplete, feed cursor not advanced"
            );
        }

        // (b) pending manual requests
        summary.requests_processed = self.drain_requests(&session, &settings, shutdown).await?;
        Ok(summary)
    }

    async fn load_settings(
        &self,
        session: &SessionHandle,
    ) -> DomainResult<(RecordId, TenantSettings)> {
        let envelopes = self.store.list_envelopes(session, CONFIG_TAG).await?;
        for (record_id, envelope) in envelopes {
            if let Envelope::Config(settings) = envelope {
                return Ok((record_id, settings));
            }
        }

        debug!("no tenant settings record, creating defaults");
        let settings = TenantSettings::default();
        let record_id = self
            .store
            .add_envelope(session, &Envelope::Config(settings.clone()))
            .await?;
        Ok((record_id, settings))
    }

    async fn save_settings(
        &self,
        session: &SessionHandle,
        record_id: &str,
        settings: &TenantSettings,
    ) -> DomainResult<()> {
        self.store
            .replace_envelope(session, record_id, &Envelope::Config(settings.clone()))
            .await?;
        Ok(())
    }

    /// Generate, compact and persist one incident report. Returns false when
    /// the report falls below the tenant's severity floor.
    async fn generate_incident_report(
        &self,
        session: &SessionHandle,
        settings: &TenantSettings,
        incident: &IncidentEvent,
    ) -> DomainResult<bool> {
        let window =
            EvidenceWindow::around_incident(incident, self.window_before, self.window_after);
        let evidence = self
            .collector
            .collect(
                session,
                &incident.device_id,
                incident.driver_id.as_deref(),
                &window,
            )
            .await?;
        let device = self.api.device(session, &incident.device_id).await?;

        let report = self
            .builder
            .build(&session.tenant_id, incident, device.as_ref(), evidence);
        if report.severity < settings.min_severity {
            debug!(
                incident_id = %incident.id,
                severity = %report.severity,
                "below severity floor, skipping"
            );
            return Ok(false);
        }

        let compacted = self.compactor.compact(&report)?;
        self.store
            .add_envelope(session, &Envelope::Report(compacted))
            .await?;
        info!(
            incident_id = %incident.id,
            report_id = %report.id,
            severity = %report.severity,
            "persisted incident report"
        );
        Ok(true)
    }

    async fn drain_requests(
        &self,
        session: &SessionHandle,
        settings: &TenantSettings,
        shutdown: &CancellationToken,
    ) -> DomainResult<usize> {
        let lifecycle = RequestLifecycle::new(&self.store);
        let pending: Vec<ReportRequest> = self
            .store
            .list_envelopes(session, REQUEST_TAG)
            .await?
            .into_iter()
            .filter_map(|(_, envelope)| match envelope {
                Envelope::Request(request) if request.status == RequestStatus::Pending => {
                    Some(request)
                }
                _ => None,
            })
            .collect();

        let mut processed = 0;
        for request in pending {
            if shutdown.is_cancelled() {
                break;
            }
            lifecycle.mark_processing(session, &request.id).await?;
            match self.process_request(session, settings, &request).await {
                Ok((incidents_found, reports_generated)) => {
                    lifecycle
                        .mark_completed(session, &request.id, incidents_found, reports_generated)
                        .await?;
                }
                Err(e) => {
                    error!(request_id = %request.id, "request processing failed: {}", e);
                    lifecycle
                        .mark_failed(session, &request.id, &e.to_string())
                        .await?;
                }
            }
            processed += 1;
        }
        Ok(processed)
    }

    /// Returns `(incidents_found, reports_generated)` for one request.
    async fn process_request(
        &self,
        session: &SessionHandle,
        settings: &TenantSettings,
        request: &ReportRequest,
    ) -> DomainResult<(u32, u32)> {
        let incidents = self
            .api
            .search_incidents(session, &request.device_id, request.from, request.to)
            .await?;
        let matching: Vec<IncidentEvent> = incidents
            .into_iter()
            .filter(|i| settings.matches_rule(&i.rule_name))
            .collect();

        let incidents_found = matching.len() as u32;
        let mut reports_generated = 0u32;
        for incident in &matching {
            if self
                .generate_incident_report(session, settings, incident)
                .await?
            {
                reports_generated += 1;
            }
        }

        if incidents_found == 0 && request.force_report {
            self.generate_baseline_report(session, request).await?;
            reports_generated += 1;
        }

        Ok((incidents_found, reports_generated))
    }

    async fn generate_baseline_report(
        &self,
        session: &SessionHandle,
        request: &ReportRequest,
    ) -> DomainResult<()> {
        let window = EvidenceWindow::for_range(request.from, request.to);
        let evidence = self
            .collector
            .collect(session, &request.device_id, None, &window)
            .await?;
        let device = self.api.device(session, &request.device_id).await?;

        let report =
            self.builder
                .build_baseline(&session.tenant_id, request, device.as_ref(), evidence);
        let compacted = self.compactor.compact(&report)?;
        self.store
            .add_envelope(session, &Envelope::Report(compacted))
            .await?;
        info!(
            request_id = %request.id,
            report_id = %report.id,
            "persisted baseline report"
        );
        Ok(())
    }
}
