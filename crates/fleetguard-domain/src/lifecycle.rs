use crate::envelope::{Envelope, RecordStore, REQUEST_TAG};
use crate::error::DomainResult;
use crate::types::{RecordId, ReportRequest, RequestStatus, SessionHandle};
use tracing::{debug, instrument, warn};

/// Forward-only request state machine over the record store.
///
/// `Pending -> Processing -> {Completed, Failed}`; terminal states are
/// absorbing. Each transition scans the tenant's request envelopes for the
/// logical id (no secondary index exists), mutates in memory, and persists
/// via remove-then-add. A missing record means the request was deleted
/// concurrently by a user, so the transition is a silent no-op.
pub struct RequestLifecycle<'a> {
    store: &'a RecordStore,
}

impl<'a> RequestLifecycle<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    pub async fn mark_processing(
        &self,
        session: &SessionHandle,
        request_id: &str,
    ) -> DomainResult<()> {
        self.transition(session, request_id, |request| {
            request.status = RequestStatus::Processing;
        })
        .await
    }

    #[instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    pub async fn mark_completed(
        &self,
        session: &SessionHandle,
        request_id: &str,
        incidents_found: u32,
        reports_generated: u32,
    ) -> DomainResult<()> {
        self.transition(session, request_id, |request| {
            request.status = RequestStatus::Completed;
            request.incidents_found = incidents_found;
            request.reports_generated = reports_generated;
            request.error_message = None;
        })
        .await
    }

    #[instrument(skip(self, session, message), fields(tenant_id = %session.tenant_id))]
    pub async fn mark_failed(
        &self,
        session: &SessionHandle,
        request_id: &str,
        message: &str,
    ) -> DomainResult<()> {
        let message = message.to_string();
        self.transition(session, request_id, move |request| {
            request.status = RequestStatus::Failed;
            request.error_message = Some(message);
        })
        .await
    }

    async fn transition(
        &self,
        session: &SessionHandle,
        request_id: &str,
        apply: impl FnOnce(&mut ReportRequest),
    ) -> DomainResult<()> {
        let Some((record_id, mut request)) = self.find_request(session, request_id).await? else {
            debug!(request_id, "request not found, transition is a no-op");
            return Ok(());
        };

        if request.status.is_terminal() {
            warn!(
                request_id,
                status = %request.status,
                "refusing transition out of terminal state"
            );
            return Ok(());
        }

        apply(&mut request);
        self.store
            .replace_envelope(session, &record_id, &Envelope::Request(request))
            .await?;
        Ok(())
    }

    async fn find_request(
        &self,
        session: &SessionHandle,
        request_id: &str,
    ) -> DomainResult<Option<(RecordId, ReportRequest)>> {
        // Linear scan; tenant record counts stay in the low thousands
        let envelopes = self.store.list_envelopes(session, REQUEST_TAG).await?;
        Ok(envelopes.into_iter().find_map(|(id, envelope)| match envelope {
            Envelope::Request(request) if request.id == request_id => Some((id, request)),
            _ => None,
        }))
    }
}
