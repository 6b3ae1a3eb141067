use crate::credentials::CredentialStore;
use crate::error::{DomainError, DomainResult};
use crate::telematics::TelematicsApi;
use crate::types::SessionHandle;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Caches authenticated sessions per tenant for a bounded TTL.
///
/// The TTL is deliberately shorter than the remote session's real lifetime
/// so a handle handed out near expiry cannot race the remote side. Expired
/// entries are simply replaced; there is no invalidation API.
pub struct SessionCache {
    credentials: Arc<dyn CredentialStore>,
    api: Arc<dyn TelematicsApi>,
    ttl: Duration,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionCache {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn TelematicsApi>,
        ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            api,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live session for the tenant, authenticating on cache miss or
    /// expiry. One outbound authentication call per miss.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_session(&self, tenant_id: &str) -> DomainResult<SessionHandle> {
        let mut sessions = self.sessions.lock().await;

        if let Some(handle) = sessions.get(tenant_id) {
            if Utc::now() < handle.expires_at {
                debug!("session cache hit");
                return Ok(handle.clone());
            }
            debug!("cached session expired, re-authenticating");
        }

        let credentials = self
            .credentials
            .get_credentials(tenant_id)
            .await
            .map_err(|_| DomainError::AuthenticationFailed(tenant_id.to_string()))?;

        let api_key = self
            .api
            .authenticate(&credentials)
            .await
            .map_err(|_| DomainError::AuthenticationFailed(tenant_id.to_string()))?;

        let handle = SessionHandle {
            tenant_id: tenant_id.to_string(),
            api_key,
            expires_at: Utc::now() + self.ttl,
        };
        sessions.insert(tenant_id.to_string(), handle.clone());

        debug!("authenticated new session");
        Ok(handle)
    }
}
