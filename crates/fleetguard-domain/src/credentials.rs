use crate::error::{DomainError, DomainResult};
use crate::types::TenantCredentials;
use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves tenant identifiers to connection credentials.
///
/// Credential persistence is an external concern; implementations wrap
/// whatever secret store the deployment uses.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up connection credentials for one tenant
    async fn get_credentials(&self, tenant_id: &str) -> DomainResult<TenantCredentials>;

    /// Enumerate all known tenants
    async fn list_tenants(&self) -> DomainResult<Vec<String>>;
}

/// In-memory implementation of CredentialStore backed by a HashMap
pub struct InMemoryCredentialStore {
    tenants: HashMap<String, TenantCredentials>,
}

impl InMemoryCredentialStore {
    pub fn new(tenants: HashMap<String, TenantCredentials>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_credentials(&self, tenant_id: &str) -> DomainResult<TenantCredentials> {
        self.tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| DomainError::AuthenticationFailed(tenant_id.to_string()))
    }

    async fn list_tenants(&self) -> DomainResult<Vec<String>> {
        let mut ids: Vec<String> = self.tenants.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials(database: &str) -> TenantCredentials {
        TenantCredentials {
            endpoint: "https://fleet.example.com".to_string(),
            database: database.to_string(),
            username: "svc-reports".to_string(),
            secret: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_credentials_known_tenant() {
        let mut tenants = HashMap::new();
        tenants.insert("acme".to_string(), test_credentials("acme"));
        let store = InMemoryCredentialStore::new(tenants);

        let creds = store.get_credentials("acme").await.unwrap();
        assert_eq!(creds.database, "acme");
    }

    #[tokio::test]
    async fn test_get_credentials_unknown_tenant_fails_auth() {
        let store = InMemoryCredentialStore::new(HashMap::new());
        let result = store.get_credentials("ghost").await;
        assert!(matches!(
            result,
            Err(crate::error::DomainError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_list_tenants_sorted() {
        let mut tenants = HashMap::new();
        tenants.insert("zeta".to_string(), test_credentials("zeta"));
        tenants.insert("acme".to_string(), test_credentials("acme"));
        let store = InMemoryCredentialStore::new(tenants);

        assert_eq!(store.list_tenants().await.unwrap(), vec!["acme", "zeta"]);
    }
}
