use crate::error::ApiError;
use crate::rate_limit::IpRateLimiter;
use crate::reader::ShareReportReader;
use crate::render;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use fleetguard_domain::{DocumentRenderer, EmailSender};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, instrument};

/// Shared state for the public share endpoints.
#[derive(Clone)]
pub struct ApiState {
    pub reader: Arc<ShareReportReader>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub email: Arc<dyn EmailSender>,
    pub limiter: Arc<IpRateLimiter>,
}

/// GET /r/{token}
#[instrument(skip_all)]
pub async fn view_report(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Html<String>, ApiError> {
    let report = state.reader.fetch(&token).await?;
    Ok(Html(render::report_html(&report)))
}

/// GET /r/{token}/pdf
#[instrument(skip_all, fields(client_ip = %addr.ip()))]
pub async fn download_report(
    State(state): State<ApiState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    state.limiter.check(addr.ip())?;
    let report = state.reader.fetch(&token).await?;
    let bytes = state.renderer.render(&report).await?;
    info!(report_id = %report.id, bytes = bytes.len(), "report document rendered");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"incident-{}.pdf\"", report.id),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct EmailShareRequest {
    pub email: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EmailShareResponse {
    pub status: &'static str,
}

/// POST /r/{token}/email
#[instrument(skip_all, fields(client_ip = %addr.ip()))]
pub async fn email_report(
    State(state): State<ApiState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(token): Path<String>,
    Json(body): Json<EmailShareRequest>,
) -> Result<Json<EmailShareResponse>, ApiError> {
    state.limiter.check(addr.ip())?;
    if !body.email.contains('@') {
        return Err(ApiError::InvalidRequest(
            "invalid email address".to_string(),
        ));
    }
    let report = state.reader.fetch(&token).await?;
    state
        .email
        .send_report(&report, &body.email, &body.message)
        .await?;
    info!(report_id = %report.id, "report emailed");
    Ok(Json(EmailShareResponse { status: "sent" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitConfig;
    use chrono::{Duration, TimeZone, Utc};
    use fleetguard_domain::{
        Envelope, EvidencePackage, IncidentReport, MockCredentialStore, MockDocumentRenderer,
        MockEmailSender, MockTelematicsApi, Severity, ShareTokenCodec, StoredRecord,
        TenantCredentials, REPORT_TAG,
    };

    const SECRET: &str = "test-secret";

    fn report() -> IncidentReport {
        IncidentReport {
            id: "r1".to_string(),
            incident_id: Some("i1".to_string()),
            tenant_id: "acme".to_string(),
            device_id: "device-1".to_string(),
            vehicle_name: "Truck 12".to_string(),
            driver_name: None,
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

    fn token() -> String {
        ShareTokenCodec::new(SECRET).encode("r1", "acme")
    }

    fn api_with_report() -> MockTelematicsApi {
        let body = Envelope::Report(report()).encode().unwrap();
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

    fn state(
        api: MockTelematicsApi,
        renderer: MockDocumentRenderer,
        email: MockEmailSender,
        limits: RateLimitConfig,
    ) -> ApiState {
        let mut credentials = MockCredentialStore::new();
        credentials.expect_get_credentials().returning(|tenant| {
            Ok(TenantCredentials {
                endpoint: "https://fleet.example.com".to_string(),
                database: tenant.to_string(),
                username: "svc".to_string(),
                secret: "secret".to_string(),
            })
        });
        ApiState {
            reader: Arc::new(ShareReportReader::new(
                Arc::new(credentials),
                Arc::new(api),
                ShareTokenCodec::new(SECRET),
                Duration::minutes(30),
                std::time::Duration::from_secs(60),
            )),
            renderer: Arc::new(renderer),
            email: Arc::new(email),
            limiter: Arc::new(IpRateLimiter::new(limits)),
        }
    }

    fn addr() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    #[tokio::test]
    async fn test_view_report_returns_html() {
        let state = state(
            api_with_report(),
            MockDocumentRenderer::new(),
            MockEmailSender::new(),
            RateLimitConfig::default(),
        );

        let Html(page) = view_report(State(state), Path(token())).await.unwrap();
        assert!(page.contains("Collision on Truck 12"));
    }

    #[tokio::test]
    async fn test_view_report_invalid_token_is_not_found() {
        let state = state(
            MockTelematicsApi::new(),
            MockDocumentRenderer::new(),
            MockEmailSender::new(),
            RateLimitConfig::default(),
        );

        let result = view_report(State(state), Path("bm90YXRva2Vu".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn test_view_report_missing_record_is_not_found() {
        let mut api = MockTelematicsApi::new();
        api.expect_authenticate().returning(|_| Ok("key".to_string()));
        api.expect_search_records().returning(|_, _| Ok(vec![]));
        let state = state(
            api,
            MockDocumentRenderer::new(),
            MockEmailSender::new(),
            RateLimitConfig::default(),
        );

        let result = view_report(State(state), Path(token())).await;
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn test_download_renders_document() {
        let mut renderer = MockDocumentRenderer::new();
        renderer
            .expect_render()
            .returning(|_| Ok(b"%rendered%".to_vec()));
        let state = state(
            api_with_report(),
            renderer,
            MockEmailSender::new(),
            RateLimitConfig::default(),
        );

        let response = download_report(State(state), addr(), Path(token()))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
    }

    #[tokio::test]
    async fn test_download_is_rate_limited() {
        let mut renderer = MockDocumentRenderer::new();
        renderer
            .expect_render()
            .returning(|_| Ok(b"%rendered%".to_vec()));
        let state = state(
            api_with_report(),
            renderer,
            MockEmailSender::new(),
            RateLimitConfig {
                max_requests: 1,
                ..Default::default()
            },
        );

        download_report(State(state.clone()), addr(), Path(token()))
            .await
            .unwrap();
        let second = download_report(State(state), addr(), Path(token())).await;
        assert!(matches!(second, Err(ApiError::RateLimited)));
    }

    #[tokio::test]
    async fn test_email_report_sends() {
        let mut email = MockEmailSender::new();
        email
            .expect_send_report()
            .withf(|report, recipient, _| report.id == "r1" && recipient == "ops@example.com")
            .times(1)
            .returning(|_, _, _| Ok(()));
        let state = state(
            api_with_report(),
            MockDocumentRenderer::new(),
            email,
            RateLimitConfig::default(),
        );

        let Json(response) = email_report(
            State(state),
            addr(),
            Path(token()),
            Json(EmailShareRequest {
                email: "ops@example.com".to_string(),
                message: "see attached".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status, "sent");
    }

    #[tokio::test]
    async fn test_email_report_rejects_bad_address() {
        let state = state(
            api_with_report(),
            MockDocumentRenderer::new(),
            MockEmailSender::new(),
            RateLimitConfig::default(),
        );

        let result = email_report(
            State(state),
            addr(),
            Path(token()),
            Json(EmailShareRequest {
                email: "not-an-address".to_string(),
                message: String::new(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }
}
