use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleetguard_domain::DomainError;
use thiserror::Error;

/// Errors surfaced by the public share endpoints.
///
/// Every failure on the read path collapses to the same 404 response so the
/// token space cannot be probed: a malformed token, an unknown report and a
/// tenant that no longer authenticates are indistinguishable to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("report not found")]
    NotFound,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("too many requests")]
    RateLimited,
    #[error("upstream unavailable")]
    Upstream,
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidToken
            | DomainError::ReportNotFound(_)
            | DomainError::AuthenticationFailed(_)
            | DomainError::MalformedRecord(_) => ApiError::NotFound,
            _ => ApiError::Upstream,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}
