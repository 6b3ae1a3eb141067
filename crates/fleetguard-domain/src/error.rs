use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Authentication failed for tenant {0}")]
    AuthenticationFailed(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Invalid share token")]
    InvalidToken,

    #[error("Upstream collaborator unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Record of {size} bytes exceeds storage limit of {limit}")]
    RecordTooLarge { size: usize, limit: usize },

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
