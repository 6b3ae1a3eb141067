pub mod compactor;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod evidence;
pub mod in_memory_telematics;
pub mod lifecycle;
pub mod report_builder;
pub mod session;
pub mod share_token;
pub mod telematics;
pub mod types;

pub use compactor::{sample_trail, CompactionLimits, ReportCompactor};
pub use config::TenantSettings;
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use envelope::{Envelope, RecordStore, CONFIG_TAG, REPORT_TAG, REQUEST_TAG};
pub use error::{DomainError, DomainResult};
pub use evidence::{EvidenceCollector, EvidenceWindow};
pub use in_memory_telematics::{FixedWeatherProvider, InMemoryTelematicsApi};
pub use lifecycle::RequestLifecycle;
pub use report_builder::{classify_severity, ReportBuilder};
pub use session::SessionCache;
pub use share_token::ShareTokenCodec;
pub use telematics::{DocumentRenderer, EmailSender, TelematicsApi, WeatherProvider};
pub use types::*;

#[cfg(any(test, feature = "testing"))]
pub use credentials::MockCredentialStore;
#[cfg(any(test, feature = "testing"))]
pub use telematics::{
    MockDocumentRenderer, MockEmailSender, MockTelematicsApi, MockWeatherProvider,
};
