pub mod tenant_poller;

pub use tenant_poller::{PollSummary, TenantPoller, TenantPollerConfig};
