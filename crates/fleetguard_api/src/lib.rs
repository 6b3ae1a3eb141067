pub mod collaborators;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod reader;
pub mod render;
pub mod server;

pub use collaborators::{LogEmailSender, PlainTextRenderer};
pub use error::ApiError;
pub use handlers::ApiState;
pub use rate_limit::{IpRateLimiter, RateLimitConfig};
pub use reader::ShareReportReader;
pub use server::{run_http_server, HttpServerConfig};
