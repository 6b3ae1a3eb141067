use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Run mode: poll (single poller pass), serve (share server only),
    /// all (poll loop plus share server)
    #[serde(default = "default_run_mode")]
    pub run_mode: String,

    // Poller configuration
    /// Seconds between poller passes in `all` mode
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Evidence window before the incident start, in seconds
    #[serde(default = "default_window_before_secs")]
    pub window_before_secs: i64,

    /// Evidence window after the incident end, in seconds
    #[serde(default = "default_window_after_secs")]
    pub window_after_secs: i64,

    /// Cached tenant sessions expire after this many minutes
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,

    // Compaction configuration
    /// Maximum GPS points kept in a persisted report
    #[serde(default = "default_max_trail_points")]
    pub max_trail_points: usize,

    /// Maximum diagnostic readings kept in a persisted report
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,

    /// Hard byte ceiling for a persisted report record
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,

    // Share configuration
    /// Signing secret for share tokens (required for production)
    #[serde(default = "default_share_secret")]
    pub share_secret: String,

    /// Base URL share links are built against
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    // HTTP configuration
    /// Share server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Share server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Resolved reports stay cached for this many seconds
    #[serde(default = "default_report_cache_ttl_secs")]
    pub report_cache_ttl_secs: u64,

    // Rate limit configuration
    /// Requests allowed per source IP within the window
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Rate limit window in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_run_mode() -> String {
    "all".to_string()
}

// Poller defaults
fn default_poll_interval_secs() -> u64 {
    60
}

fn default_window_before_secs() -> i64 {
    300
}

fn default_window_after_secs() -> i64 {
    120
}

fn default_session_ttl_minutes() -> i64 {
    30
}

// Compaction defaults
fn default_max_trail_points() -> usize {
    120
}

fn default_max_diagnostics() -> usize {
    10
}

fn default_max_record_bytes() -> usize {
    10_000
}

// Share defaults
fn default_share_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

// HTTP defaults
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_report_cache_ttl_secs() -> u64 {
    60
}

// Rate limit defaults
fn default_rate_limit_max_requests() -> u32 {
    30
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FLEETGUARD"))
            .build()?
            .try_deserialize()
    }
}
