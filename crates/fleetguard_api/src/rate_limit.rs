use crate::error::ApiError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per source IP within the window
    pub max_requests: u32,
    /// Sliding window size in seconds
    pub window_secs: u64,
    /// Run cleanup every N requests
    pub cleanup_interval: u64,
    /// Hard cap on unique IPs tracked; new IPs beyond it are rejected
    pub max_tracked_ips: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
            cleanup_interval: 100,
            max_tracked_ips: 10_000,
        }
    }
}

/// Sliding-window rate limiter keyed by source IP.
///
/// Tracks request timestamps per IP and rejects requests beyond the window
/// quota. Expired entries are pruned every `cleanup_interval` requests, and
/// `max_tracked_ips` bounds the map so spoofed source addresses cannot grow
/// it without limit.
pub struct IpRateLimiter {
    config: RateLimitConfig,
    state: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    request_count: AtomicU64,
}

impl IpRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// Record one request from `ip`, rejecting it when over quota or when
    /// the tracked-IP cap is reached for a new address.
    pub fn check(&self, ip: IpAddr) -> Result<(), ApiError> {
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_secs);
        let cutoff = now.checked_sub(window).unwrap_or(now);

        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % self.config.cleanup_interval == 0 {
            debug!(request_count = count, "pruning rate limiter state");
            self.cleanup();
        }

        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !state.contains_key(&ip) && state.len() >= self.config.max_tracked_ips {
            // Try to reclaim expired entries before rejecting the new IP
            state.retain(|_, timestamps| {
                timestamps.retain(|&t| t > cutoff);
                !timestamps.is_empty()
            });
            if state.len() >= self.config.max_tracked_ips {
                warn!(ip = %ip, tracked = state.len(), "tracked IP cap reached");
                return Err(ApiError::RateLimited);
            }
        }

        let timestamps = state.entry(ip).or_default();
        timestamps.retain(|&t| t > cutoff);
        if timestamps.len() >= self.config.max_requests as usize {
            warn!(
                ip = %ip,
                requests = timestamps.len(),
                max = self.config.max_requests,
                "rate limit exceeded"
            );
            return Err(ApiError::RateLimited);
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drop IPs with no requests inside the current window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_secs);
        let cutoff = now.checked_sub(window).unwrap_or(now);

        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.retain(|_, timestamps| {
            timestamps.retain(|&t| t > cutoff);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_ips(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
