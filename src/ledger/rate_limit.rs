//! Outbound request pacing around governor.
//!
//! Third-party RPC providers enforce per-key request quotas; every call made
//! by [`super::RpcLedger`] waits here first.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::debug;

/// Direct (unkeyed) rate limiter shared by all calls on one connection.
pub struct RpcRateLimiter {
    limiter: DefaultDirectRateLimiter,
    requests_per_second: u32,
}

impl RpcRateLimiter {
    /// Create a limiter allowing `requests_per_second` calls. Zero is treated as one.
    pub fn new(requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            requests_per_second: per_second.get(),
        }
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!("RPC quota of {}/s reached, waiting", self.requests_per_second);
            self.limiter.until_ready().await;
        }
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }
}
