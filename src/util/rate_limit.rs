//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max player actions per second on one session
pub const ACTION_RATE_LIMIT: u32 = 20;

/// Max match creations per second, server wide
pub const MATCH_CREATE_RATE_LIMIT: u32 = 10;

/// Per-session action limiter
#[derive(Clone)]
pub struct SessionRateLimiter {
    action_limiter: Arc<Limiter>,
}

impl SessionRateLimiter {
    pub fn new() -> Self {
        Self {
            action_limiter: create_limiter(ACTION_RATE_LIMIT),
        }
    }

    /// Check if an action message is allowed (returns true if allowed)
    pub fn check_action(&self) -> bool {
        self.action_limiter.check().is_ok()
    }
}

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
