//! Rate limiting for the login form.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing through the edge server.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::debug;

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Login attempts replenished per second per IP.
const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();

/// Login attempts a single IP may make back to back.
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Rate limiting state for `POST /login`.
pub struct LoginRateLimit {
    limiter: IpLimiter,
    /// Key on the first `X-Forwarded-For` entry instead of the socket peer.
    pub trust_forwarded_for: bool,
}

impl LoginRateLimit {
    /// 5 attempts per IP, refilled at one per second.
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self::with_quota(
            Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            trust_forwarded_for,
        )
    }

    pub fn with_quota(quota: Quota, trust_forwarded_for: bool) -> Self {
        Self {
            limiter: RateLimiter::keyed(quota),
            trust_forwarded_for,
        }
    }

    pub fn check(&self, ip: &str) -> bool {
        self.limiter.check_key(&ip.to_string()).is_ok()
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<LoginRateLimit>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.trust_forwarded_for) {
        Ok(ip) => ip,
        Err(reason) => {
            debug!(reason, "Rejecting login without a client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    if config.check(&ip) {
        next.run(request).await
    } else {
        debug!(ip = %ip, "Login rate limit hit");
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many login attempts. Please wait before trying again.",
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let limit = LoginRateLimit::new(false);
        for _ in 0..LOGIN_BURST.get() {
            assert!(limit.check("203.0.113.7"));
        }
        assert!(!limit.check("203.0.113.7"));
    }

    #[test]
    fn test_limits_are_per_ip() {
        let limit = LoginRateLimit::with_quota(
            Quota::per_minute(NonZeroU32::new(1).unwrap()),
            false,
        );
        assert!(limit.check("203.0.113.7"));
        assert!(!limit.check("203.0.113.7"));
        assert!(limit.check("198.51.100.2"));
    }
}
