//! # Middleware Module
//!
//! Global rate limiting for the ontogate HTTP API, independent of the
//! per-key quota bookkeeping in [`auth`](super::auth).
//!
//! ## Configuration
//!
//! - `ONTOGATE_RATE_LIMIT`: requests per second (default: 100, 0 disables)

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default rate limit: 100 requests per second.
const DEFAULT_RPS: NonZeroU32 = NonZeroU32::new(100).unwrap();

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new global rate limiter; 0 falls back to the default.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Read `ONTOGATE_RATE_LIMIT`, defaulting to 100.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("ONTOGATE_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

/// Rate limiting middleware; 429 when the global limit is exceeded.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    match limiter.check() {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!("rate limit exceeded");
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_first_request() {
        let limiter = create_rate_limiter(50);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn zero_falls_back_to_default() {
        let limiter = create_rate_limiter(0);
        assert!(limiter.check().is_ok());
    }
}
