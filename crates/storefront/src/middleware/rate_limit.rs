//! Rate limiting with `governor` via `tower_governor`.
//!
//! - `login_rate_limiter`: sign-in attempts (~10/min per IP)
//! - `account_rate_limiter`: subscription mutations and review posts (~30/min per IP)

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor reading the client IP set by the fronting proxy.
///
/// Checks `CF-Connecting-IP`, then the first `X-Forwarded-For` hop, then
/// `X-Real-IP`.
#[derive(Clone, Copy)]
pub struct ForwardedIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ForwardedIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();
        let header_ip = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        };

        header_ip("cf-connecting-ip")
            .or_else(|| header_ip("x-forwarded-for"))
            .or_else(|| header_ip("x-real-ip"))
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

pub type RateLimiterLayer =
    GovernorLayer<ForwardedIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// ~10 sign-in attempts per minute per IP (one token every 6 s, burst 5).
///
/// # Panics
///
/// Never: the period and burst are non-zero constants.
#[must_use]
pub fn login_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ForwardedIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("per_second(6) and burst_size(5) are non-zero");
    GovernorLayer::new(Arc::new(config))
}

/// ~30 account mutations per minute per IP (one token every 2 s, burst 10).
///
/// # Panics
///
/// Never: the period and burst are non-zero constants.
#[must_use]
pub fn account_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ForwardedIpKeyExtractor)
        .per_second(2)
        .burst_size(10)
        .finish()
        .expect("per_second(2) and burst_size(10) are non-zero");
    GovernorLayer::new(Arc::new(config))
}
