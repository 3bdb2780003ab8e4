/// Rate limiting for credential endpoints
///
/// Each client IP gets its own bucket. The IP is taken from
/// `X-Forwarded-For` (first hop), then `X-Real-IP`, then the peer address.
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

/// Fallback when the configured rate is zero
const DEFAULT_AUTH_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(30) {
    Some(n) => n,
    None => unreachable!(),
};

/// Per-client limiter for login, forgot-password, verify-otp and reset-password
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    auth: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute =
            NonZeroU32::new(config.auth_requests_per_minute).unwrap_or(DEFAULT_AUTH_PER_MINUTE);

        Self {
            enabled: config.enabled,
            auth: Arc::new(GovernorLimiter::keyed(Quota::per_minute(per_minute))),
        }
    }

    /// Check the credential-endpoint limit for one client
    pub fn check_auth(&self, client: IpAddr) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.auth
            .check_key(&client)
            .map_err(|_| AppError::RateLimitExceeded)
    }

    /// Drop buckets that have refilled completely
    pub fn prune(&self) {
        self.auth.retain_recent();
        self.auth.shrink_to_fit();
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.auth.len()
    }
}

/// Path suffixes of the credential routes under `/api/auth`, `/api/user` and `/api/admin`
const CREDENTIAL_ROUTES: [&str; 4] = [
    "/login",
    "/forgot-password",
    "/verify-otp",
    "/reset-password",
];

/// Whether a request path is subject to the credential limit
pub fn is_credential_route(path: &str) -> bool {
    path.starts_with("/api/") && CREDENTIAL_ROUTES.iter().any(|suffix| path.ends_with(suffix))
}

/// Client IP from proxy headers, falling back to the peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };

    forwarded
        .or_else(real_ip)
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Rate limiting middleware; only credential routes are counted
pub async fn limit_auth_requests(
    State(ctx): State<AppContext>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_credential_route(request.uri().path()) {
        let peer = connect_info.map(|ConnectInfo(addr)| addr);

        match client_ip(request.headers(), peer) {
            Some(ip) => {
                if let Err(e) = ctx.rate_limiter.check_auth(ip) {
                    tracing::warn!("Rate limit exceeded for {} on {}", ip, request.uri().path());
                    return Err(e);
                }
            }
            None => {
                tracing::warn!("Cannot determine client IP for rate limiting, allowing request");
            }
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter(enabled: bool, per_minute: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled,
            auth_requests_per_minute: per_minute,
        })
    }

    #[test]
    fn test_burst_then_limited() {
        let limiter = limiter(true, 3);

        for _ in 0..3 {
            assert!(limiter.check_auth(ip(1)).is_ok());
        }
        assert!(matches!(
            limiter.check_auth(ip(1)),
            Err(AppError::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_clients_do_not_share_quota() {
        let limiter = limiter(true, 2);

        assert!(limiter.check_auth(ip(1)).is_ok());
        assert!(limiter.check_auth(ip(1)).is_ok());
        assert!(limiter.check_auth(ip(1)).is_err());

        // A different client still has its full quota
        assert!(limiter.check_auth(ip(2)).is_ok());
        assert!(limiter.check_auth(ip(2)).is_ok());
        assert!(limiter.check_auth(ip(2)).is_err());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_many_clients_one_attempt_each() {
        let limiter = limiter(true, 5);

        let denied = (0..=200u8)
            .filter(|n| limiter.check_auth(ip(*n)).is_err())
            .count();
        assert_eq!(denied, 0);
    }

    #[test]
    fn test_disabled_never_limits() {
        let limiter = limiter(false, 1);

        for _ in 0..10 {
            assert!(limiter.check_auth(ip(1)).is_ok());
        }
    }

    #[test]
    fn test_prune_keeps_limited_clients() {
        let limiter = limiter(true, 1);

        assert!(limiter.check_auth(ip(1)).is_ok());
        limiter.prune();
        assert!(limiter.check_auth(ip(1)).is_err());
    }

    #[test]
    fn test_credential_routes() {
        assert!(is_credential_route("/api/auth/login"));
        assert!(is_credential_route("/api/user/verify-otp"));
        assert!(is_credential_route("/api/admin/reset-password"));
        assert!(!is_credential_route("/api/auth/register"));
        assert!(!is_credential_route("/api/user/change-password"));
        assert!(!is_credential_route("/health"));
    }

    #[test]
    fn test_client_ip_order() {
        let peer: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), Some(peer.ip()));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            client_ip(&headers, Some(peer)),
            "198.51.100.2".parse::<IpAddr>().ok()
        );

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(
            client_ip(&headers, Some(peer)),
            "203.0.113.9".parse::<IpAddr>().ok()
        );
    }

    #[test]
    fn test_zero_rate_falls_back() {
        let limiter = limiter(true, 0);
        assert!(limiter.check_auth(ip(1)).is_ok());
    }
}
