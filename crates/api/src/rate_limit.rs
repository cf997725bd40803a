//! Per-client request limiting.
//!
//! A fixed window per client IP, shared by the login, tracker list and
//! public status routes.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use doctrack_common::config::RateLimitSettings;
use serde_json::json;
use tokio::sync::RwLock;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Requests seen from one client in the current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: Instant,
    hits: u32,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { remaining: u32, reset_secs: u64 },
    Reject { retry_after: u64 },
}

/// Fixed-window limiter keyed by client.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, Window>>>,
    max_requests: u32,
    period: Duration,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    #[must_use]
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self::with_limits(settings.max_requests, Duration::from_secs(settings.window_secs))
            .trusting_proxy_headers(settings.trust_proxy_headers)
    }

    #[must_use]
    pub fn with_limits(max_requests: u32, period: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            period,
            trust_proxy_headers: false,
        }
    }

    /// Key clients by forwarding headers instead of the socket peer.
    #[must_use]
    pub const fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Count a request from `client` and decide whether it may proceed.
    pub async fn hit(&self, client: &str) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let window = windows.entry(client.to_owned()).or_insert(Window {
            opened_at: now,
            hits: 0,
        });

        let mut elapsed = now.duration_since(window.opened_at);
        if elapsed >= self.period {
            *window = Window {
                opened_at: now,
                hits: 0,
            };
            elapsed = Duration::ZERO;
        }
        let reset_secs = self.period.saturating_sub(elapsed).as_secs();

        if window.hits >= self.max_requests {
            return Decision::Reject {
                retry_after: reset_secs.max(1),
            };
        }

        window.hits += 1;
        Decision::Allow {
            remaining: self.max_requests - window.hits,
            reset_secs,
        }
    }

    /// Forget clients whose window closed more than a period ago.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let horizon = self.period.saturating_mul(2);
        self.windows
            .write()
            .await
            .retain(|_, window| now.duration_since(window.opened_at) < horizon);
    }

    /// Number of clients currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }
}

/// 429 response carrying `Retry-After`.
#[derive(Debug)]
pub struct TooManyRequests {
    pub retry_after: u64,
}

impl IntoResponse for TooManyRequests {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": "RATE_LIMITED",
                "message": "Too many requests",
                "retryAfter": self.retry_after,
            }
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [
                (header::RETRY_AFTER, self.retry_after.to_string()),
                (header::CONTENT_TYPE, "application/json".to_string()),
            ],
            body.to_string(),
        )
            .into_response()
    }
}

fn header_ip(req: &Request<Body>, name: &str) -> Option<IpAddr> {
    let value = req.headers().get(name)?.to_str().ok()?;
    // X-Forwarded-For lists the originating client first.
    value.split(',').next()?.trim().parse().ok()
}

fn peer_ip(req: &Request<Body>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Client address. Forwarding headers are client-controlled, so they are
/// consulted only when a trusted proxy sets them.
fn client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        header_ip(req, "x-forwarded-for")
            .or_else(|| header_ip(req, "x-real-ip"))
            .or_else(|| peer_ip(req))
    } else {
        peer_ip(req)
    }
}

/// Reject requests over the per-client budget.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, TooManyRequests> {
    let client = client_ip(&req, limiter.trust_proxy_headers)
        .map_or_else(|| "unknown".to_string(), |ip| format!("ip:{ip}"));

    match limiter.hit(&client).await {
        Decision::Allow {
            remaining,
            reset_secs,
        } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(LIMIT_HEADER, HeaderValue::from(limiter.max_requests()));
            headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
            headers.insert(RESET_HEADER, HeaderValue::from(reset_secs));
            Ok(response)
        }
        Decision::Reject { retry_after } => {
            tracing::debug!(client = %client, retry_after, "Rate limit exceeded");
            Err(TooManyRequests { retry_after })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::with_limits(max, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_budget_is_enforced_per_client() {
        let limiter = limiter(2);

        assert!(matches!(
            limiter.hit("ip:10.0.0.1").await,
            Decision::Allow { remaining: 1, .. }
        ));
        assert!(matches!(
            limiter.hit("ip:10.0.0.1").await,
            Decision::Allow { remaining: 0, .. }
        ));
        assert!(matches!(
            limiter.hit("ip:10.0.0.1").await,
            Decision::Reject { retry_after } if retry_after > 0
        ));

        // Another client has its own window
        assert!(matches!(
            limiter.hit("ip:10.0.0.2").await,
            Decision::Allow { .. }
        ));
    }

    #[tokio::test]
    async fn test_zero_length_window_always_reopens() {
        let limiter = RateLimiter::with_limits(1, Duration::ZERO);

        limiter.hit("k").await;
        assert!(matches!(limiter.hit("k").await, Decision::Allow { .. }));
    }

    #[tokio::test]
    async fn test_purge_keeps_open_windows() {
        let limiter = limiter(10);
        limiter.hit("a").await;
        limiter.hit("b").await;

        limiter.purge_expired().await;
        assert_eq!(limiter.tracked_clients().await, 2);
    }

    fn request_from(peer: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header_behind_proxy() {
        let req = request_from(
            "10.0.0.1:5000",
            &[
                ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
                ("x-real-ip", "198.51.100.2"),
            ],
        );
        assert_eq!(client_ip(&req, true), Some("203.0.113.7".parse().unwrap()));

        let req = request_from("10.0.0.1:5000", &[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&req, true), Some("198.51.100.2".parse().unwrap()));

        let req = request_from("10.0.0.1:5000", &[]);
        assert_eq!(client_ip(&req, true), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_ignores_forwarded_header_by_default() {
        let req = request_from(
            "192.0.2.4:40000",
            &[
                ("x-forwarded-for", "203.0.113.7"),
                ("x-real-ip", "198.51.100.2"),
            ],
        );
        assert_eq!(client_ip(&req, false), Some("192.0.2.4".parse().unwrap()));

        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, false), None);
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_header_shares_one_window() {
        use axum::{Router, middleware, routing::get};
        use tower::ServiceExt;

        let limiter = RateLimiter::with_limits(1, Duration::from_secs(60));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

        let first = app
            .clone()
            .oneshot(request_from("192.0.2.4:40000", &[("x-forwarded-for", "203.0.113.1")]))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(request_from("192.0.2.4:40001", &[("x-forwarded-for", "203.0.113.2")]))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_limits_come_from_settings() {
        let limiter = RateLimiter::new(&RateLimitSettings::default());
        assert_eq!(limiter.max_requests(), 100);
        assert_eq!(limiter.period(), Duration::from_secs(900));
        assert!(!limiter.trust_proxy_headers);
    }

    #[test]
    fn test_rejection_response() {
        let response = TooManyRequests { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
