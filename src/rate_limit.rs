//! Per-IP request throttling for the login, registration and booking routes.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::{config::RateLimitConfig, error::AppError};

pub struct RouteLimiter {
    name: &'static str,
    limiter: Option<DefaultKeyedRateLimiter<IpAddr>>,
    message: &'static str,
}

impl RouteLimiter {
    pub fn new(name: &'static str, max: u32, window: Duration, message: &'static str) -> Self {
        Self {
            name,
            limiter: Some(RateLimiter::keyed(window_quota(max, window))),
            message,
        }
    }

    pub fn disabled(name: &'static str) -> Self {
        Self {
            name,
            limiter: None,
            message: "",
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), AppError> {
        match &self.limiter {
            Some(limiter) if limiter.check_key(&ip).is_err() => {
                warn!(route = self.name, %ip, "rate limit exceeded");
                Err(AppError::TooManyRequests(self.message.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// At most `max` requests in any `window`. The burst refills one request per
/// `window`, so a drained client waits a full window for its next request.
pub(crate) fn window_quota(max: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

#[derive(Clone)]
pub struct RateLimits {
    pub login: Arc<RouteLimiter>,
    pub register: Arc<RouteLimiter>,
    pub booking: Arc<RouteLimiter>,
}

impl RateLimits {
    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        if !cfg.enabled {
            return Self {
                login: Arc::new(RouteLimiter::disabled("login")),
                register: Arc::new(RouteLimiter::disabled("register")),
                booking: Arc::new(RouteLimiter::disabled("booking")),
            };
        }
        Self {
            login: Arc::new(RouteLimiter::new(
                "login",
                5,
                Duration::from_secs(15 * 60),
                "Too many login attempts from this IP, please try again after 15 minutes.",
            )),
            register: Arc::new(RouteLimiter::new(
                "register",
                3,
                Duration::from_secs(60 * 60),
                "Too many registration attempts from this IP, please try again after an hour.",
            )),
            booking: Arc::new(RouteLimiter::new(
                "booking",
                10,
                Duration::from_secs(15 * 60),
                "Too many booking requests from this IP, please try again later.",
            )),
        }
    }
}

pub async fn enforce(
    State(limiter): State<Arc<RouteLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if let Err(e) = limiter.check(ip) {
        return e.into_response();
    }
    next.run(req).await
}

/// Peer address from the connection; requests without one share a single bucket.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
