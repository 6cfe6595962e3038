//! Per-client rate limiting backed by `governor`
//!
//! Clients are keyed by IP address: the socket peer when the server was
//! started with connect info, otherwise the first `X-Forwarded-For` hop.
//! Requests over the quota are rejected with 429 and a `Retry-After` header.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{clock::Clock, clock::DefaultClock, DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::{config::RateLimitConfig, error::Error};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Rate limiting middleware state
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    clock: DefaultClock,
}

impl RateLimit {
    /// Build a limiter allowing `requests_per_period` per client per `period`
    ///
    /// The whole allowance is available as a burst and replenishes evenly
    /// across the period.
    pub fn new(config: &RateLimitConfig) -> Self {
        let requests = NonZeroU32::new(config.requests_per_period).unwrap_or(NonZeroU32::MIN);
        let replenish = config.period() / requests.get();
        let quota = Quota::with_period(replenish.max(Duration::from_nanos(1)))
            .unwrap_or_else(|| Quota::per_second(requests))
            .allow_burst(requests);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            clock: DefaultClock::default(),
        }
    }

    /// Check and consume one request for `key`
    pub fn check(&self, key: IpAddr) -> Result<(), Error> {
        self.limiter.check_key(&key).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            tracing::debug!(client = %key, wait_secs = wait.as_secs(), "rate limit exceeded");
            Error::RateLimited {
                retry_after_secs: wait.as_secs().max(1),
            }
        })
    }

    /// Drop state for clients whose allowance is fully replenished
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Middleware function enforcing the limit
    pub async fn middleware(
        State(rate_limit): State<Self>,
        request: Request,
        next: Next,
    ) -> Result<Response, Error> {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let key = client_key(peer, request.headers());

        rate_limit.check(key)?;
        Ok(next.run(request).await)
    }
}

/// Pick the key identifying a client
pub fn client_key(peer: Option<IpAddr>, headers: &HeaderMap) -> IpAddr {
    peer.or_else(|| {
        headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|hop| hop.trim().parse().ok())
    })
    .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
