//! Per-client request limiting for the generation API.
//!
//! Sliding window keyed by peer IP: a request is admitted when fewer than
//! `max_requests` admitted requests from the same address fall inside the
//! trailing `time_window`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use crate::error::ApiError;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<DashMap<IpAddr, Vec<Instant>>>,
    max_requests: usize,
    time_window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: Arc::new(DashMap::new()),
            max_requests,
            time_window,
        }
    }

    /// Record a request from `client` and report whether it is allowed.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut entry = self.requests.entry(client).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }

    /// Drop clients with no requests inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        self.requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.time_window);
            !times.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

/// Axum middleware rejecting over-budget clients with 429.
pub async fn limit_by_ip(
    State(limiter): State<RateLimiter>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.check(peer.ip()) {
        tracing::warn!(client = %peer.ip(), "Rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}
