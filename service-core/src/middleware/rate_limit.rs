use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;

/// A cap of `limit` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub limit: u32,
    pub window: Duration,
}

impl RateWindow {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60),
        }
    }

    pub fn per_hour(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60 * 60),
        }
    }

    pub fn per_day(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl std::fmt::Display for RateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} per {}s", self.limit, self.window.as_secs())
    }
}

/// Hits counted in the current window, which opened at `started`.
#[derive(Debug, Clone, Copy)]
struct WindowCount {
    started: Instant,
    hits: u32,
}

impl WindowCount {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            hits: 0,
        }
    }

    /// Open a new window once the current one has elapsed.
    fn roll(&mut self, window: &RateWindow, now: Instant) {
        if now.saturating_duration_since(self.started) >= window.window {
            *self = Self::new(now);
        }
    }

    fn resets_in(&self, window: &RateWindow, now: Instant) -> Duration {
        (self.started + window.window).saturating_duration_since(now)
    }
}

/// Rejection produced when any window is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub window: RateWindow,
    pub retry_after: Duration,
}

/// Several fixed-window per-IP caps layered on top of each other.
///
/// Each window opens on the first request from an address and admits at most
/// `limit` requests until it elapses. A request is counted only when every
/// window admits it; all windows of one address are checked and updated under
/// the same map entry.
#[derive(Clone)]
pub struct MultiWindowRateLimiter {
    windows: Arc<Vec<RateWindow>>,
    counters: Arc<DashMap<IpAddr, Vec<WindowCount>>>,
    trust_forwarded_for: bool,
}

impl MultiWindowRateLimiter {
    pub fn new(windows: &[RateWindow], trust_forwarded_for: bool) -> Self {
        Self {
            windows: Arc::new(windows.to_vec()),
            counters: Arc::new(DashMap::new()),
            trust_forwarded_for,
        }
    }

    pub fn windows(&self) -> Vec<RateWindow> {
        self.windows.as_ref().clone()
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimitExceeded> {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut entry = self
            .counters
            .entry(ip)
            .or_insert_with(|| vec![WindowCount::new(now); self.windows.len()]);
        let counts = entry.value_mut();

        for (window, count) in self.windows.iter().zip(counts.iter_mut()) {
            count.roll(window, now);
        }

        if let Some((window, count)) = self
            .windows
            .iter()
            .zip(counts.iter())
            .find(|(window, count)| count.hits >= window.limit)
        {
            return Err(RateLimitExceeded {
                window: *window,
                retry_after: count.resets_in(window, now),
            });
        }

        for count in counts.iter_mut() {
            count.hits += 1;
        }
        Ok(())
    }

    /// Resolve the address a request should be counted against.
    pub fn client_ip(&self, request: &Request) -> Option<IpAddr> {
        if self.trust_forwarded_for {
            let forwarded_ip = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok());

            if forwarded_ip.is_some() {
                return forwarded_ip;
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }
}

/// Middleware for IP-based rate limiting across every configured window
pub async fn ip_rate_limit_middleware(
    State(limiter): State<MultiWindowRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = limiter.client_ip(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    match limiter.check(ip) {
        Ok(()) => Ok(next.run(request).await),
        Err(exceeded) => {
            tracing::warn!(
                client_ip = %ip,
                window = %exceeded.window,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            // Retry-After in whole seconds, rounded up.
            let secs = exceeded.retry_after.as_secs()
                + u64::from(exceeded.retry_after.subsec_nanos() > 0);
            Err(AppError::TooManyRequests(
                format!(
                    "Too many requests from this IP ({}). Please try again later.",
                    exceeded.window
                ),
                Some(secs.max(1)),
            ))
        }
    }
}
