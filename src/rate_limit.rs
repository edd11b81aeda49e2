//! Per-client sliding-window request limiting.
//!
//! Process-local: every replica keeps its own windows, so the effective
//! limit behind a load balancer is `limit * replicas`.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::{config::RateLimitConfig, error::ApiError, state::AppState};

/// Sliding-window limiter keyed by client (usually the peer IP).
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Admits or rejects one request from `key` at `now`.
    ///
    /// Pruning and appending happen while holding the entry's shard lock, so
    /// concurrent callers with the same key see them as one step.
    pub fn admit(&self, key: &str, now: Instant) -> bool {
        let mut times = self.windows.entry(key.to_owned()).or_default();
        evict_expired(&mut times, now, self.window);
        if times.len() >= self.limit {
            return false;
        }
        times.push_back(now);
        true
    }

    /// Drops expired timestamps everywhere and forgets idle clients.
    pub fn prune(&self, now: Instant) {
        self.windows.retain(|_, times| {
            evict_expired(times, now, self.window);
            !times.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

fn evict_expired(times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = times.front() {
        if now.saturating_duration_since(oldest) < window {
            break;
        }
        times.pop_front();
    }
}

/// Client key: peer IP without the port, so reconnecting does not reset the window.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&request);
    if !state.limiter.admit(&key, Instant::now()) {
        warn!(client = %key, "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn admits_up_to_limit_then_rejects_until_window_passes() {
        let limiter = RateLimiter::new(3, MINUTE);
        let t0 = Instant::now();

        assert!(limiter.admit("10.0.0.1", t0));
        assert!(limiter.admit("10.0.0.1", t0 + Duration::from_secs(1)));
        assert!(limiter.admit("10.0.0.1", t0 + Duration::from_secs(2)));
        assert!(!limiter.admit("10.0.0.1", t0 + Duration::from_secs(30)));

        assert!(limiter.admit("10.0.0.1", t0 + MINUTE + Duration::from_secs(1)));
    }

    #[test]
    fn rejected_attempts_do_not_extend_the_window() {
        let limiter = RateLimiter::new(1, MINUTE);
        let t0 = Instant::now();
        assert!(limiter.admit("k", t0));
        for s in 1..59 {
            assert!(!limiter.admit("k", t0 + Duration::from_secs(s)));
        }
        assert!(limiter.admit("k", t0 + MINUTE));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, MINUTE);
        let t0 = Instant::now();
        assert!(limiter.admit("a", t0));
        assert!(!limiter.admit("a", t0));
        assert!(limiter.admit("b", t0));
    }

    #[test]
    fn prune_forgets_idle_clients() {
        let limiter = RateLimiter::new(5, MINUTE);
        let t0 = Instant::now();
        limiter.admit("old", t0);
        limiter.admit("fresh", t0 + Duration::from_secs(50));
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.prune(t0 + Duration::from_secs(70));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_limit() {
        let limiter = RateLimiter::new(50, MINUTE);
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..20).filter(|_| limiter.admit("shared", now)).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
