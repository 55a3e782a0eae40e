//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;

use crate::auth::LoginLockout;
use crate::core_state::CoreState;
use crate::models::Profile;

const DEFAULT_PER_MINUTE: u32 = 300;
const DEFAULT_PER_HOUR: u32 = 5_000;
const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific in-memory state.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub login_lockout: Arc<LoginLockout>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            login_lockout: Arc::new(LoginLockout::new()),
        }
    }

    /// Drop idle rate-limit windows and stale sign-in failures so the
    /// in-memory maps stay bounded by recent traffic.
    pub fn prune_in_memory_state(&self, now: Instant) {
        let windows = match self.rate_limiter.lock() {
            Ok(mut limiter) => limiter.prune(now),
            Err(poisoned) => poisoned.into_inner().prune(now),
        };
        let emails = self.login_lockout.prune(now);
        if windows > 0 || emails > 0 {
            tracing::debug!(windows, emails, "Pruned idle limiter state");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Session context — injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Signed-in user, injected into request extensions by the auth
/// middleware after the bearer token resolves to a live session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub profile: Profile,
    pub token: String,
}

/// `Authorization: Bearer <token>` value, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ═══════════════════════════════════════════════════════════
// Rate limiter — per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_PER_MINUTE, DEFAULT_PER_HOUR)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        let entries = self.windows.entry(key.to_string()).or_default();

        // Clean entries older than 1 hour
        entries.retain(|ts| now.saturating_duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < MINUTE)
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Remove clients with no request in the last hour. Returns how many
    /// keys were dropped.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.saturating_duration_since(*ts) < HOUR);
            !entries.is_empty()
        });
        before - self.windows.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn rate_limiter_allows_within_limit() {
        let mut limiter = RateLimiter::new();
        for _ in 0..DEFAULT_PER_MINUTE {
            assert!(limiter.check("client-1").is_ok());
        }
    }

    #[test]
    fn rate_limiter_blocks_over_minute_limit() {
        let mut limiter = RateLimiter::with_limits(2, 1000);
        assert!(limiter.check("client-1").is_ok());
        assert!(limiter.check("client-1").is_ok());
        assert_eq!(limiter.check("client-1"), Err(60));
    }

    #[test]
    fn rate_limiter_blocks_over_hour_limit() {
        let mut limiter = RateLimiter::with_limits(100, 3);
        for _ in 0..3 {
            assert!(limiter.check("client-1").is_ok());
        }
        assert_eq!(limiter.check("client-1"), Err(3600));
    }

    #[test]
    fn rate_limiter_isolates_clients() {
        let mut limiter = RateLimiter::with_limits(1, 1000);
        assert!(limiter.check("client-1").is_ok());
        assert!(limiter.check("client-2").is_ok());
        assert_eq!(limiter.check("client-1"), Err(60));
    }

    #[test]
    fn prune_forgets_idle_clients() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();
        limiter.check_at("ip:10.0.0.1", t0).unwrap();
        limiter.check_at("ip:10.0.0.2", t0 + Duration::from_secs(1800)).unwrap();
        assert_eq!(limiter.tracked_clients(), 2);

        assert_eq!(limiter.prune(t0 + Duration::from_secs(1800)), 0);
        assert_eq!(limiter.prune(t0 + HOUR), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.prune(t0 + HOUR + Duration::from_secs(1800)), 1);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn context_prune_covers_limiter_and_lockout() {
        let (_dir, core) = crate::test_support::temp_core_state();
        let ctx = ApiContext::new(Arc::new(core));
        let t0 = Instant::now();
        ctx.rate_limiter.lock().unwrap().check_at("ip:10.0.0.1", t0).unwrap();
        ctx.login_lockout.record_failure("ana@clinic.test", t0);

        ctx.prune_in_memory_state(t0 + HOUR);
        assert_eq!(ctx.rate_limiter.lock().unwrap().tracked_clients(), 0);
        assert_eq!(ctx.login_lockout.tracked(), 0);
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Bearer tok-123"));
        assert_eq!(bearer_token(&headers), Some("tok-123"));
    }
}
