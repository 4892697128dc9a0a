//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::authorization::Actor;
use crate::core_state::CoreState;
use crate::models::UserProfile;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus the request rate limiter.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self::with_limiter(core, RateLimiter::new())
    }

    pub fn with_limiter(core: Arc<CoreState>, limiter: RateLimiter) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(limiter)),
        }
    }

    pub fn open_db(&self) -> Result<Connection, ApiError> {
        Ok(self.core.open_db()?)
    }
}

// ═══════════════════════════════════════════════════════════
// User context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Signed-in caller, injected into request extensions by the auth
/// middleware after the bearer token resolved to an active account.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub actor: Actor,
    pub profile: UserProfile,
    pub token: String,
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-caller sliding window
// ═══════════════════════════════════════════════════════════

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
const MIN_SWEEP_AT: usize = 1024;

/// Per-caller rate limiter with per-minute and per-hour limits.
///
/// A caller with no request inside the hourly window is forgotten. Stale
/// callers are swept once the map doubles in size since the last sweep.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    window: Duration,
    sweep_at: usize,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            window: HOUR,
            sweep_at: MIN_SWEEP_AT,
        }
    }

    /// Check if a caller is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        if self.windows.len() >= self.sweep_at {
            self.sweep(now);
        }

        let window = self.window;
        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < window);

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < MINUTE)
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

    fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.duration_since(*ts) < window);
            !entries.is_empty()
        });
        self.sweep_at = (self.windows.len() * 2).max(MIN_SWEEP_AT);
    }

    #[cfg(test)]
    fn with_window(mut self, window: Duration, sweep_at: usize) -> Self {
        self.window = window;
        self.sweep_at = sweep_at;
        self
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
