//! Consecutive sign-in failure tracking per email.

use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEFAULT_MAX_FAILURES: usize = 5;
const DEFAULT_WINDOW_SECS: u64 = 15 * 60;
const MIN_SWEEP_AT: usize = 1024;

/// Sliding-window failure counter. Once an email collects `max_failures`
/// inside the window it is locked until the oldest failure ages out.
/// Emails whose failures have all aged out are dropped.
pub struct SignInThrottle {
    failures: HashMap<String, Vec<Instant>>,
    max_failures: usize,
    window: Duration,
    sweep_at: usize,
}

impl SignInThrottle {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_FAILURES, Duration::from_secs(DEFAULT_WINDOW_SECS))
    }

    pub fn with_limits(max_failures: usize, window: Duration) -> Self {
        Self {
            failures: HashMap::new(),
            max_failures,
            window,
            sweep_at: MIN_SWEEP_AT,
        }
    }

    pub fn is_locked(&mut self, key: &str) -> bool {
        let now = Instant::now();
        let window = self.window;
        let key = normalize(key);
        let Some(entries) = self.failures.get_mut(&key) else {
            return false;
        };
        entries.retain(|ts| now.duration_since(*ts) < window);
        if entries.is_empty() {
            self.failures.remove(&key);
            return false;
        }
        entries.len() >= self.max_failures
    }

    pub fn record_failure(&mut self, key: &str) {
        let now = Instant::now();
        if self.failures.len() >= self.sweep_at {
            self.sweep(now);
        }
        self.failures.entry(normalize(key)).or_default().push(now);
    }

    /// A successful sign-in resets the counter.
    pub fn clear(&mut self, key: &str) {
        self.failures.remove(&normalize(key));
    }

    fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.failures.retain(|_, entries| {
            entries.retain(|ts| now.duration_since(*ts) < window);
            !entries.is_empty()
        });
        self.sweep_at = (self.failures.len() * 2).max(MIN_SWEEP_AT);
    }
}

impl Default for SignInThrottle {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_after_max_failures() {
        let mut t = SignInThrottle::with_limits(2, Duration::from_secs(60));
        assert!(!t.is_locked("a@b.com"));
        t.record_failure("a@b.com");
        assert!(!t.is_locked("a@b.com"));
        t.record_failure("A@B.com ");
        assert!(t.is_locked("a@b.com"));
        assert!(!t.is_locked("other@b.com"));
    }

    #[test]
    fn clear_resets() {
        let mut t = SignInThrottle::with_limits(1, Duration::from_secs(60));
        t.record_failure("a@b.com");
        assert!(t.is_locked("a@b.com"));
        t.clear("a@b.com");
        assert!(!t.is_locked("a@b.com"));
    }

    #[test]
    fn old_failures_age_out() {
        let mut t = SignInThrottle::with_limits(1, Duration::from_millis(1));
        t.record_failure("a@b.com");
        std::thread::sleep(Duration::from_millis(5));
        assert!(!t.is_locked("a@b.com"));
        assert_eq!(t.failures.len(), 0);
    }

    #[test]
    fn aged_out_emails_are_swept() {
        let mut t = SignInThrottle::with_limits(5, Duration::from_millis(1));
        t.sweep_at = 3;
        for email in ["a@b.com", "b@b.com", "c@b.com"] {
            t.record_failure(email);
        }
        assert_eq!(t.failures.len(), 3);
        std::thread::sleep(Duration::from_millis(5));
        t.record_failure("d@b.com");
        assert_eq!(t.failures.len(), 1);
    }
}
