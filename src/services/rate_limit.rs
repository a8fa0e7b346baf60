//! Brute-force throttling for authentication attempts.
//!
//! Failed attempts are counted in fixed windows, keyed per subject and per
//! source. Exceeding the limit locks the key for a configured period;
//! while locked, attempts are rejected with `RateLimited` before any
//! credential is even looked at, so the rejection carries no signal about
//! credential correctness.
//!
//! All state lives behind one mutex; updates to a key are atomic with
//! respect to concurrent attempts against the same key. Time is passed in
//! by the `_at` variants so behavior is deterministic under test; the
//! public wrappers use the wall clock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Failures tolerated within one window before the key locks.
    pub max_attempts: u32,
    pub window_seconds: u64,
    pub lockout_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            lockout_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AttemptWindow {
    window_start: i64,
    failures: u32,
    locked_until: Option<i64>,
}

pub struct AuthRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, AttemptWindow>>,
}

impl AuthRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Fails with `RateLimited` when the subject or the source is locked.
    pub fn check(&self, subject: &str, source: Option<&str>) -> Result<(), AuthError> {
        self.check_at(subject, source, Utc::now().timestamp())
    }

    pub fn record_failure(&self, subject: &str, source: Option<&str>) {
        self.record_failure_at(subject, source, Utc::now().timestamp());
    }

    pub fn record_success(&self, subject: &str) {
        let Ok(mut windows) = self.windows.lock() else {
            return;
        };
        windows.remove(&subject_key(subject));
    }

    pub(crate) fn check_at(
        &self,
        subject: &str,
        source: Option<&str>,
        now_unix: i64,
    ) -> Result<(), AuthError> {
        // A limiter that cannot be consulted fails closed.
        let mut windows = self.windows.lock().map_err(|_| AuthError::Internal)?;

        for key in keys(subject, source) {
            let Some(window) = windows.get(&key).copied() else {
                continue;
            };
            match window.locked_until {
                Some(until) if until > now_unix => {
                    return Err(AuthError::RateLimited {
                        retry_after_seconds: (until - now_unix) as u64,
                    });
                }
                Some(_) => {
                    // Lockout expired; the key starts clean.
                    windows.remove(&key);
                }
                None => {}
            }
        }
        Ok(())
    }

    pub(crate) fn record_failure_at(&self, subject: &str, source: Option<&str>, now_unix: i64) {
        let Ok(mut windows) = self.windows.lock() else {
            return;
        };

        for key in keys(subject, source) {
            let window = windows.entry(key).or_insert(AttemptWindow {
                window_start: now_unix,
                failures: 0,
                locked_until: None,
            });
            if now_unix - window.window_start >= self.config.window_seconds as i64 {
                window.window_start = now_unix;
                window.failures = 0;
            }
            window.failures += 1;
            if window.failures >= self.config.max_attempts {
                window.locked_until = Some(now_unix + self.config.lockout_seconds as i64);
            }
        }
    }
}

fn subject_key(subject: &str) -> String {
    format!("subject:{}", subject.to_ascii_lowercase())
}

fn keys(subject: &str, source: Option<&str>) -> Vec<String> {
    let mut keys = vec![subject_key(subject)];
    if let Some(source) = source {
        keys.push(format!("source:{source}"));
    }
    keys
}
