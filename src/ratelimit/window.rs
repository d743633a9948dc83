//! Rolling fixed-window counter enforcing a single throughput rule.

use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};

/// A single throughput rule: at most `max_count` admissions per
/// `window_seconds` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Maximum admissions allowed within the window
    pub max_count: u32,
    /// Length of the rolling window, in whole seconds
    pub window_seconds: u64,
}

impl RateLimitRule {
    /// Create a new rule.
    pub fn new(max_count: u32, window_seconds: u64) -> Self {
        Self {
            max_count,
            window_seconds,
        }
    }

    /// Reject non-positive counts or windows.
    pub fn validate(&self) -> Result<()> {
        if self.max_count == 0 || self.window_seconds == 0 {
            return Err(FloodgateError::Config(format!(
                "rate limit rule must have a positive count and window, got ({}, {})",
                self.max_count, self.window_seconds
            )));
        }
        Ok(())
    }

    /// Scale the admission count by a factor, leaving the window untouched.
    ///
    /// Used when several independent credentials multiply the aggregate
    /// throughput available under this rule.
    pub(crate) fn scaled(&self, factor: u32) -> Self {
        Self {
            max_count: self.max_count.saturating_mul(factor),
            window_seconds: self.window_seconds,
        }
    }
}

/// Admission counter for one rule over one rolling fixed window.
///
/// Time is passed in as epoch seconds, rounded up by the caller. The window
/// starts lazily on the first recorded admission and resets whenever a full
/// `window_seconds` has elapsed since it started. Reads never mutate state:
/// an expired window is simply treated as if it had already been reset.
#[derive(Debug)]
pub struct RateWindow {
    limit: u32,
    window_seconds: u64,
    count: u32,
    window_start: Option<u64>,
}

impl RateWindow {
    /// Create a new window for the given rule.
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            limit: rule.max_count,
            window_seconds: rule.window_seconds,
            count: 0,
            window_start: None,
        }
    }

    fn expired(&self, now: u64) -> bool {
        matches!(self.window_start, Some(start) if now.saturating_sub(start) >= self.window_seconds)
    }

    /// Returns true if an admission would stay within the limit at `now`.
    pub fn can_admit(&self, now: u64) -> bool {
        if self.expired(now) {
            // A fresh window always has room; the limit is positive.
            return true;
        }
        self.count < self.limit
    }

    /// Seconds until the next admission becomes possible.
    ///
    /// `None` means ready now: the window is uninitialized, expired, or still
    /// under its limit.
    pub fn time_until_ready(&self, now: u64) -> Option<u64> {
        if self.expired(now) {
            return None;
        }
        match self.window_start {
            Some(start) if self.count >= self.limit => {
                Some(self.window_seconds - now.saturating_sub(start))
            }
            _ => None,
        }
    }

    /// Record one admission at `now`, lazily starting the window and
    /// resetting it first if it has expired.
    pub fn record_admission(&mut self, now: u64) {
        match self.window_start {
            None => self.window_start = Some(now),
            Some(start) if now.saturating_sub(start) >= self.window_seconds => {
                self.window_start = Some(now);
                self.count = 0;
            }
            Some(_) => {}
        }
        self.count += 1;
    }

    /// Current admission count within the window.
    pub fn count(&self) -> u32 {
        self.count
    }
}
