//! Combined admission decision across several rate windows.

use super::window::{RateLimitRule, RateWindow};

/// A set of rate windows combined with AND semantics: every member must
/// admit before the set admits. Not internally synchronized; the owning
/// queue serializes access under its own lock.
#[derive(Debug)]
pub struct RateWindowSet {
    windows: Vec<RateWindow>,
}

impl RateWindowSet {
    /// Create a window per rule. Rules are assumed validated by the caller.
    pub fn new(rules: &[RateLimitRule]) -> Self {
        Self {
            windows: rules.iter().map(|rule| RateWindow::new(*rule)).collect(),
        }
    }

    /// Returns true if every member window admits at `now`.
    ///
    /// Vacuously true with no rules configured.
    pub fn can_admit(&self, now: u64) -> bool {
        self.windows.iter().all(|w| w.can_admit(now))
    }

    /// The longest wait among all member windows, or `None` when every
    /// member is ready now.
    pub fn time_until_ready(&self, now: u64) -> Option<u64> {
        self.windows
            .iter()
            .filter_map(|w| w.time_until_ready(now))
            .max()
    }

    /// Record one admission at `now` in every member window.
    pub fn record_admission(&mut self, now: u64) {
        for window in &mut self.windows {
            window.record_admission(now);
        }
    }
}
