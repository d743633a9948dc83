//! Configuration for the Floodgate scheduler.

use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};
use crate::ratelimit::RateLimitRule;

/// Scheduler configuration.
///
/// Values are explicit per instance; nothing here is shared between
/// scheduler instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Credentials rotated round-robin across invocations. Empty means no
    /// credential is injected into tasks.
    #[serde(default)]
    pub credentials: Vec<String>,

    /// Throughput rules, all of which must admit before a task is
    /// dequeued. Empty means unrestricted throughput.
    #[serde(default)]
    pub rate_limits: Vec<RateLimitRule>,

    /// Maximum number of queued tasks. `None` means unbounded.
    #[serde(default)]
    pub queue_limit: Option<usize>,

    /// Number of worker threads
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Poller re-check interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            credentials: Vec::new(),
            rate_limits: Vec::new(),
            queue_limit: None,
            num_threads: default_num_threads(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_num_threads() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl SchedulerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SchedulerConfig = serde_yaml::from_str(&contents)
            .map_err(|e| FloodgateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed rate rules and a zero-sized worker pool.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rate_limits {
            rule.validate()?;
        }
        if self.num_threads == 0 {
            return Err(FloodgateError::Config(
                "num_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
