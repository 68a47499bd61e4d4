//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds for the per-message profiling decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Profile at least once per this many seconds
    #[serde(default = "default_profile_interval_secs")]
    pub profile_interval_secs: u64,

    /// Always profile messages at least this many bytes long
    #[serde(default = "default_profile_size_threshold")]
    pub profile_size_threshold: u64,

    /// Random sampling probability in `[0, 1]`
    #[serde(default = "default_profile_probability")]
    pub profile_probability: f64,
}

fn default_profile_interval_secs() -> u64 {
    60
}

fn default_profile_size_threshold() -> u64 {
    2 * 1024 * 1024
}

fn default_profile_probability() -> f64 {
    0.01
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            profile_interval_secs: 60,
            profile_size_threshold: 2 * 1024 * 1024,
            profile_probability: 0.01,
        }
    }
}

impl RuntimeConfig {
    /// Get the profiling interval as a Duration
    pub fn profile_interval(&self) -> Duration {
        Duration::from_secs(self.profile_interval_secs)
    }
}
