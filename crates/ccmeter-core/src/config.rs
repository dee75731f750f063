//! Configuration for the usage monitor and its refresh triggers

use crate::error::CoreError;
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding a comma-separated list of data roots
pub const CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

/// Default session window (matches the service's rate-limit reset cadence)
pub const DEFAULT_WINDOW_HOURS: i64 = 5;

/// Configuration for the usage monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Explicit data roots; when empty, roots are resolved from the
    /// environment and then from the default locations
    pub roots: Vec<PathBuf>,

    /// Session block window
    pub window: chrono::Duration,

    /// Retry policy for transient per-file read errors
    pub retry: RetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            window: chrono::Duration::hours(DEFAULT_WINDOW_HOURS),
            retry: RetryPolicy::default(),
        }
    }
}

impl MonitorConfig {
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    pub fn with_window_hours(mut self, hours: i64) -> Self {
        self.window = chrono::Duration::hours(hours);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window <= chrono::Duration::zero() {
            return Err(CoreError::InvalidConfig {
                message: format!(
                    "session window must be positive, got {} minutes",
                    self.window.num_minutes()
                ),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::InvalidConfig {
                message: "retry attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for the refresh trigger sources
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Quiet period after the last file event before a refresh fires
    pub debounce: Duration,

    /// Upper bound on how long a continuous burst can postpone a refresh
    pub max_debounce: Duration,

    /// Fallback refresh interval
    pub timer_interval: Duration,

    /// How often the wake detector samples the clocks
    pub wake_tick: Duration,

    /// Wall-clock jump beyond monotonic time that counts as a wake
    pub wake_threshold: Duration,

    /// How often the local date is checked for rollover
    pub day_check_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            max_debounce: Duration::from_secs(10),
            timer_interval: Duration::from_secs(60),
            wake_tick: Duration::from_secs(10),
            wake_threshold: Duration::from_secs(30),
            day_check_interval: Duration::from_secs(30),
        }
    }
}

impl RefreshConfig {
    pub fn with_timer_interval(mut self, interval: Duration) -> Self {
        self.timer_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_is_five_hours() {
        let config = MonitorConfig::default();
        assert_eq!(config.window, chrono::Duration::hours(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let config = MonitorConfig::default().with_window_hours(0);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_retry_attempts() {
        let mut config = MonitorConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
