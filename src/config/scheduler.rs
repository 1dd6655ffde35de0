use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Periodic auto-import configuration.
///
/// When enabled, `trajan watch` runs an import pass every
/// `interval_hours`, starting immediately on the first due check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Whether periodic imports are enabled.
    #[serde(default)]
    pub enabled: bool,

    /// Hours between import passes.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Seconds between due-ness checks of the watch loop.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl SchedulerConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.interval_hours == 0 {
            return Err(ConfigError::Validation(
                "scheduler.interval_hours must be at least 1 when enabled".into(),
            ));
        }
        if self.tick_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler.tick_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Interval between completed import passes.
    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.interval_hours as i64)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_interval_hours() -> u64 {
    24
}

fn default_tick_secs() -> u64 {
    60
}
