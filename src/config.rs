//! Configuration for the annotation engine

use std::env;
use std::time::Duration;

/// Timing configuration for save coordination
///
/// All intervals have production defaults; tests shrink them to keep the
/// suite fast.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period after the last edit before a debounced save fires.
    pub debounce: Duration,
    /// Backstop interval: saves when dirty even if the debounce never fired.
    pub autosave_interval: Duration,
    /// How long the `Saved` status is shown before reverting to `Idle`.
    pub status_reset: Duration,
    /// Delay before the single coalesced follow-up save after a busy write.
    pub followup_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            debounce: Duration::from_millis(1500),
            autosave_interval: Duration::from_secs(30),
            status_reset: Duration::from_secs(2),
            followup_delay: Duration::from_millis(250),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            debounce: millis_var("MARGINALIA_DEBOUNCE_MS", defaults.debounce),
            autosave_interval: millis_var("MARGINALIA_AUTOSAVE_MS", defaults.autosave_interval),
            status_reset: millis_var("MARGINALIA_STATUS_RESET_MS", defaults.status_reset),
            followup_delay: millis_var("MARGINALIA_FOLLOWUP_MS", defaults.followup_delay),
        }
    }
}

fn millis_var(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
