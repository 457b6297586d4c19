//! Timing and capacity tunables, loaded from environment variables.
//!
//! Every knob has a sensible default; `from_env` only fails on values
//! that are present but unparsable.

use std::env;
use std::time::Duration;

/// Session synchronization tunables.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often the host republishes `elapsedSeconds` to the store.
    /// Guest-displayed time may lag by up to this plus one round trip.
    pub publish_interval: Duration,
    /// Host-local tick cadence for advancing the timer.
    pub tick_interval: Duration,
    /// Wait between the terminal session write and physical deletion,
    /// giving every subscriber a window to observe the ended snapshot.
    pub delete_grace: Duration,
    /// Event bus buffer size per subscriber.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_millis(500),
            tick_interval: Duration::from_millis(100),
            delete_grace: Duration::from_secs(3),
            event_capacity: 64,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing variables fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            publish_interval: env_duration_ms("STUDYSYNC_PUBLISH_INTERVAL_MS", 500)?,
            tick_interval: env_duration_ms("STUDYSYNC_TICK_INTERVAL_MS", 100)?,
            delete_grace: env_duration_ms("STUDYSYNC_DELETE_GRACE_MS", 3000)?,
            event_capacity: match env::var("STUDYSYNC_EVENT_CAPACITY") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid("STUDYSYNC_EVENT_CAPACITY"))?,
                Err(_) => 64,
            },
        })
    }
}

fn env_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unparsable environment variable: {0}")]
    Invalid(&'static str),
}
