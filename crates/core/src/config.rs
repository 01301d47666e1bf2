// Tunables for the engine and the ticker

use std::time::Duration;

/// How long the playback thread sleeps between checks when nothing happens
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Display refresh period
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Playback engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on how long the playback thread waits before re-checking
    /// the line. Also bounds how long `stop` can take to be observed.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Progress ticker configuration
#[derive(Debug, Clone)]
pub struct TickerConfig {
    pub interval: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}
