//! Configuration for the republisher's sweep cadence and the channel name
//! used for fan-out publication.

use std::time::Duration;

/// Logical pub/sub channel name subscribers listen on (§6.3).
pub const TRANLOG_REPORT_CHANNEL: &str = "tranlog_report";

#[derive(Debug, Clone)]
pub struct EventConfig {
    /// How often the republisher wakes to sweep for stale deliveries.
    pub check_interval: Duration,
    /// How far back the sweep looks before giving up on an event.
    pub check_period: Duration,
    /// Grace period after publication before a pending entry is eligible
    /// for republication.
    pub check_failed_grace: Duration,
    /// Max rows pulled per sweep.
    pub sweep_batch_size: i64,
}

impl Default for EventConfig {
    fn default() -> Self {
        EventConfig {
            check_interval: Duration::from_secs(5 * 60),
            check_period: Duration::from_secs(24 * 60 * 60),
            check_failed_grace: Duration::from_secs(15 * 60),
            sweep_batch_size: 200,
        }
    }
}

impl EventConfig {
    pub fn from_env() -> Self {
        let mut config = EventConfig::default();

        if let Ok(v) = std::env::var("UNDELIVERED_CHECK_INTERVAL_IN_MINUTES") {
            if let Ok(minutes) = v.parse::<u64>() {
                config.check_interval = Duration::from_secs(minutes * 60);
            }
        }
        if let Ok(v) = std::env::var("UNDELIVERED_CHECK_PERIOD_IN_HOURS") {
            if let Ok(hours) = v.parse::<u64>() {
                config.check_period = Duration::from_secs(hours * 60 * 60);
            }
        }
        if let Ok(v) = std::env::var("UNDELIVERED_CHECK_FAILED_PERIOD_IN_MINUTES") {
            if let Ok(minutes) = v.parse::<u64>() {
                config.check_failed_grace = Duration::from_secs(minutes * 60);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EventConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(300));
        assert_eq!(config.check_period, Duration::from_secs(24 * 3600));
        assert_eq!(config.check_failed_grace, Duration::from_secs(15 * 60));
    }
}
