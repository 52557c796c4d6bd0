//! Per-domain timing knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, RandomSource};

/// Inclusive `[min_ms, max_ms]` range sampled uniformly. Serialized as a
/// two-element array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u64; 2]", into = "[u64; 2]")]
pub struct DurationWindow {
    min_ms: u64,
    max_ms: u64,
}

impl DurationWindow {
    /// Validated window.
    pub fn new(min_ms: u64, max_ms: u64) -> Result<Self, ConfigError> {
        if min_ms > max_ms {
            return Err(ConfigError::InvertedWindow { min_ms, max_ms });
        }
        Ok(Self { min_ms, max_ms })
    }

    /// Always exactly `ms`.
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    /// `base_ms` plus up to `jitter_ms`.
    pub const fn jittered(base_ms: u64, jitter_ms: u64) -> Self {
        Self {
            min_ms: base_ms,
            max_ms: base_ms.saturating_add(jitter_ms),
        }
    }

    /// Lower bound in milliseconds.
    pub fn min_ms(&self) -> u64 {
        self.min_ms
    }

    /// Upper bound in milliseconds.
    pub fn max_ms(&self) -> u64 {
        self.max_ms
    }

    /// Draws a duration; fixed windows do not consume randomness.
    pub fn sample(&self, rng: &mut dyn RandomSource) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        let span = (self.max_ms - self.min_ms) as f64;
        let offset = (span * rng.next_unit()).round() as u64;
        Duration::from_millis(self.min_ms + offset.min(self.max_ms - self.min_ms))
    }
}

impl TryFrom<[u64; 2]> for DurationWindow {
    type Error = ConfigError;

    fn try_from([min_ms, max_ms]: [u64; 2]) -> Result<Self, Self::Error> {
        Self::new(min_ms, max_ms)
    }
}

impl From<DurationWindow> for [u64; 2] {
    fn from(w: DurationWindow) -> Self {
        [w.min_ms, w.max_ms]
    }
}

/// Timing and failure knobs of one store.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Delay between refresh cycles, re-sampled for every cycle.
    #[serde(rename = "interval_ms")]
    pub interval: DurationWindow,
    /// Simulated network latency before a cycle's work runs.
    #[serde(rename = "latency_ms")]
    pub latency: DurationWindow,
    /// Time connected before the simulated channel drops.
    #[serde(rename = "disconnect_window_ms")]
    pub disconnect_after: DurationWindow,
    /// Time disconnected before the channel comes back.
    #[serde(rename = "reconnect_delay_ms")]
    pub reconnect_after: DurationWindow,
    /// Probability that a cycle fails as if the upstream were down.
    #[serde(default)]
    pub failure_rate: f64,
}

impl SyncConfig {
    /// Rejects zero intervals and failure rates outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.min_ms == 0 {
            return Err(ConfigError::ZeroWindow("interval_ms"));
        }
        if self.disconnect_after.min_ms == 0 {
            return Err(ConfigError::ZeroWindow("disconnect_window_ms"));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::FailureRate(self.failure_rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SeededRandom, Sequence};

    #[test]
    fn samples_stay_inside_the_window() {
        let w = DurationWindow::jittered(60_000, 120_000);
        let mut rng = SeededRandom::new(3);
        for _ in 0..500 {
            let d = w.sample(&mut rng).as_millis() as u64;
            assert!((60_000..=180_000).contains(&d));
        }
        assert_eq!(
            w.sample(&mut Sequence::constant(0.5)),
            Duration::from_millis(120_000)
        );
    }

    #[test]
    fn inverted_windows_are_rejected() {
        assert_eq!(
            DurationWindow::new(5, 3),
            Err(ConfigError::InvertedWindow { min_ms: 5, max_ms: 3 })
        );
        let parsed: Result<DurationWindow, _> = serde_json::from_str("[9, 1]");
        assert!(parsed.is_err());
    }

    #[test]
    fn config_parses_from_toml() {
        let cfg: SyncConfig = toml::from_str(
            r#"
            interval_ms = [10000, 25000]
            latency_ms = [1200, 2000]
            disconnect_window_ms = [90000, 240000]
            reconnect_delay_ms = [3000, 4000]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.interval, DurationWindow::new(10_000, 25_000).unwrap());
        assert_eq!(cfg.failure_rate, 0.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validation_catches_bad_knobs() {
        let mut cfg = SyncConfig {
            interval: DurationWindow::fixed(0),
            latency: DurationWindow::fixed(0),
            disconnect_after: DurationWindow::fixed(1_000),
            reconnect_after: DurationWindow::fixed(1_000),
            failure_rate: 0.0,
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroWindow("interval_ms")));
        cfg.interval = DurationWindow::fixed(1_000);
        cfg.failure_rate = 1.5;
        assert_eq!(cfg.validate(), Err(ConfigError::FailureRate(1.5)));
    }
}
