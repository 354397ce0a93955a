//! Tracker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{TrackerError, TrackerResult};

/// How tracked trips are timed and published.
///
/// All durations are in seconds so the struct reads naturally from TOML:
///
/// ```toml
/// tick_interval_secs      = 1.0
/// seconds_per_weight_unit = 60.0
/// speedup                 = 10.0
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Time between published events.  Default: 1 s.
    pub tick_interval_secs: f64,

    /// Wall-clock seconds per unit of route weight.  Weights are minutes, so
    /// the default is 60.
    pub seconds_per_weight_unit: f64,

    /// Divides the trip duration.  `10.0` plays a 10-minute trip in 1 minute.
    pub speedup: f64,

    /// Lower bound on any non-degenerate trip.  Default: 1 s.
    pub min_duration_secs: f64,

    /// Upper bound on any trip.  Default: 1 h.
    pub max_duration_secs: f64,

    /// Broadcast buffer per request.  Subscribers further behind than this
    /// skip events.
    pub channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs:      1.0,
            seconds_per_weight_unit: 60.0,
            speedup:                 1.0,
            min_duration_secs:       1.0,
            max_duration_secs:       3_600.0,
            channel_capacity:        64,
        }
    }
}

impl TrackerConfig {
    /// # Errors
    ///
    /// [`TrackerError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> TrackerResult<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(TrackerError::InvalidConfig(format!("{name} must be positive, got {v}")))
            }
        };
        positive("tick_interval_secs", self.tick_interval_secs)?;
        positive("seconds_per_weight_unit", self.seconds_per_weight_unit)?;
        positive("speedup", self.speedup)?;
        positive("max_duration_secs", self.max_duration_secs)?;
        if !self.min_duration_secs.is_finite() || self.min_duration_secs < 0.0 {
            return Err(TrackerError::InvalidConfig(format!(
                "min_duration_secs must be non-negative, got {}",
                self.min_duration_secs
            )));
        }
        if self.min_duration_secs > self.max_duration_secs {
            return Err(TrackerError::InvalidConfig(format!(
                "min_duration_secs ({}) exceeds max_duration_secs ({})",
                self.min_duration_secs, self.max_duration_secs
            )));
        }
        if self.channel_capacity == 0 {
            return Err(TrackerError::InvalidConfig("channel_capacity must be at least 1".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval_secs)
    }

    /// Trip duration for a route of `total_weight`:
    /// `weight × seconds_per_weight_unit / speedup`, clamped to
    /// `[min_duration, max_duration]`.
    ///
    /// Assumes a validated config and a finite, non-negative weight.
    pub fn trip_duration(&self, total_weight: f64) -> Duration {
        let secs = total_weight * self.seconds_per_weight_unit / self.speedup;
        Duration::from_secs_f64(secs.clamp(self.min_duration_secs, self.max_duration_secs))
    }
}
