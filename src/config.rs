use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::array::MAX_SLOTS;

/// Initial working capacity of the `base`/`check` arrays.
pub const DEFAULT_INITIAL_CAPACITY: usize = 65536 * 32;

/// Lower bound of the array growth rate late in a build.
pub const DEFAULT_MIN_GROWTH_RATE: f64 = 1.05;

/// Occupancy ratio of a scan above which the free-slot checkpoint jumps ahead.
pub const DEFAULT_OCCUPANCY_THRESHOLD: f64 = 0.95;

/// Tuning knobs for trie construction.
///
/// None of these change lookup results; they only trade build time for memory.
/// Two builds with the same keys and the same config produce identical arrays.
///
/// ```
/// use darts_trie::TrieConfig;
///
/// let config = TrieConfig::from_toml_str("initial_capacity = 1024").unwrap();
/// assert_eq!(config.initial_capacity, 1024);
/// assert_eq!(config.min_growth_rate, 1.05);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrieConfig {
    /// Slots allocated before placing the first sibling group.
    pub initial_capacity: usize,
    /// Minimum factor applied to the required size when the arrays grow.
    pub min_growth_rate: f64,
    /// Fraction of occupied slots in one offset scan that moves the
    /// checkpoint to the end of that scan.
    pub occupancy_threshold: f64,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            min_growth_rate: DEFAULT_MIN_GROWTH_RATE,
            occupancy_threshold: DEFAULT_OCCUPANCY_THRESHOLD,
        }
    }
}

/// Rejected configuration values.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The TOML source could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// `initial_capacity` is zero.
    #[error("initial_capacity must be at least 1")]
    ZeroCapacity,

    /// `initial_capacity` exceeds the `i32` index space.
    #[error("initial_capacity {0} exceeds the i32 index space")]
    CapacityTooLarge(usize),

    /// `min_growth_rate` is below 1.0 or not finite.
    #[error("min_growth_rate must be a finite value >= 1.0, got {0}")]
    GrowthRate(f64),

    /// `occupancy_threshold` is outside `(0, 1]`.
    #[error("occupancy_threshold must be in (0, 1], got {0}")]
    OccupancyThreshold(f64),
}

impl TrieConfig {
    /// Parses a config from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every knob is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.initial_capacity > MAX_SLOTS {
            return Err(ConfigError::CapacityTooLarge(self.initial_capacity));
        }
        if !self.min_growth_rate.is_finite() || self.min_growth_rate < 1.0 {
            return Err(ConfigError::GrowthRate(self.min_growth_rate));
        }
        if !(self.occupancy_threshold > 0.0 && self.occupancy_threshold <= 1.0) {
            return Err(ConfigError::OccupancyThreshold(self.occupancy_threshold));
        }
        Ok(())
    }
}
