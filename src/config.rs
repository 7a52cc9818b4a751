//! Simulation constants and run limits.
//!
//! Every tunable number of the simulation lives in [`SimConfig`]. A TOML file
//! may override any subset of fields; the rest keep their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`SimConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// A value is out of its valid range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Operation costs charged per primitive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Costs {
    /// A successful game-affecting call.
    pub default_ops: u32,
    /// A rejected call or a no-op harvest.
    pub rejected_ops: u32,
    /// `print`.
    pub print_ops: u32,
    /// Position and world-size queries, and `delay`.
    pub query_ops: u32,
}

impl Default for Costs {
    fn default() -> Self {
        Self {
            default_ops: 200,
            rejected_ops: 1,
            print_ops: 500,
            query_ops: 1,
        }
    }
}

/// Simulation constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Minimum real time between two field simulation steps, in seconds.
    pub frame_time: f64,
    /// Fraction of water lost per second.
    pub water_decay: f64,
    /// Empty buckets filled per second.
    pub bucket_fill_rate: f64,
    /// Growth multiplier gained at full water, on top of the base rate.
    pub max_water_speedup: f64,
    /// Power drained per operation.
    pub power_per_op: f64,
    /// Water added by one Full Bucket.
    pub bucket_water: f64,
    /// Seconds of base growth added by one Fertilizer.
    pub fertilizer_seconds: f64,
    /// Operations executed per second at speedup 1.
    pub ops_per_second: f64,
    /// Speedup multiplier applied while Power is positive.
    pub power_speedup: f64,
    /// Operation costs.
    pub costs: Costs,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frame_time: 1.0 / 60.0,
            water_decay: 0.04,
            bucket_fill_rate: 0.05,
            max_water_speedup: 5.0,
            power_per_op: 0.000_02,
            bucket_water: 0.25,
            fertilizer_seconds: 2.0,
            ops_per_second: 1000.0,
            power_speedup: 2.0,
            costs: Costs::default(),
        }
    }
}

impl SimConfig {
    /// Load from a TOML file, falling back to defaults on any error.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("{err}. Using defaults");
                Self::default()
            }
        }
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or holds
    /// out-of-range values.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every rate is finite and rates that divide are positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("frame_time", self.frame_time),
            ("water_decay", self.water_decay),
            ("bucket_fill_rate", self.bucket_fill_rate),
            ("max_water_speedup", self.max_water_speedup),
            ("power_per_op", self.power_per_op),
            ("bucket_water", self.bucket_water),
            ("fertilizer_seconds", self.fertilizer_seconds),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("ops_per_second", self.ops_per_second),
            ("power_speedup", self.power_speedup),
            ("bucket_fill_rate", self.bucket_fill_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Limits for a single script run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunOptions {
    /// Maximum interpreter steps before the run is aborted.
    pub step_budget: Option<u64>,
    /// Play time, in seconds from the start of the run, after which the
    /// scheduler raises the stop flag.
    pub time_limit: Option<f64>,
}
