//! Configuration for a `compile` call.
//!
//! Grounded on the teacher's `config.rs`: a `figment`-layered struct loaded
//! from an optional TOML file plus `VAGUE_`-prefixed environment overrides.
//! Unlike the teacher's storage/runtime config, every field here is a
//! generation tunable the spec leaves implementation-defined (retry caps,
//! default bounds for unconstrained primitives).
//!
//! ```toml
//! # vague.toml
//! [retries]
//! unique_value = 100
//! constraint = 100
//!
//! [defaults]
//! int_min = -1_000_000
//! int_max = 1_000_000
//! ```
//!
//! Environment overrides:
//! ```bash
//! VAGUE_RETRIES.UNIQUE_VALUE=50
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level configuration for one or more `compile` calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retries: RetryLimits,
    #[serde(default)]
    pub defaults: DefaultBounds,
}

/// Retry caps for the constraint loop and the unique-value pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryLimits {
    #[serde(default = "default_retry")]
    pub unique_value: u32,
    #[serde(default = "default_retry")]
    pub constraint: u32,
}

fn default_retry() -> u32 {
    100
}

impl Default for RetryLimits {
    fn default() -> Self {
        RetryLimits {
            unique_value: default_retry(),
            constraint: default_retry(),
        }
    }
}

/// Sane bounds used for unconstrained primitives and open-ended ranges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DefaultBounds {
    #[serde(default = "default_int_min")]
    pub int_min: i64,
    #[serde(default = "default_int_max")]
    pub int_max: i64,
    #[serde(default = "default_decimal_max")]
    pub decimal_max: f64,
    #[serde(default = "default_date_window_days")]
    pub date_window_days: i64,
    #[serde(default = "default_open_range_span")]
    pub open_range_span: i64,
}

fn default_int_min() -> i64 {
    -1_000_000
}
fn default_int_max() -> i64 {
    1_000_000
}
fn default_decimal_max() -> f64 {
    1000.0
}
fn default_date_window_days() -> i64 {
    365
}
fn default_open_range_span() -> i64 {
    1_000_000
}

impl Default for DefaultBounds {
    fn default() -> Self {
        DefaultBounds {
            int_min: default_int_min(),
            int_max: default_int_max(),
            decimal_max: default_decimal_max(),
            date_window_days: default_date_window_days(),
            open_range_span: default_open_range_span(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            retries: RetryLimits::default(),
            defaults: DefaultBounds::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (if it exists) layered under
    /// `VAGUE_`-prefixed environment variables, falling back to defaults.
    pub fn load(path: Option<&str>) -> anyhow::Result<Config> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("VAGUE_").split("_"));
        Ok(figment.extract()?)
    }
}
