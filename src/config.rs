//! Environment configuration.
//!
//! Loaded from JSON; every field except `max_iterations` has a default.
//!
//! ```
//! use flowsynth::config::EnvConfig;
//!
//! let config = EnvConfig::from_json_str(r#"{
//!     "max_iterations": 12,
//!     "purity": 0.95,
//!     "pressure_schedule": [1.0, 1.0, 30.0, 30.0],
//!     "parameter_ranges": { "cooler": { "low": 5.0, "high": 50.0 } }
//! }"#).unwrap();
//!
//! assert_eq!(config.max_iterations, 12);
//! assert_eq!(config.reference_component, "METHANOL");
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::ActionSlot;
use crate::models::ParameterRange;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_purity() -> f64 {
    0.95
}

fn default_reference_component() -> String {
    "METHANOL".to_string()
}

fn default_product_component() -> String {
    "WATER".to_string()
}

fn default_run_timeout_ms() -> u64 {
    60_000
}

/// Settings of one synthesis environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Steps per episode before `done` is forced
    pub max_iterations: usize,
    /// Product mole fraction at which the product counts as pure
    #[serde(default = "default_purity")]
    pub purity: f64,
    /// Reactant whose consumption defines conversion
    #[serde(default = "default_reference_component")]
    pub reference_component: String,
    /// Component whose purity ends the separation
    #[serde(default = "default_product_component")]
    pub product_component: String,
    /// Outlet pressure for heaters and coolers, indexed by episode step
    #[serde(default)]
    pub pressure_schedule: Vec<f64>,
    /// Time budget for one simulator run, in milliseconds
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
    /// Physical ranges of normalized continuous parameters
    #[serde(default)]
    pub parameter_ranges: BTreeMap<ActionSlot, ParameterRange>,
}

impl EnvConfig {
    /// Default configuration with the given episode length.
    pub fn new(max_iterations: usize) -> Self {
        EnvConfig {
            max_iterations,
            purity: default_purity(),
            reference_component: default_reference_component(),
            product_component: default_product_component(),
            pressure_schedule: Vec::new(),
            run_timeout_ms: default_run_timeout_ms(),
            parameter_ranges: BTreeMap::new(),
        }
    }

    pub fn with_purity(mut self, purity: f64) -> Self {
        self.purity = purity;
        self
    }

    pub fn with_pressure_schedule(mut self, schedule: Vec<f64>) -> Self {
        self.pressure_schedule = schedule;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_parameter_range(mut self, slot: ActionSlot, range: ParameterRange) -> Self {
        self.parameter_ranges.insert(slot, range);
        self
    }

    /// Time budget for one simulator run.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EnvConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.purity > 0.0 && self.purity <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "purity {} outside (0, 1]",
                self.purity
            )));
        }
        if self.run_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "run_timeout_ms must be positive".to_string(),
            ));
        }
        if self.reference_component.is_empty() || self.product_component.is_empty() {
            return Err(ConfigError::Invalid(
                "component names must not be empty".to_string(),
            ));
        }
        let invalid_range = self.parameter_ranges.iter().find(|(_, r)| !r.is_valid());
        if let Some((slot, range)) = invalid_range {
            return Err(ConfigError::Invalid(format!(
                "parameter range for {} is [{}, {}]",
                slot, range.low, range.high
            )));
        }
        Ok(())
    }
}
