//! Engine configuration
//!
//! The defaults a station would normally source from its device model:
//! fallback limits, phase count, supply voltage and the protocol revision
//! whose merge semantics apply. Loadable from TOML for headless use.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::limits::{
    DEFAULT_AND_MAX_NUMBER_PHASES, DEFAULT_LIMIT_AMPS, DEFAULT_LIMIT_WATTS, LOW_VOLTAGE,
};

/// Wire revision whose merge semantics apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolRevision {
    /// 2.0.1: single-phase limit values only, no phase alignment.
    V201,
    /// 2.1: per-phase values; single-phase figures are aligned across
    /// phases before merging.
    #[default]
    V21,
}

/// Defaults applied while resolving a composite schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Limit for unconstrained stretches of an Amp-denominated schedule.
    pub default_limit_amps: f64,
    /// Limit for unconstrained stretches of a Watt-denominated schedule.
    pub default_limit_watts: f64,
    /// Phase count assumed when a period does not state one.
    pub default_number_phases: u8,
    /// Line-to-neutral supply voltage for current/power conversion.
    pub supply_voltage: f64,
    pub revision: ProtocolRevision,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            default_limit_amps: DEFAULT_LIMIT_AMPS,
            default_limit_watts: DEFAULT_LIMIT_WATTS,
            default_number_phases: DEFAULT_AND_MAX_NUMBER_PHASES,
            supply_voltage: LOW_VOLTAGE,
            revision: ProtocolRevision::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ScheduleConfig {
    /// Parse a config from TOML; absent keys keep their defaults.
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::from_toml(&std::fs::read_to_string(path)?)?)
    }
}
