//! INI configuration file.
//!
//! ```ini
//! [listen]
//! min_interval_ms = 1000
//! min_distance_m = 10
//! high_accuracy = false
//!
//! [events]
//! emit_policy = every_update
//! capacity = 64
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use super::{EmitPolicy, GeofenceConfig};
use crate::units::Distance;

const SECTION_LISTEN: &str = "listen";
const SECTION_EVENTS: &str = "events";

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load {}: {}", .path.display(), .source)]
    Load { path: PathBuf, source: ini::Error },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// Default configuration file location (`<config dir>/geofencing/config.ini`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("geofencing").join("config.ini"))
}

/// A parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub config: GeofenceConfig,
}

impl ConfigFile {
    /// Load from a file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Load from the default path, or fall back to defaults if it does not exist.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse from an INI string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = GeofenceConfig::default();

        if let Some(listen) = ini.section(Some(SECTION_LISTEN)) {
            if let Some(ms) = parse_key::<u64>(listen, SECTION_LISTEN, "min_interval_ms")? {
                config.listen.min_interval = Duration::from_millis(ms);
            }
            if let Some(meters) = parse_key::<f64>(listen, SECTION_LISTEN, "min_distance_m")? {
                if !meters.is_finite() || meters < 0.0 {
                    return Err(invalid(SECTION_LISTEN, "min_distance_m", &meters.to_string()));
                }
                config.listen.min_distance = Distance::from_meters(meters);
            }
            if let Some(high) = parse_key::<bool>(listen, SECTION_LISTEN, "high_accuracy")? {
                config.listen.high_accuracy = high;
            }
        }

        if let Some(events) = ini.section(Some(SECTION_EVENTS)) {
            if let Some(policy) = parse_key::<EmitPolicy>(events, SECTION_EVENTS, "emit_policy")? {
                config.emit_policy = policy;
            }
            if let Some(capacity) = parse_key::<usize>(events, SECTION_EVENTS, "capacity")? {
                if capacity == 0 {
                    return Err(invalid(SECTION_EVENTS, "capacity", "0"));
                }
                config.event_capacity = capacity;
            }
        }

        Ok(Self { config })
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            config: GeofenceConfig::default(),
        }
    }
}

fn parse_key<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match props.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, raw)),
    }
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}
