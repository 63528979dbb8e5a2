use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use thiserror::Error;
use webgpio_common::header::{PinRegistry, HEADER_PINS, JETSON_ORIN_NANO, JETSON_ORIN_NANO_ENABLED};
use crate::drivers::DriverKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("enabled pin {0} is not on the 40-pin header")]
    PinOutOfRange(u8),
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

/// Server settings, every key optional.
///
/// ```toml
/// bind = "0.0.0.0:5000"
/// enabled_pins = [7, 15, 29, 31, 32, 33]
/// driver = "sysfs"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Positions enabled by the device-tree overlay, replaces the compiled-in set
    #[serde(default)]
    pub enabled_pins: Option<Vec<u8>>,

    #[serde(default)]
    pub driver: DriverKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            enabled_pins: None,
            driver: DriverKind::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        if let Some(pins) = &config.enabled_pins {
            if let Some(&bad) = pins.iter().find(|p| !(1..=HEADER_PINS).contains(*p)) {
                return Err(ConfigError::PinOutOfRange(bad));
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn registry(&self) -> PinRegistry {
        match &self.enabled_pins {
            Some(pins) => PinRegistry::new(&JETSON_ORIN_NANO, pins.iter().copied()),
            None => PinRegistry::new(&JETSON_ORIN_NANO, JETSON_ORIN_NANO_ENABLED.iter().copied()),
        }
    }
}
