//! Bus-wide configuration: ring depth and frame size, loaded from
//! TOML the way `services/forwarder/src/config.rs` loads its own
//! config — an `Option`-wrapped raw struct resolved into defaults.

use std::path::Path;

use serde::Deserialize;

pub const DEFAULT_MEMORY_SIZE: usize = 8;
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8192;

/// Depth of each per-endpoint ring and the maximum frame size before
/// fragmentation kicks in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub memory_size: usize,
    pub max_frame_length: usize,
    /// Keys the dispatcher should pre-allocate rings for at startup,
    /// so module processes started afterwards can [`crate::endpoint::Bus::attach`]
    /// to a segment that already exists instead of racing the
    /// dispatcher to create it.
    pub known_endpoints: Vec<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            memory_size: DEFAULT_MEMORY_SIZE,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            known_endpoints: Vec::new(),
        }
    }
}

impl BusConfig {
    /// Usable bytes per fragment: the slot width minus the routing
    /// prefix that precedes every frame.
    pub fn max_inner_len(&self) -> usize {
        self.max_frame_length
            .saturating_sub(bus_codec::RoutingPrefix::LENGTH)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("reading {}: {e}", path.display())))?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawBusConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = BusConfig {
            memory_size: raw.memory_size.unwrap_or(DEFAULT_MEMORY_SIZE),
            max_frame_length: raw.max_frame_length.unwrap_or(DEFAULT_MAX_FRAME_LENGTH),
            known_endpoints: raw.known_endpoints.unwrap_or_default(),
        };
        if config.memory_size == 0 {
            return Err(ConfigError::InvalidValue("memory_size must be at least 1".to_string()));
        }
        if config.max_frame_length <= bus_codec::RoutingPrefix::LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "max_frame_length must exceed the routing prefix length ({})",
                bus_codec::RoutingPrefix::LENGTH
            )));
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct RawBusConfig {
    memory_size: Option<usize>,
    max_frame_length: Option<usize>,
    known_endpoints: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}
