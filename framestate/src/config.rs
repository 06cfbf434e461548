//! Frame runtime configuration
//!
//! All fields have defaults, so an empty JSON object is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FrameError, Result};

/// Default interval between automatic record collections (milliseconds)
const DEFAULT_GC_INTERVAL_MS: u64 = 1_000;

/// Default minimum live record count before automatic collection triggers
const DEFAULT_MIN_RECORDS_FOR_GC: u64 = 1_000;

/// Record garbage collection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Whether commits may trigger an automatic collection
    pub enabled: bool,
    /// Minimum number of live records before an automatic collection runs
    pub min_records: u64,
    /// Minimum time between automatic collections, in milliseconds
    pub interval_ms: u64,
}

impl GcConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_records: DEFAULT_MIN_RECORDS_FOR_GC,
            interval_ms: DEFAULT_GC_INTERVAL_MS,
        }
    }
}

/// Frame manager configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Record collection settings
    pub gc: GcConfig,
}

impl FrameConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FrameError::Config(e.to_string()))
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| FrameError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Serialize the configuration as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FrameError::Config(e.to_string()))
    }
}
