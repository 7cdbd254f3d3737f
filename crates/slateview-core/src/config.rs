//! Driver configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SlateError};
use crate::scaling::ViewportSpec;

fn default_blocking_timeout_ms() -> u64 {
    2_000
}

fn default_tick_interval_ms() -> u64 {
    16
}

/// Static configuration for one session driver instance.
///
/// Loaded from JSON or JSON5; all fields have serviceable defaults so an
/// empty document configures a bare driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Extension uris the host declares support for. Only uris present both
    /// here and in the document's requested set are registered at build.
    #[serde(default)]
    pub supported_extensions: Vec<String>,

    /// Host-supported viewport candidates, highest priority first.
    #[serde(default)]
    pub viewport_specs: Vec<ViewportSpec>,

    /// Timeout for one blocking round trip to the view host.
    #[serde(default = "default_blocking_timeout_ms")]
    pub blocking_timeout_ms: u64,

    /// Target interval between frame ticks when driven by the runtime pump.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Timezone offset applied to the engine clock, in milliseconds.
    #[serde(default)]
    pub utc_offset_ms: i64,

    /// Opaque environment values handed to extensions on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Value>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            supported_extensions: Vec::new(),
            viewport_specs: Vec::new(),
            blocking_timeout_ms: default_blocking_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            utc_offset_ms: 0,
            environment: None,
        }
    }
}

impl DriverConfig {
    /// Parse a config document. Accepts JSON5, which is a superset of JSON.
    pub fn from_str(text: &str) -> Result<Self> {
        json5::from_str(text).map_err(|e| SlateError::Config(e.to_string()))
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }
}
