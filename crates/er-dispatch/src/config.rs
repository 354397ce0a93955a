//! Dispatcher configuration, read from TOML.
//!
//! ```toml
//! cache_graphs = true
//!
//! [tracker]
//! tick_interval_secs = 1.0
//! speedup            = 20.0
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use er_tracker::TrackerConfig;

use crate::{DispatchError, DispatchResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub tracker: TrackerConfig,

    /// Keep built city graphs in memory between queries.  Turn off when the
    /// node and edge tables change underneath a running dispatcher.
    pub cache_graphs: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { tracker: TrackerConfig::default(), cache_graphs: true }
    }
}

impl DispatchConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> DispatchResult<Self> {
        let config: DispatchConfig = toml::from_str(s).map_err(|e| DispatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> DispatchResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> DispatchResult<()> {
        self.tracker
            .validate()
            .map_err(|e| DispatchError::Config(e.to_string()))
    }
}
