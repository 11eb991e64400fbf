use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories_next::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prelude::*;
use crate::state::{ControlRange, PanelIndex};
use crate::transport::{BackoffPolicy, DEFAULT_MAX_FRAME_BYTES};

pub const DEFAULT_HUB_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const CONFIG_FILE_NAME: &str = "page.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PanelConfig {
    pub index: PanelIndex,
    pub count: usize,
    #[serde(default)]
    pub range: ControlRange,
}

impl PanelConfig {
    pub fn new(index: PanelIndex, count: usize) -> Self {
        Self {
            index,
            count,
            range: ControlRange::default(),
        }
    }
}

/// Settings for one controller page. Every field is optional in the YAML
/// file; missing fields fall back to the reference layout (16-step
/// sequencer on panel 0, four sliders on panel 1, 120 BPM quarter notes).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PageConfig {
    pub bpm: f32,
    /// One of `1/32`, `1/16`, `1/8`, `1/4`. Kept as text so that a bad value
    /// only idles the clock instead of rejecting the whole file.
    pub division: String,
    pub hub_addr: String,
    pub clock_resolution_ms: u64,
    pub backoff: BackoffPolicy,
    pub max_frame_bytes: usize,
    pub sequencer: PanelConfig,
    pub sliders: PanelConfig,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            division: "1/4".to_string(),
            hub_addr: DEFAULT_HUB_ADDR.to_string(),
            clock_resolution_ms: 1,
            backoff: BackoffPolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            sequencer: PanelConfig::new(0, 16),
            sliders: PanelConfig::new(1, 4),
        }
    }
}

impl PageConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source =
            fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::from_yaml(&source).map_err(|err| match err {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        info!("loaded page config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yml::from_str(source).map_err(|source| ConfigError::Yaml {
                path: PathBuf::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the file at
    /// [`default_config_path`] if it exists, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("no page config found; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequencer.index == self.sliders.index {
            return Err(ConfigError::Invalid(format!(
                "sequencer and sliders share panel index {}",
                self.sequencer.index
            )));
        }

        for (name, panel) in
            [("sequencer", &self.sequencer), ("sliders", &self.sliders)]
        {
            if panel.count == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} panel must have at least one control",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn clock_resolution(&self) -> Duration {
        Duration::from_millis(self.clock_resolution_ms.max(1))
    }

    /// Panel index and value range of every panel on the page.
    pub fn layout(&self) -> Vec<(PanelIndex, ControlRange)> {
        vec![
            (self.sequencer.index, self.sequencer.range),
            (self.sliders.index, self.sliders.range),
        ]
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    pub listen_addr: String,
    pub max_frame_bytes: usize,
    /// How long a relay write may wait on a client before it is dropped.
    pub write_timeout_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            write_timeout_ms: 2000,
        }
    }
}

impl HubConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }
}

pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.config_dir().join("Stepsync"))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
