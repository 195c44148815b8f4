//! Persisted configuration living in the configuration directory:
//!  - `config.toml` with backend credentials and runtime options ([AppConfig]),
//!  - `projects.toml` with the project registry (see [crate::registry]),
//!  - `assets/` with optional per-project icons.

pub mod error;

use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deck::Layout;

pub use error::ConfigError;

pub const CONFIG_FILE: &str = "config.toml";
pub const PROJECTS_FILE: &str = "projects.toml";
pub const ASSETS_DIR: &str = "assets";

const DEFAULT_SYNC_RATE_MS: u64 = 1000;
const DEFAULT_ENTRY_DESCRIPTION: &str = "(to fill in)";
const DEFAULT_NEUTRAL_LABEL: &str = "NOT RUN";
const DEFAULT_LAYOUT: Layout = Layout(3, 5);

/// Time tracking service the application talks to. Selected once at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Clockify,
}

impl Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Clockify => write!(f, "clockify"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyConfig {
    pub api_key: String,
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub backend: Backend,
    /// Poll interval in milliseconds.
    #[serde(default = "default_sync_rate")]
    pub sync_rate: u64,
    #[serde(default = "default_entry_description")]
    pub entry_description: String,
    #[serde(default = "default_layout")]
    pub default_layout: Layout,
    /// Devices to manage even when the deck file doesn't mention them yet.
    #[serde(default)]
    pub devices: BTreeMap<String, Layout>,
    #[serde(default = "default_neutral_label")]
    pub neutral_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clockify: Option<ClockifyConfig>,
}

fn default_sync_rate() -> u64 {
    DEFAULT_SYNC_RATE_MS
}

fn default_entry_description() -> String {
    DEFAULT_ENTRY_DESCRIPTION.into()
}

fn default_neutral_label() -> String {
    DEFAULT_NEUTRAL_LABEL.into()
}

fn default_layout() -> Layout {
    DEFAULT_LAYOUT
}

impl AppConfig {
    pub fn with_clockify(clockify: ClockifyConfig) -> Self {
        Self {
            backend: Backend::Clockify,
            sync_rate: DEFAULT_SYNC_RATE_MS,
            entry_description: default_entry_description(),
            default_layout: DEFAULT_LAYOUT,
            devices: BTreeMap::new(),
            neutral_label: default_neutral_label(),
            clockify: Some(clockify),
        }
    }

    pub fn clockify(&self) -> Result<&ClockifyConfig, ConfigError> {
        self.clockify
            .as_ref()
            .ok_or(ConfigError::MissingBackendSection("clockify"))
    }
}

/// Paths of the documents inside a configuration directory.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn projects_file(&self) -> PathBuf {
        self.dir.join(PROJECTS_FILE)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.dir.join(ASSETS_DIR)
    }

    /// Fails with [ConfigError::NotInitialized] when the directory itself is absent.
    pub fn ensure_initialized(&self) -> Result<(), ConfigError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::NotInitialized {
                path: self.dir.clone(),
            })
        }
    }
}

/// Reads a required document, turning a missing file into [ConfigError::NotInitialized].
pub(crate) fn read_required(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(v) => Ok(v),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotInitialized {
            path: path.to_path_buf(),
        }
        .into()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
    }
}

pub fn load_config(paths: &ConfigPaths) -> Result<AppConfig> {
    paths.ensure_initialized()?;
    let path = paths.config_file();
    debug!("Loading configuration from {path:?}");
    let raw = read_required(&path)?;
    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("Failed to parse {path:?}"))?;
    Ok(config)
}

pub fn save_config(paths: &ConfigPaths, config: &AppConfig) -> Result<()> {
    let raw = toml::to_string_pretty(config)?;
    std::fs::write(paths.config_file(), raw)?;
    Ok(())
}
