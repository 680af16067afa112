use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::error::ConfigError;
use super::gate::AllowList;
use super::gate::Gate;
use super::gate::DEFAULT_ALLOWED_RUN_FILES;
use super::gate::DEFAULT_SUITE_EXTENSION;

pub const CONFIG_DIR_NAME: &str = "suitedeck";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub gate: GateConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    /// Applies to listing and metadata calls only.
    pub request_timeout_ms: u64,
    pub stream_chunk_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 15_000,
            stream_chunk_bytes: 4_096,
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GateConfig {
    pub allowed_run_files: Vec<String>,
    pub suite_extension: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            allowed_run_files: DEFAULT_ALLOWED_RUN_FILES
                .iter()
                .map(|file| file.to_string())
                .collect(),
            suite_extension: DEFAULT_SUITE_EXTENSION.to_string(),
        }
    }
}

impl GateConfig {
    pub fn build_gate(&self) -> Gate {
        Gate::new(
            AllowList::new(&self.allowed_run_files),
            self.suite_extension.clone(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Explicit path must exist; the default location may be absent.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}
