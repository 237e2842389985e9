//! Service configuration, read from a JSON file.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::import::PortalConfig;
use crate::schedule::GridConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid listen address {0}")]
    Address(String),

    #[error("Default term {0} is not in the term table")]
    UnknownDefaultTerm(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub address: String,
    pub port: u16,
    /// SQLite file holding the schedule slot
    pub database_path: PathBuf,
    /// Course catalog snapshot; the catalog is empty when unset
    pub catalog_path: Option<PathBuf>,
    /// Final exam schedule keyed by course code
    pub exam_schedule_path: Option<PathBuf>,
    /// Term code to display name
    pub terms: BTreeMap<String, String>,
    pub default_term: String,
    pub grid: GridConfig,
    pub portal: PortalConfig,
    /// Time zone id written into calendar exports
    pub calendar_time_zone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let terms = [
            ("202520", "2024/2025 Winter"),
            ("202530", "2024/2025 Summer"),
            ("202610", "2025/2026 Fall"),
            ("202620", "2025/2026 Winter"),
        ]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("schedules.db"),
            catalog_path: None,
            exam_schedule_path: None,
            terms,
            default_term: "202520".to_string(),
            grid: GridConfig::default(),
            portal: PortalConfig::default(),
            calendar_time_zone: "America/Halifax".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the config at `path`, falling back to defaults if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if !self.terms.contains_key(&self.default_term) {
            return Err(ConfigError::UnknownDefaultTerm(self.default_term.clone()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.address, self.port);
        raw.parse().map_err(|_| ConfigError::Address(raw))
    }

    pub fn is_known_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }
}
