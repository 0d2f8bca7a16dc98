//! Configuration file handling
//!
//! An optional JSON file supplies defaults for the session; command-line
//! flags take precedence over it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use uc_core::{
    ActivationEndpoint, CategorySetVersion, DatabaseAccess, SessionConfig, DEFAULT_DATABASE,
};

/// Default address of the `serve` command.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:5368";

/// Contents of a JSON configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub serial: Option<String>,
    pub client_id: Option<String>,
    pub product_type: Option<String>,
    pub database: Option<PathBuf>,
    /// `memory` or `file`
    pub access: Option<String>,
    /// `latest`, `all`, `loaded` or a version number
    pub version: Option<String>,
    /// `default` or an activation server URL
    pub activation: Option<String>,
    pub listen: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config '{}': {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("Invalid config '{}': {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load `path` if given, otherwise start from defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Database path: flag, then file, then the built-in default.
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn listen_addr(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.listen.clone())
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string())
    }

    /// Build a session configuration, with flags overriding file values.
    pub fn session_config(
        &self,
        db_flag: Option<&Path>,
        serial_flag: Option<&str>,
    ) -> Result<SessionConfig, String> {
        let serial = serial_flag
            .map(str::to_string)
            .or_else(|| self.serial.clone())
            .ok_or_else(|| "No license serial configured (use --serial or a config file)".to_string())?;

        let mut config = SessionConfig::new(serial).with_database(self.database_path(db_flag));

        if let Some(client_id) = &self.client_id {
            config.credentials.client_id = Some(client_id.clone());
        }
        if let Some(product_type) = &self.product_type {
            config.credentials.product_type = product_type.clone();
        }
        if let Some(access) = &self.access {
            config.access = DatabaseAccess::from_config(access)
                .ok_or_else(|| format!("Invalid database access '{}'", access))?;
        }
        if let Some(version) = &self.version {
            config.version = CategorySetVersion::from_config(version)
                .ok_or_else(|| format!("Invalid category set version '{}'", version))?;
        }
        if let Some(activation) = &self.activation {
            config.activation = ActivationEndpoint::from_config(activation);
        }

        Ok(config)
    }
}
