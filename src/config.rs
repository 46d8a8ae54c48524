use crate::core::db::connection::ConnectionConfig;
use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub debug: DebugSettings,
}

/// Error reporting switches applied to the wrapper.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    pub debug: bool,
    pub strict: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        DebugSettings {
            debug: true,
            strict: false,
        }
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = quickdb::config::load_config("quickdb.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| DbError::Config(e.to_string()))
}

/// `<config dir>/quickdb/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quickdb").join("config.toml"))
}
