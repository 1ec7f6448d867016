//! Bootstrap configuration loading
//!
//! Runtime-tunable commerce parameters live in the database settings table;
//! this module only covers what is needed before the database is open:
//! where the database lives, where to bind, and how verbose to log.
//!
//! Search order for the config file:
//! 1. `SKOLA_CONFIG` environment variable (explicit path)
//! 2. `./skola.toml` in the working directory
//! 3. Platform config directory (e.g. `~/.config/skola/skola.toml`)
//!
//! A missing file is not an error: defaults apply and a warning is logged.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Service bootstrap configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Address to bind the HTTP listener to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP listener to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Tracing filter directive applied when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("skola").join("skola.db"))
        .unwrap_or_else(|| PathBuf::from("./skola.db"))
}

fn default_log_filter() -> String {
    "info,skola_commerce=debug".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            log_filter: default_log_filter(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration, falling back to defaults when no file is found
    pub fn load() -> Self {
        match locate_config_file() {
            Some(path) => match Self::load_from(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to load {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            None => {
                warn!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Find the config file following the documented search order
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SKOLA_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("SKOLA_CONFIG points to missing file: {}", path.display());
    }

    let local = PathBuf::from("./skola.toml");
    if local.exists() {
        return Some(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let platform = dir.join("skola").join("skola.toml");
        if platform.exists() {
            return Some(platform);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = ServiceConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5740);
        assert_eq!(config.bind_address(), "127.0.0.1:5740");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000").unwrap();

        let config = ServiceConfig::load_from(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let result = ServiceConfig::load_from(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn env_var_overrides_search_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 7777").unwrap();

        std::env::set_var("SKOLA_CONFIG", file.path());
        let config = ServiceConfig::load();
        std::env::remove_var("SKOLA_CONFIG");

        assert_eq!(config.port, 7777);
    }
}
