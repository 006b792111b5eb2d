//! Client configuration.
//!
//! The file only carries connection and tuning settings; secrets (the
//! session cookie) come from the environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),
  #[error("no configuration file found. Create one at ~/.config/scm-client/config.yaml")]
  NoConfigFile,
  #[error("failed to read config file {path}: {message}")]
  Read { path: PathBuf, message: String },
  #[error("failed to parse config file {path}: {message}")]
  Parse { path: PathBuf, message: String },
  #[error("session cookie not found. Set the SCM_CLIENT_COOKIE environment variable.")]
  MissingCookie,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub polling: PollingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the server including the context path, without the API
  /// root segment (e.g. `https://scm.example.com/scm`).
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds until a cached entry is treated as stale.
  #[serde(default = "default_stale_after_secs")]
  pub stale_after_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_after_secs: default_stale_after_secs(),
    }
  }
}

fn default_stale_after_secs() -> u64 {
  300
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
  /// Delay in milliseconds between refetches of partially computed
  /// resources.
  #[serde(default = "default_partial_delay_millis")]
  pub partial_delay_millis: u64,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      partial_delay_millis: default_partial_delay_millis(),
    }
  }
}

fn default_partial_delay_millis() -> u64 {
  3000
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./scm-client.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/scm-client/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
    let path = if let Some(path) = explicit_path {
      if path.exists() {
        Some(path.to_path_buf())
      } else {
        return Err(ConfigError::NotFound(path.to_path_buf()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(path) => Self::load_from_path(&path),
      None => Err(ConfigError::NoConfigFile),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("scm-client.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("scm-client").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
      path: path.to_path_buf(),
      message: error.to_string(),
    })?;

    serde_yaml::from_str(&contents).map_err(|error| ConfigError::Parse {
      path: path.to_path_buf(),
      message: error.to_string(),
    })
  }

  /// Get the session cookie from the environment.
  pub fn get_session_cookie() -> Result<String, ConfigError> {
    std::env::var("SCM_CLIENT_COOKIE").map_err(|_| ConfigError::MissingCookie)
  }
}
