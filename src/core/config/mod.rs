//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$SHALLOWMIRROR_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/shallowmirror/config.toml`
//! 3. `~/.shallowmirror/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use shallowmirror::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Storage root: {}", config.storage_root().display());
//! println!("Clone depth: {}", config.clone_depth());
//! ```

pub mod schema;

pub use schema::{IdentityConfig, MirrorConfig};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::git::exec::DEFAULT_MAX_OUTPUT_BYTES;

/// Default depth of the initial shallow clone.
pub const DEFAULT_CLONE_DEPTH: u32 = 15;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SHALLOWMIRROR_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("no storage root configured and no cache directory available")]
    NoStorageRoot,
}

/// Author identity written into a working copy before commits and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "shallowmirror".to_string(),
            email: "shallowmirror@localhost".to_string(),
        }
    }
}

/// Loaded configuration with defaults applied by accessor methods.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Values read from the config file
    pub file: MirrorConfig,
    /// Path the file was loaded from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// holds invalid values. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = Self::read_config(path)?;
        file.validate()?;
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Find the first existing config file in search order.
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("shallowmirror/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".shallowmirror/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<MirrorConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path of the loaded config file, if one was found.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Override the storage root (e.g. from a CLI flag).
    pub fn set_storage_root(&mut self, root: impl Into<PathBuf>) {
        self.file.storage_root = Some(root.into());
    }

    /// Storage root, falling back to `<cache_dir>/shallowmirror`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoStorageRoot` when neither a configured root
    /// nor a platform cache directory exists.
    pub fn try_storage_root(&self) -> Result<PathBuf, ConfigError> {
        if let Some(root) = &self.file.storage_root {
            return Ok(root.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("shallowmirror"))
            .ok_or(ConfigError::NoStorageRoot)
    }

    /// Storage root, or the relative `.shallowmirror` directory when no
    /// platform cache directory exists.
    pub fn storage_root(&self) -> PathBuf {
        self.try_storage_root()
            .unwrap_or_else(|_| PathBuf::from(".shallowmirror"))
    }

    /// Depth of the initial shallow clone (default 15).
    pub fn clone_depth(&self) -> u32 {
        self.file.clone_depth.unwrap_or(DEFAULT_CLONE_DEPTH)
    }

    /// Per-stream subprocess output cap (default 4 MiB).
    pub fn max_output_bytes(&self) -> usize {
        self.file
            .max_output_bytes
            .unwrap_or(DEFAULT_MAX_OUTPUT_BYTES)
    }

    /// Commit identity with defaults filled in per field.
    pub fn identity(&self) -> Identity {
        let default = Identity::default();
        match &self.file.identity {
            Some(identity) => Identity {
                name: identity.name.clone().unwrap_or(default.name),
                email: identity.email.clone().unwrap_or(default.email),
            },
            None => default,
        }
    }
}
