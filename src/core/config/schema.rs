//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing: the clone depth and output
//! limit must be positive, and identity fields must be non-empty and free of
//! newlines (they are written into the working copy's git config).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ConfigError;

/// Mirror configuration.
///
/// # Example
///
/// ```toml
/// storage_root = "/var/cache/shallowmirror"
/// clone_depth = 15
/// max_output_bytes = 4194304
///
/// [identity]
/// name = "Package Mirror"
/// email = "mirror@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    /// Directory holding one working copy per mirrored repository
    pub storage_root: Option<PathBuf>,

    /// Depth of the initial shallow clone
    pub clone_depth: Option<u32>,

    /// Per-stream cap on captured subprocess output
    pub max_output_bytes: Option<usize>,

    /// Author identity used for commits and annotated tags
    pub identity: Option<IdentityConfig>,
}

impl MirrorConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clone_depth == Some(0) {
            return Err(ConfigError::InvalidValue(
                "clone_depth must be greater than 0".to_string(),
            ));
        }

        if self.max_output_bytes == Some(0) {
            return Err(ConfigError::InvalidValue(
                "max_output_bytes must be greater than 0".to_string(),
            ));
        }

        if let Some(root) = &self.storage_root {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "storage_root cannot be empty".to_string(),
                ));
            }
        }

        if let Some(identity) = &self.identity {
            identity.validate()?;
        }

        Ok(())
    }
}

/// Commit author identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Value for `user.name`
    pub name: Option<String>,

    /// Value for `user.email`
    pub email: Option<String>,
}

impl IdentityConfig {
    /// Validate the identity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("name", &self.name), ("email", &self.email)] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "identity.{key} cannot be empty"
                    )));
                }
                if value.contains(['\n', '\r', '\0']) {
                    return Err(ConfigError::InvalidValue(format!(
                        "identity.{key} cannot contain line breaks"
                    )));
                }
            }
        }
        Ok(())
    }
}
