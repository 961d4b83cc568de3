//! core::types
//!
//! Validation of untrusted ref and branch strings.
//!
//! # Functions
//!
//! - [`validate_ref_is_secure`] - Check a branch, tag or commit ref
//! - [`validate_branch_is_secure`] - Check a branch name
//!
//! # Validation
//!
//! Refs arrive from the mirroring pipeline and are never trusted. Every ref
//! is checked before it is placed into a `git` argument list. Commands are
//! always spawned from argument arrays (see [`crate::git::exec`]), so these
//! checks are a second line of defense rather than the only one.
//!
//! # Design risk
//!
//! The rules are a **denylist**: a value is accepted unless it is empty,
//! starts with `-`, or contains one of [`FORBIDDEN_CHARS`]. Characters not
//! enumerated there (for example `;`, `(`, `~`, `^`, `:`) pass. A strict
//! allowlist such as `^[A-Za-z0-9._/-]+$` with no leading hyphen would close
//! those gaps, but it would also reject refs the pipeline currently accepts,
//! so the denylist is kept as is.
//!
//! # Examples
//!
//! ```
//! use shallowmirror::core::types::{validate_branch_is_secure, validate_ref_is_secure};
//!
//! assert_eq!(validate_ref_is_secure("v1.2.3").unwrap(), "v1.2.3");
//! assert_eq!(validate_branch_is_secure("feature/x_y").unwrap(), "feature/x_y");
//!
//! assert!(validate_ref_is_secure("--upload-pack=evil").is_err());
//! assert!(validate_branch_is_secure("main && rm -rf /").is_err());
//! ```

use thiserror::Error;

/// Characters that are never accepted in a ref or branch name.
///
/// Whitespace, NUL and the shell metacharacters used for substitution,
/// piping, backgrounding and redirection.
pub const FORBIDDEN_CHARS: [char; 11] = [
    ' ', '\t', '\n', '\r', '\0', '`', '$', '|', '&', '<', '>',
];

/// Why a value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The value was empty.
    Empty,
    /// The value starts with `-` and would be parsed as a flag.
    LeadingHyphen,
    /// The value contains a forbidden character.
    ForbiddenChar(char),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Empty => write!(f, "value is empty"),
            Rejection::LeadingHyphen => write!(f, "value starts with '-'"),
            Rejection::ForbiddenChar(c) => write!(f, "value contains forbidden character {c:?}"),
        }
    }
}

/// Errors from ref and branch validation.
///
/// Both variants carry the rejected value verbatim so pipeline code can
/// report exactly which input was unsafe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("insecure ref {value:?}: {reason}")]
    InsecureRef { value: String, reason: Rejection },

    #[error("insecure branch name {value:?}: {reason}")]
    InsecureBranch { value: String, reason: Rejection },
}

impl ValidationError {
    /// The rejected value.
    pub fn value(&self) -> &str {
        match self {
            ValidationError::InsecureRef { value, .. } => value,
            ValidationError::InsecureBranch { value, .. } => value,
        }
    }

    /// The reason the value was rejected.
    pub fn reason(&self) -> Rejection {
        match self {
            ValidationError::InsecureRef { reason, .. } => *reason,
            ValidationError::InsecureBranch { reason, .. } => *reason,
        }
    }
}

/// Validate a ref (branch, tag or commit) before it reaches a command.
///
/// Returns the input unchanged when it is accepted.
///
/// # Errors
///
/// Returns [`ValidationError::InsecureRef`] if the value is empty, starts
/// with `-`, or contains any of [`FORBIDDEN_CHARS`].
pub fn validate_ref_is_secure(value: &str) -> Result<&str, ValidationError> {
    check(value).map_err(|reason| ValidationError::InsecureRef {
        value: value.to_string(),
        reason,
    })?;
    Ok(value)
}

/// Validate a branch name before it reaches a command.
///
/// Same rules as [`validate_ref_is_secure`], reported as
/// [`ValidationError::InsecureBranch`].
pub fn validate_branch_is_secure(value: &str) -> Result<&str, ValidationError> {
    check(value).map_err(|reason| ValidationError::InsecureBranch {
        value: value.to_string(),
        reason,
    })?;
    Ok(value)
}

fn check(value: &str) -> Result<(), Rejection> {
    if value.is_empty() {
        return Err(Rejection::Empty);
    }
    if value.starts_with('-') {
        return Err(Rejection::LeadingHyphen);
    }
    if let Some(c) = value.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(Rejection::ForbiddenChar(c));
    }
    Ok(())
}
