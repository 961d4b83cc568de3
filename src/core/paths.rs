//! core::paths
//!
//! Working-copy path derivation.
//!
//! # Storage Layout
//!
//! Every mirrored repository gets exactly one directory directly under the
//! storage root, named after the last segment of its URL:
//!
//! ```text
//! <storage_root>/
//!   repo/          <- https://github.com/org/repo.git
//!   other/         <- git@host:team/other.git
//! ```
//!
//! **Hard rule:** no code may join a URL-derived name onto the storage root
//! by hand. All working-copy paths go through [`StoragePaths`].
//!
//! # Example
//!
//! ```
//! use shallowmirror::core::paths::{dir_for_repo_url, StoragePaths};
//! use std::path::PathBuf;
//!
//! assert_eq!(dir_for_repo_url("https://github.com/org/repo.git"), "/repo");
//!
//! let paths = StoragePaths::new("/var/cache/mirror");
//! assert_eq!(
//!     paths.working_copy("git@host:org/repo.git").unwrap(),
//!     PathBuf::from("/var/cache/mirror/repo")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Derive the working-copy directory name for a repository URL.
///
/// Takes the last segment of the URL (segments are separated by `/` or
/// `:`), after stripping one trailing `/` and then a trailing `.git`
/// (case-insensitive). The name is returned with a leading `/`.
///
/// # Example
///
/// ```
/// use shallowmirror::core::paths::dir_for_repo_url;
///
/// assert_eq!(dir_for_repo_url("https://github.com/org/repo.git"), "/repo");
/// assert_eq!(dir_for_repo_url("git@host:org/repo.git"), "/repo");
/// assert_eq!(dir_for_repo_url("https://host/org/Repo.GIT/"), "/Repo");
/// assert_eq!(dir_for_repo_url("https://host/org/repo/"), "/repo");
/// ```
pub fn dir_for_repo_url(url: &str) -> String {
    let url = url.strip_suffix('/').unwrap_or(url);
    let url = strip_git_suffix(url);
    let name = url.rsplit(['/', ':']).next().unwrap_or(url);
    format!("/{name}")
}

fn strip_git_suffix(s: &str) -> &str {
    const SUFFIX: &str = ".git";
    if s.len() >= SUFFIX.len() {
        let split = s.len() - SUFFIX.len();
        if s.is_char_boundary(split) && s[split..].eq_ignore_ascii_case(SUFFIX) {
            return &s[..split];
        }
    }
    s
}

/// Centralized path routing for mirrored working copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Create path routing under the given storage root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The working-copy directory for a repository URL.
    ///
    /// Returns `None` when the URL yields no usable directory name (empty,
    /// `.` or `..`), so that no URL can address the root itself or a path
    /// outside it.
    pub fn working_copy(&self, url: &str) -> Option<PathBuf> {
        let dir = dir_for_repo_url(url);
        let name = dir.trim_start_matches('/');
        if name.is_empty() || name == "." || name == ".." {
            return None;
        }
        Some(self.root.join(name))
    }
}
