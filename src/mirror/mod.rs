//! mirror
//!
//! Shallow working copies of remote repositories and the operations the
//! packaging pipeline runs against them.
//!
//! # Architecture
//!
//! [`Mirror`] is an explicitly constructed context. It owns the storage
//! root, the stat cache and the command runner, so two mirrors with
//! different roots never share state and tests can run in isolation.
//!
//! - [`init`] - Clone-or-reuse plus checkout with fetch-and-retry recovery
//! - [`files`] - Listing and reading files in a working copy
//! - [`refs`] - Tags, branches, pull, staging and commits
//!
//! Every operation validates its ref and branch arguments before any
//! subprocess runs, then obtains a ready working copy from
//! [`Mirror::init_repo`].
//!
//! # Concurrency
//!
//! `Mirror` is `Send + Sync`. Operations on different repositories may run
//! concurrently. Mutating operations on the *same* working copy must be
//! serialized by the caller; there is no per-directory lock.
//!
//! # Example
//!
//! ```no_run
//! use shallowmirror::mirror::Mirror;
//!
//! # async fn demo() -> shallowmirror::mirror::Result<()> {
//! let mirror = Mirror::new("/var/cache/shallowmirror");
//! let url = "https://github.com/org/repo.git";
//!
//! let readme = mirror.read_file(url, "README.md", Some("v1.0.0")).await?;
//! mirror.create_tag_for_ref(url, "v1.0.0", "mirror-v1.0.0", "mirrored", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod files;
pub mod init;
pub mod refs;

#[cfg(test)]
pub(crate) mod testing;

pub use files::{Exclude, RepoFile};

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::core::config::{Config, Identity, DEFAULT_CLONE_DEPTH};
use crate::core::paths::StoragePaths;
use crate::core::types::ValidationError;
use crate::git::exec::{CommandRunner, ExecError, Invocation, SystemRunner};
use crate::git::stat_cache::StatCache;

/// Errors from mirror operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A ref or branch argument was unsafe. Always an input bug.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A git command failed.
    #[error(transparent)]
    Command(#[from] ExecError),

    /// The initial clone failed.
    #[error("failed to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: ExecError,
    },

    /// A tag exists with a different message.
    #[error("{details}")]
    Conflict { tag: String, details: String },

    /// No working-copy directory can be derived from the URL.
    #[error("cannot derive a working-copy directory from url {0:?}")]
    InvalidUrl(String),

    /// A repository path escapes the working copy.
    #[error("path {0:?} is outside the working copy")]
    InvalidPath(String),

    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file is not valid UTF-8: {path}")]
    InvalidUtf8 { path: PathBuf },

    #[error("unparseable commit timestamp {raw:?} for {path}")]
    InvalidTimestamp { path: String, raw: String },
}

impl MirrorError {
    /// Whether this error came from rejecting unsafe input.
    pub fn is_validation(&self) -> bool {
        matches!(self, MirrorError::Validation(_))
    }

    /// Whether this error is a tag conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MirrorError::Conflict { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for mirror results.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Context for mirroring: storage root, stat cache, runner and settings.
#[derive(Debug)]
pub struct Mirror {
    paths: StoragePaths,
    runner: Arc<dyn CommandRunner>,
    stats: StatCache,
    clone_depth: u32,
    identity: Identity,
}

impl Mirror {
    /// Create a mirror that runs real `git` processes under `storage_root`.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self::with_runner(storage_root, Arc::new(SystemRunner::default()))
    }

    /// Create a mirror with a custom command runner.
    pub fn with_runner(storage_root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            paths: StoragePaths::new(storage_root),
            runner,
            stats: StatCache::new(),
            clone_depth: DEFAULT_CLONE_DEPTH,
            identity: Identity::default(),
        }
    }

    /// Create a mirror from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let runner = Arc::new(SystemRunner::new(config.max_output_bytes()));
        Self::with_runner(config.storage_root(), runner)
            .with_clone_depth(config.clone_depth())
            .with_identity(config.identity())
    }

    /// Set the depth of new shallow clones.
    pub fn with_clone_depth(mut self, depth: u32) -> Self {
        self.clone_depth = depth.max(1);
        self
    }

    /// Set the identity used for commits and annotated tags.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the storage root.
    ///
    /// Intended to be called once before any operation. Cached probes for
    /// working copies under the old root stay keyed by their old paths.
    pub fn set_storage_root(&mut self, root: impl Into<PathBuf>) {
        self.paths = StoragePaths::new(root);
    }

    pub fn storage_root(&self) -> &Path {
        self.paths.root()
    }

    pub fn clone_depth(&self) -> u32 {
        self.clone_depth
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn stats(&self) -> &StatCache {
        &self.stats
    }

    /// The working-copy directory a URL maps to.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidUrl`] when the URL has no usable last
    /// segment.
    pub fn working_copy_dir(&self, url: &str) -> Result<PathBuf> {
        self.paths
            .working_copy(url)
            .ok_or_else(|| MirrorError::InvalidUrl(url.to_string()))
    }

    /// Forget every cached probe for a working copy.
    ///
    /// Call this after mutating a working copy outside this crate.
    pub fn clear_working_copy_stat(&self, dir: &Path) {
        self.stats.clear(dir);
    }

    /// Run `git <args>` inside a working copy.
    pub(crate) async fn git<I, S>(&self, dir: &Path, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let invocation = Invocation::git(args).current_dir(dir);
        Ok(self.runner.run(&invocation).await?)
    }

    /// Run a git command with an invocation built by the caller.
    pub(crate) async fn run(&self, invocation: Invocation) -> std::result::Result<String, ExecError> {
        self.runner.run(&invocation).await
    }
}
