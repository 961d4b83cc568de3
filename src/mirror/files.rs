//! mirror::files
//!
//! Reading the tree of a working copy at a given ref.
//!
//! Paths handed in and out of this module are repository-relative and use
//! `/` separators. A leading `/` is accepted and means the repository root.
//! `..` components are rejected with [`MirrorError::InvalidPath`].
//!
//! Walking never descends into `.git` and never follows symlinks.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use super::{Mirror, MirrorError, Result};

const GIT_DIR: &str = ".git";

/// A regular file found by [`Mirror::list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    /// Repository-relative path, `/`-separated
    pub path: String,
    pub content: Vec<u8>,
    /// Owner-execute bit of the file mode; always false off Unix
    pub executable: bool,
}

/// Computes an exclusion pattern from the requested ref.
pub type RefPattern = Arc<dyn Fn(Option<&str>) -> String + Send + Sync>;

/// A rule removing paths from a [`Mirror::list_files`] result.
#[derive(Clone)]
pub enum Exclude {
    /// Exactly this repository-relative path.
    Path(String),
    /// Every path starting with this pattern, which ends in `/`.
    Prefix(String),
    /// A pattern computed once per listing from the requested ref. A result
    /// ending in `/` is treated as a prefix, anything else as a path.
    ForRef(RefPattern),
}

impl Exclude {
    /// Classify a static pattern by its trailing `/`.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if pattern.ends_with('/') {
            Exclude::Prefix(pattern)
        } else {
            Exclude::Path(pattern)
        }
    }

    pub fn for_ref<F>(f: F) -> Self
    where
        F: Fn(Option<&str>) -> String + Send + Sync + 'static,
    {
        Exclude::ForRef(Arc::new(f))
    }

    fn resolve(&self, git_ref: Option<&str>) -> Matcher {
        match self {
            Exclude::Path(p) => Matcher::Exact(trim_root(p).to_string()),
            Exclude::Prefix(p) => Matcher::Prefix(trim_root(p).to_string()),
            Exclude::ForRef(f) => {
                let pattern = f(git_ref);
                if pattern.ends_with('/') {
                    Matcher::Prefix(trim_root(&pattern).to_string())
                } else {
                    Matcher::Exact(trim_root(&pattern).to_string())
                }
            }
        }
    }
}

impl fmt::Debug for Exclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclude::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Exclude::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            Exclude::ForRef(_) => f.write_str("ForRef(..)"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Matcher {
    Exact(String),
    Prefix(String),
}

impl Matcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Exact(p) => path == p,
            Matcher::Prefix(p) => path.starts_with(p.as_str()),
        }
    }

    /// Whether everything below directory `dir` is excluded.
    fn prunes(&self, dir: &str) -> bool {
        match self {
            Matcher::Exact(_) => false,
            Matcher::Prefix(p) => format!("{dir}/").starts_with(p.as_str()),
        }
    }
}

fn trim_root(pattern: &str) -> &str {
    pattern.trim_start_matches('/')
}

/// Normalize a repository path: drop empty and `.` components, reject `..`.
pub(crate) fn repo_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(MirrorError::InvalidPath(path.to_string())),
            part => parts.push(part),
        }
    }
    Ok(parts.join("/"))
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

impl Mirror {
    /// Immediate subdirectories of `path`, sorted, without trailing `/`.
    ///
    /// Returns an empty list when `path` does not exist.
    #[instrument(skip(self))]
    pub async fn list_folders(
        &self,
        url: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<String>> {
        let rel = repo_path(path)?;
        let dir = self.init_repo(url, git_ref).await?;
        let base = dir.join(&rel);

        let mut entries = match tokio::fs::read_dir(&base).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MirrorError::io(&base, e)),
        };

        let mut folders = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MirrorError::io(&base, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| MirrorError::io(entry.path(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() && name != GIT_DIR {
                folders.push(join(&rel, &name));
            }
        }
        folders.sort();
        Ok(folders)
    }

    /// Every regular file under `path`, recursively, sorted by path.
    ///
    /// Symlinks and `.git` internals are skipped. Exclusion rules are
    /// resolved once against `git_ref` before the walk. Returns an empty list
    /// when `path` does not exist.
    #[instrument(skip(self, excludes))]
    pub async fn list_files(
        &self,
        url: &str,
        path: &str,
        git_ref: Option<&str>,
        excludes: &[Exclude],
    ) -> Result<Vec<RepoFile>> {
        let rel = repo_path(path)?;
        let dir = self.init_repo(url, git_ref).await?;
        let matchers: Vec<Matcher> = excludes.iter().map(|e| e.resolve(git_ref)).collect();

        let root = dir.join(&rel);
        let meta = match tokio::fs::symlink_metadata(&root).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MirrorError::io(&root, e)),
        };
        if meta.is_file() {
            if matchers.iter().any(|m| m.matches(&rel)) {
                return Ok(Vec::new());
            }
            let content = tokio::fs::read(&root)
                .await
                .map_err(|e| MirrorError::io(&root, e))?;
            return Ok(vec![RepoFile {
                path: rel,
                content,
                executable: is_executable(&meta),
            }]);
        }
        if !meta.is_dir() {
            return Ok(Vec::new());
        }

        // Walking is synchronous; keep it off the async workers.
        let walk_root = root.clone();
        let mut files =
            tokio::task::spawn_blocking(move || walk_files(&walk_root, &rel, &matchers))
                .await
                .map_err(|e| {
                    MirrorError::io(&root, std::io::Error::new(std::io::ErrorKind::Other, e))
                })??;

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = files.len(), "listed files");
        Ok(files)
    }

    /// Contents of a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Io`] if the file is missing and
    /// [`MirrorError::InvalidUtf8`] if it is not text.
    #[instrument(skip(self))]
    pub async fn read_file(&self, url: &str, filepath: &str, git_ref: Option<&str>) -> Result<String> {
        let rel = repo_path(filepath)?;
        let dir = self.init_repo(url, git_ref).await?;
        let path = dir.join(&rel);

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| MirrorError::io(&path, e))?;
        String::from_utf8(bytes).map_err(|_| MirrorError::InvalidUtf8 { path })
    }

    /// Author time of the most recent commit touching `filepath`.
    ///
    /// `None` when git reports no commit for the path (untracked or
    /// nonexistent files). Callers treat it as an invalid timestamp.
    #[instrument(skip(self))]
    pub async fn last_commit_time_for_file(
        &self,
        url: &str,
        filepath: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>> {
        let rel = repo_path(filepath)?;
        let dir = self.init_repo(url, git_ref).await?;

        let out = self
            .git(&dir, ["log", "-1", "--pretty=format:%at", "--", rel.as_str()])
            .await?;
        let raw = out.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let invalid = || MirrorError::InvalidTimestamp {
            path: rel.clone(),
            raw: raw.to_string(),
        };
        let secs: i64 = raw.parse().map_err(|_| invalid())?;
        DateTime::from_timestamp(secs, 0).map(Some).ok_or_else(invalid)
    }
}

/// Collect every regular file below `root`, whose repository path is `rel`.
fn walk_files(root: &Path, rel: &str, matchers: &[Matcher]) -> Result<Vec<RepoFile>> {
    let repo_rel = |entry: &DirEntry| -> String {
        let below = entry.path().strip_prefix(root).unwrap_or(entry.path());
        below
            .components()
            .fold(rel.to_string(), |acc, c| join(&acc, &c.as_os_str().to_string_lossy()))
    };

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            if entry.file_name() == GIT_DIR {
                return false;
            }
            if !entry.file_type().is_dir() {
                return true;
            }
            let child = repo_rel(entry);
            !matchers.iter().any(|m| m.prunes(&child))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        // Symlinks report their own type with follow_links(false).
        if !entry.file_type().is_file() {
            continue;
        }
        let path = repo_rel(&entry);
        if matchers.iter().any(|m| m.matches(&path)) {
            continue;
        }
        let meta = entry.metadata().map_err(|e| walk_error(root, e))?;
        let content =
            std::fs::read(entry.path()).map_err(|e| MirrorError::io(entry.path(), e))?;
        files.push(RepoFile {
            path,
            content,
            executable: is_executable(&meta),
        });
    }
    Ok(files)
}

fn walk_error(root: &Path, err: walkdir::Error) -> MirrorError {
    let path = err.path().unwrap_or(root).to_path_buf();
    MirrorError::io(path, err.into())
}
