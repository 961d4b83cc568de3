//! mirror::init
//!
//! Bringing a working copy into existence and onto a requested ref.
//!
//! # State machine
//!
//! For each `(url, ref)` request:
//!
//! 1. Resolve the working-copy directory from the URL
//! 2. Shallow-clone if the directory is missing (fatal on failure)
//! 3. Probe the current tag descriptor and branch (memoized)
//! 4. Stop if either already equals the ref
//! 5. `checkout --force --quiet <ref>`
//! 6. If that fails: fetch the ref from `origin` and retry the checkout once
//!
//! A successful checkout clears the directory's cached probes, so the next
//! request sees the new HEAD.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::{Mirror, MirrorError, Result};
use crate::core::types::validate_ref_is_secure;
use crate::git::exec::Invocation;
use crate::git::stat_cache::StatKind;

impl Mirror {
    /// Ensure a working copy for `url` exists and, if `git_ref` is given,
    /// that it is checked out. Returns the working-copy directory.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::Validation`] if the ref is unsafe (nothing is run)
    /// - [`MirrorError::Clone`] if the initial clone fails
    /// - [`MirrorError::Command`] if the checkout fails after the
    ///   fetch-and-retry recovery
    #[instrument(skip(self))]
    pub async fn init_repo(&self, url: &str, git_ref: Option<&str>) -> Result<PathBuf> {
        if let Some(git_ref) = git_ref {
            validate_ref_is_secure(git_ref)?;
        }

        let dir = self.working_copy_dir(url)?;
        self.ensure_clone(url, &dir).await?;

        let Some(git_ref) = git_ref else {
            return Ok(dir);
        };

        if self.current_tag_in(&dir).await? == git_ref
            || self.current_branch_in(&dir).await? == git_ref
        {
            debug!(dir = %dir.display(), "already at requested ref");
            return Ok(dir);
        }

        self.checkout_with_recovery(&dir, git_ref).await?;
        self.clear_working_copy_stat(&dir);
        Ok(dir)
    }

    /// Tag descriptor of the working copy's HEAD (`git describe --tags --always`).
    pub async fn current_tag(&self, url: &str) -> Result<String> {
        let dir = self.init_repo(url, None).await?;
        self.current_tag_in(&dir).await
    }

    /// Branch the working copy is on; empty when HEAD is detached.
    pub async fn current_branch(&self, url: &str) -> Result<String> {
        let dir = self.init_repo(url, None).await?;
        self.current_branch_in(&dir).await
    }

    pub(crate) async fn current_tag_in(&self, dir: &Path) -> Result<String> {
        self.stats()
            .memoize(dir, StatKind::Tag, || async {
                let out = self.git(dir, ["describe", "--tags", "--always"]).await?;
                Ok::<_, MirrorError>(out.trim().to_string())
            })
            .await
    }

    pub(crate) async fn current_branch_in(&self, dir: &Path) -> Result<String> {
        self.stats()
            .memoize(dir, StatKind::Branch, || async {
                let out = self.git(dir, ["branch", "--show-current"]).await?;
                Ok::<_, MirrorError>(out.trim().to_string())
            })
            .await
    }

    async fn ensure_clone(&self, url: &str, dir: &Path) -> Result<()> {
        let exists = tokio::fs::try_exists(dir)
            .await
            .map_err(|e| MirrorError::io(dir, e))?;
        if exists {
            return Ok(());
        }

        let root = self.storage_root();
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| MirrorError::io(root, e))?;

        info!(%url, dir = %dir.display(), depth = self.clone_depth(), "cloning");

        let depth = self.clone_depth().to_string();
        let clone = Invocation::git(["clone", "--depth", depth.as_str()])
            .args(["--quiet", "--no-single-branch", "--", url])
            .arg(dir);

        if let Err(source) = self.run(clone).await {
            // A clone that exits zero but warns still leaves a working copy.
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => debug!(dir = %dir.display(), "removed partial clone"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove partial clone"),
            }
            return Err(MirrorError::Clone {
                url: url.to_string(),
                source,
            });
        }
        Ok(())
    }

    async fn checkout_in(&self, dir: &Path, git_ref: &str) -> Result<()> {
        self.git(dir, ["checkout", "--force", "--quiet", git_ref, "--"])
            .await?;
        Ok(())
    }

    async fn checkout_with_recovery(&self, dir: &Path, git_ref: &str) -> Result<()> {
        let Err(first) = self.checkout_in(dir, git_ref).await else {
            return Ok(());
        };

        // Shallow history may not contain the ref yet.
        warn!(dir = %dir.display(), %git_ref, error = %first, "checkout failed, fetching ref and retrying");
        self.git(dir, ["fetch", "--quiet", "--tags", "origin", git_ref])
            .await?;
        self.checkout_in(dir, git_ref).await
    }
}
