//! mirror::refs
//!
//! Tags, branches and history-changing operations on a working copy.
//!
//! # Invariants
//!
//! - Every ref, branch and tag argument is validated before any subprocess
//! - Every operation that moves HEAD or adds refs clears the working copy's
//!   cached probes once it succeeds
//! - Commits and tags are made with a repository-scoped identity, never the
//!   user's global git config
//!
//! # Message quoting
//!
//! Commit and tag messages have `'` replaced by `"` before use, and stored
//! tag messages are compared after the same substitution. Messages travel as
//! a single argument so no further escaping happens.

use std::path::Path;

use tracing::{debug, info, instrument};

use super::{Mirror, MirrorError, Result};
use crate::core::types::{validate_branch_is_secure, validate_ref_is_secure};
use crate::git::stat_cache::StatKind;

fn normalize_message(message: &str) -> String {
    message.replace('\'', "\"")
}

fn lines(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl Mirror {
    /// All tags in the working copy, as git orders them.
    #[instrument(skip(self))]
    pub async fn list_tags(&self, url: &str) -> Result<Vec<String>> {
        let dir = self.init_repo(url, None).await?;
        let out = self.git(&dir, ["tag"]).await?;
        Ok(lines(&out))
    }

    /// Check out `git_ref`, fetching it first if shallow history lacks it.
    pub async fn checkout(&self, url: &str, git_ref: &str) -> Result<()> {
        self.init_repo(url, Some(git_ref)).await?;
        Ok(())
    }

    /// Switch to `branch`, creating it from `from_ref` if it does not exist
    /// locally.
    #[instrument(skip(self))]
    pub async fn create_branch(&self, url: &str, branch: &str, from_ref: &str) -> Result<()> {
        validate_branch_is_secure(branch)?;
        validate_ref_is_secure(from_ref)?;
        let dir = self.init_repo(url, None).await?;

        let exists = self
            .local_branches_in(&dir)
            .await?
            .iter()
            .any(|b| b == branch);

        if exists {
            debug!(%branch, "switching to existing branch");
            self.git(&dir, ["checkout", "--force", "--quiet", branch, "--"])
                .await?;
        } else {
            info!(%branch, %from_ref, "creating branch");
            self.git(&dir, ["checkout", "--quiet", "-b", branch, from_ref])
                .await?;
        }

        self.clear_working_copy_stat(&dir);
        Ok(())
    }

    /// Fast-forward the working copy to `origin/<git_ref>`.
    ///
    /// There is no merge fallback: a diverged branch is an error.
    #[instrument(skip(self))]
    pub async fn pull(&self, url: &str, git_ref: &str) -> Result<()> {
        let dir = self.init_repo(url, Some(git_ref)).await?;
        self.git(&dir, ["pull", "--ff-only", "--quiet", "origin", git_ref])
            .await?;
        self.clear_working_copy_stat(&dir);
        Ok(())
    }

    /// Stage modifications and deletions of tracked files matching
    /// `pathspec`. Untracked files are never added.
    #[instrument(skip(self))]
    pub async fn add_updated(&self, url: &str, pathspec: &str) -> Result<()> {
        let dir = self.init_repo(url, None).await?;
        self.git(&dir, ["add", "--update", "--", pathspec]).await?;
        Ok(())
    }

    /// Commit the staged changes on top of `git_ref`.
    #[instrument(skip(self, message))]
    pub async fn commit(&self, url: &str, git_ref: &str, message: &str) -> Result<()> {
        let dir = self.init_repo(url, Some(git_ref)).await?;
        self.configure_identity(&dir).await?;

        let message = normalize_message(message);
        self.git(&dir, ["commit", "--no-gpg-sign", "-m", message.as_str()])
            .await?;
        self.clear_working_copy_stat(&dir);
        Ok(())
    }

    /// Create annotated tag `tag` at `git_ref`.
    ///
    /// Idempotent: if the tag already exists with the same message this is a
    /// no-op. If it exists with a different message the result is
    /// [`MirrorError::Conflict`] carrying `conflict_details`, or a generated
    /// description when none is given.
    #[instrument(skip(self, message, conflict_details))]
    pub async fn create_tag_for_ref(
        &self,
        url: &str,
        git_ref: &str,
        tag: &str,
        message: &str,
        conflict_details: Option<&str>,
    ) -> Result<()> {
        validate_ref_is_secure(tag)?;
        let dir = self.init_repo(url, Some(git_ref)).await?;
        let message = normalize_message(message);

        if let Some(existing) = self.tag_message_in(&dir, tag).await? {
            let existing = normalize_message(&existing);
            if existing.trim_end() == message.trim_end() {
                debug!(%tag, "tag already exists with the same message");
                return Ok(());
            }
            let details = conflict_details.map(str::to_string).unwrap_or_else(|| {
                format!(
                    "tag {tag} already exists with message {:?}, refusing to replace it with {:?}",
                    existing.trim_end(),
                    message.trim_end()
                )
            });
            return Err(MirrorError::Conflict {
                tag: tag.to_string(),
                details,
            });
        }

        self.configure_identity(&dir).await?;
        info!(%tag, %git_ref, "creating tag");
        // Tagging an annotated tag directly makes git print a nested-tag hint.
        let target = format!("{git_ref}^{{commit}}");
        self.git(
            &dir,
            [
                "tag",
                "-a",
                "--cleanup=verbatim",
                tag,
                target.as_str(),
                "-m",
                message.as_str(),
            ],
        )
        .await?;
        self.clear_working_copy_stat(&dir);
        Ok(())
    }

    async fn local_branches_in(&self, dir: &Path) -> Result<Vec<String>> {
        let out = self
            .stats()
            .memoize(dir, StatKind::LocalBranches, || async {
                self.git(dir, ["branch", "--format=%(refname:short)"]).await
            })
            .await?;
        Ok(lines(&out))
    }

    /// Annotation of an existing tag, or `None` if the tag does not exist.
    async fn tag_message_in(&self, dir: &Path, tag: &str) -> Result<Option<String>> {
        let listed = self.git(dir, ["tag", "--list", tag]).await?;
        if !lines(&listed).iter().any(|t| t == tag) {
            return Ok(None);
        }
        let message = self
            .git(dir, ["tag", "--list", "--format=%(contents)", tag])
            .await?;
        Ok(Some(message))
    }

    async fn configure_identity(&self, dir: &Path) -> Result<()> {
        let identity = self.identity();
        self.git(dir, ["config", "user.email", identity.email.as_str()])
            .await?;
        self.git(dir, ["config", "user.name", identity.name.as_str()])
            .await?;
        Ok(())
    }
}
