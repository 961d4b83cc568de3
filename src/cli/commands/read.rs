//! Read-only commands: listing, reading and inspecting working copies.
//!
//! These never move HEAD unless `--ref` is given, in which case the working
//! copy is checked out at that ref first.

use std::io::Write;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{print_json, print_list, Context};
use crate::core::types::{validate_branch_is_secure, validate_ref_is_secure};
use crate::mirror::Exclude;

#[derive(Debug, Serialize)]
struct FileEntry<'a> {
    path: &'a str,
    size: usize,
    executable: bool,
}

#[derive(Debug, Serialize)]
struct LastCommit<'a> {
    path: &'a str,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct CheckedRef<'a> {
    value: &'a str,
    kind: &'static str,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// List immediate subdirectories.
pub async fn folders(ctx: &Context, url: &str, path: Option<&str>, git_ref: Option<&str>) -> Result<()> {
    let folders = ctx
        .mirror
        .list_folders(url, path.unwrap_or_default(), git_ref)
        .await?;
    print_list(ctx, &folders)
}

/// List files recursively. Executable files get a trailing `*` in text
/// output.
pub async fn files(
    ctx: &Context,
    url: &str,
    path: Option<&str>,
    git_ref: Option<&str>,
    exclude: &[String],
) -> Result<()> {
    let excludes: Vec<Exclude> = exclude.iter().map(|p| Exclude::pattern(p.as_str())).collect();
    let files = ctx
        .mirror
        .list_files(url, path.unwrap_or_default(), git_ref, &excludes)
        .await?;

    if ctx.json {
        let entries: Vec<FileEntry<'_>> = files
            .iter()
            .map(|f| FileEntry {
                path: &f.path,
                size: f.content.len(),
                executable: f.executable,
            })
            .collect();
        return print_json(&entries);
    }

    for file in &files {
        let marker = if file.executable { "*" } else { "" };
        println!("{}{marker}", file.path);
    }
    Ok(())
}

/// Print a file verbatim.
pub async fn cat(ctx: &Context, url: &str, path: &str, git_ref: Option<&str>) -> Result<()> {
    let content = ctx.mirror.read_file(url, path, git_ref).await?;
    if ctx.json {
        return print_json(&content);
    }
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(content.as_bytes())
        .context("failed to write to stdout")?;
    stdout.flush()?;
    Ok(())
}

/// Print the last commit time of a file, or `unknown` without history.
pub async fn last_commit(ctx: &Context, url: &str, path: &str, git_ref: Option<&str>) -> Result<()> {
    let timestamp = ctx
        .mirror
        .last_commit_time_for_file(url, path, git_ref)
        .await?;

    if ctx.json {
        return print_json(&LastCommit { path, timestamp });
    }
    match timestamp {
        Some(time) => println!("{}", time.to_rfc3339()),
        None => println!("unknown"),
    }
    Ok(())
}

/// List tags.
pub async fn tags(ctx: &Context, url: &str) -> Result<()> {
    let tags = ctx.mirror.list_tags(url).await?;
    print_list(ctx, &tags)
}

/// Validate a ref (or, with `branch`, a branch name) without touching git.
pub fn check_ref(ctx: &Context, value: &str, branch: bool) -> Result<()> {
    let (kind, checked) = if branch {
        ("branch", validate_branch_is_secure(value))
    } else {
        ("ref", validate_ref_is_secure(value))
    };

    if ctx.json {
        print_json(&CheckedRef {
            value,
            kind,
            valid: checked.is_ok(),
            reason: checked.as_ref().err().map(ToString::to_string),
        })?;
    }
    checked?;

    if !ctx.json {
        println!("ok: {value}");
    }
    Ok(())
}

/// Print the working-copy directory for a URL.
pub fn dir(ctx: &Context, url: &str) -> Result<()> {
    let dir = ctx.mirror.working_copy_dir(url)?;
    if ctx.json {
        return print_json(&dir);
    }
    println!("{}", dir.display());
    Ok(())
}
