//! Commands that change a working copy.

use anyhow::Result;
use serde::Serialize;

use super::{print_json, Context};

#[derive(Debug, Serialize)]
struct Done<'a> {
    action: &'static str,
    url: &'a str,
    target: &'a str,
}

fn report(ctx: &Context, action: &'static str, url: &str, target: &str) -> Result<()> {
    if ctx.json {
        return print_json(&Done {
            action,
            url,
            target,
        });
    }
    println!("{action}: {target}");
    Ok(())
}

/// Check out a ref.
pub async fn checkout(ctx: &Context, url: &str, git_ref: &str) -> Result<()> {
    ctx.mirror.checkout(url, git_ref).await?;
    report(ctx, "checked out", url, git_ref)
}

/// Switch to or create a branch.
pub async fn branch(ctx: &Context, url: &str, name: &str, from_ref: &str) -> Result<()> {
    ctx.mirror.create_branch(url, name, from_ref).await?;
    report(ctx, "on branch", url, name)
}

/// Fast-forward from origin.
pub async fn pull(ctx: &Context, url: &str, git_ref: &str) -> Result<()> {
    ctx.mirror.pull(url, git_ref).await?;
    report(ctx, "pulled", url, git_ref)
}

/// Stage tracked changes.
pub async fn add(ctx: &Context, url: &str, pathspec: Option<&str>) -> Result<()> {
    let pathspec = pathspec.unwrap_or(".");
    ctx.mirror.add_updated(url, pathspec).await?;
    report(ctx, "staged", url, pathspec)
}

/// Commit staged changes.
pub async fn commit(ctx: &Context, url: &str, git_ref: &str, message: &str) -> Result<()> {
    ctx.mirror.commit(url, git_ref, message).await?;
    report(ctx, "committed", url, git_ref)
}

/// Create an annotated tag.
pub async fn tag(
    ctx: &Context,
    url: &str,
    git_ref: &str,
    name: &str,
    message: &str,
    conflict_details: Option<&str>,
) -> Result<()> {
    ctx.mirror
        .create_tag_for_ref(url, git_ref, name, message, conflict_details)
        .await?;
    report(ctx, "tagged", url, name)
}
