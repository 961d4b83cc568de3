//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Calls one [`Mirror`] operation
//! 2. Formats and displays the result as text or, with `--json`, as JSON
//!
//! # Async Commands
//!
//! Mirror operations are async. [`dispatch`] builds a tokio runtime once
//! and drives the selected handler to completion on it.

mod read;
mod write;

// Re-export command functions for testing and direct invocation
pub use read::{cat, check_ref, dir, files, folders, last_commit, tags};
pub use write::{add, branch, checkout, commit, pull, tag};

use anyhow::Result;
use serde::Serialize;

use crate::cli::args::Command;
use crate::mirror::Mirror;

/// Everything a handler needs.
#[derive(Debug)]
pub struct Context {
    pub mirror: Mirror,
    /// Print JSON instead of text
    pub json: bool,
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        match command {
            // Reading
            Command::Folders { url, path, git_ref } => {
                folders(ctx, &url, path.as_deref(), git_ref.as_deref()).await
            }
            Command::Files {
                url,
                path,
                git_ref,
                exclude,
            } => files(ctx, &url, path.as_deref(), git_ref.as_deref(), &exclude).await,
            Command::Cat { url, path, git_ref } => cat(ctx, &url, &path, git_ref.as_deref()).await,
            Command::LastCommit { url, path, git_ref } => {
                last_commit(ctx, &url, &path, git_ref.as_deref()).await
            }
            Command::Tags { url } => tags(ctx, &url).await,

            // Writing
            Command::Checkout { url, git_ref } => checkout(ctx, &url, &git_ref).await,
            Command::Branch {
                url,
                branch: name,
                from_ref,
            } => branch(ctx, &url, &name, &from_ref).await,
            Command::Pull { url, git_ref } => pull(ctx, &url, &git_ref).await,
            Command::Add { url, pathspec } => add(ctx, &url, pathspec.as_deref()).await,
            Command::Commit {
                url,
                git_ref,
                message,
            } => commit(ctx, &url, &git_ref, &message).await,
            Command::Tag {
                url,
                git_ref,
                tag: name,
                message,
                conflict_details,
            } => {
                tag(
                    ctx,
                    &url,
                    &git_ref,
                    &name,
                    &message,
                    conflict_details.as_deref(),
                )
                .await
            }

            // Utilities
            Command::CheckRef { value, branch } => check_ref(ctx, &value, branch),
            Command::Dir { url } => dir(ctx, &url),
        }
    })
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print one item per line, or a JSON array with `--json`.
pub(crate) fn print_list(ctx: &Context, items: &[String]) -> Result<()> {
    if ctx.json {
        return print_json(items);
    }
    for item in items {
        println!("{item}");
    }
    Ok(())
}
