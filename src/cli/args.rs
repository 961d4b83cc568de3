//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--storage-root <dir>`: Where working copies live (overrides config)
//! - `--config <file>`: Load this config file instead of searching
//! - `--debug`: Enable debug logging
//! - `--json`: Machine-readable output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// smirror - Shallow mirrors of remote Git repositories
#[derive(Parser, Debug)]
#[command(name = "smirror")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Directory holding one working copy per repository
    #[arg(long, global = true, value_name = "DIR")]
    pub storage_root: Option<PathBuf>,

    /// Config file to load instead of the default search path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    // ========== Reading ==========
    /// List immediate subdirectories of a path
    Folders {
        /// Repository clone URL
        url: String,

        /// Repository-relative directory (default: root)
        path: Option<String>,

        /// Ref to check out first
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,
    },

    /// List files under a path, recursively
    #[command(after_help = "\
EXCLUDES:
    A pattern ending in '/' excludes everything below that directory.
    Any other pattern excludes exactly that path.

    smirror files https://github.com/org/repo.git --exclude docs/ --exclude README.md")]
    Files {
        /// Repository clone URL
        url: String,

        /// Repository-relative directory (default: root)
        path: Option<String>,

        /// Ref to check out first
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,

        /// Path or directory prefix to leave out (repeatable)
        #[arg(long, value_name = "PATTERN")]
        exclude: Vec<String>,
    },

    /// Print a file's contents
    Cat {
        /// Repository clone URL
        url: String,

        /// Repository-relative file path
        path: String,

        /// Ref to check out first
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,
    },

    /// Show when a file was last committed
    LastCommit {
        /// Repository clone URL
        url: String,

        /// Repository-relative file path
        path: String,

        /// Ref to check out first
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,
    },

    /// List tags
    Tags {
        /// Repository clone URL
        url: String,
    },

    // ========== Writing ==========
    /// Check out a ref, fetching it if the shallow history lacks it
    Checkout {
        /// Repository clone URL
        url: String,

        /// Branch, tag or commit
        #[arg(value_name = "REF")]
        git_ref: String,
    },

    /// Switch to a branch, creating it if needed
    Branch {
        /// Repository clone URL
        url: String,

        /// Branch name
        branch: String,

        /// Ref to create the branch from
        #[arg(long = "from", value_name = "REF")]
        from_ref: String,
    },

    /// Fast-forward a branch from origin
    Pull {
        /// Repository clone URL
        url: String,

        /// Branch to pull
        #[arg(value_name = "REF")]
        git_ref: String,
    },

    /// Stage changes to tracked files
    Add {
        /// Repository clone URL
        url: String,

        /// Pathspec to stage (default: everything)
        pathspec: Option<String>,
    },

    /// Commit staged changes
    Commit {
        /// Repository clone URL
        url: String,

        /// Ref to commit on
        #[arg(long = "ref", value_name = "REF")]
        git_ref: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Create an annotated tag (no-op if it exists with the same message)
    Tag {
        /// Repository clone URL
        url: String,

        /// Ref to tag
        #[arg(value_name = "REF")]
        git_ref: String,

        /// Tag name
        tag: String,

        /// Tag message
        #[arg(short, long)]
        message: String,

        /// Error text to report if the tag exists with another message
        #[arg(long, value_name = "TEXT")]
        conflict_details: Option<String>,
    },

    // ========== Utilities ==========
    /// Check whether a ref or branch name would be accepted
    CheckRef {
        /// Value to check
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Apply the branch-name rules
        #[arg(long)]
        branch: bool,
    },

    /// Print the working-copy directory for a URL
    Dir {
        /// Repository clone URL
        url: String,
    },
}
