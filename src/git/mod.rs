//! git
//!
//! Process-level access to the `git` binary.
//!
//! # Architecture
//!
//! This module is the **only doorway** to external processes. All git
//! subcommands are expressed as [`exec::Invocation`] argument arrays and run
//! through a [`exec::CommandRunner`]; nothing in the crate builds a shell
//! command string.
//!
//! # Responsibilities
//!
//! - Spawning commands with bounded output capture ([`exec`])
//! - Normalizing failures (exit status, stderr, output overflow) into
//!   [`exec::ExecError`]
//! - Memoizing working-copy probes with request coalescing ([`stat_cache`])
//!
//! # Invariants
//!
//! - One OS process per [`exec::CommandRunner::run`] call, no retries
//! - Concurrent probes for the same (directory, kind) share one subprocess

pub mod exec;
pub mod stat_cache;

pub use exec::{CommandRunner, ExecError, Invocation, SystemRunner};
pub use stat_cache::{StatCache, StatKind};
