//! shallowmirror - Secure shallow mirroring of remote Git repositories
//!
//! shallowmirror keeps shallow working copies of remote repositories under a
//! storage root and exposes the read and write operations a packaging
//! pipeline needs: listing and reading files at a ref, tagging, branching,
//! pulling and committing.
//!
//! # Architecture
//!
//! The codebase is layered:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to mirror)
//! - [`mirror`] - Repository initializer and operations API
//! - [`git`] - Single doorway to the `git` binary plus the stat cache
//! - [`core`] - Input validation, path derivation and configuration
//!
//! # Correctness Invariants
//!
//! 1. Every ref and branch is validated before it reaches a subprocess
//! 2. Subprocesses are spawned from argument arrays, never through a shell
//! 3. A command that exits non-zero or writes to stderr is a failure
//! 4. Concurrent probes of the same working-copy state share one subprocess

pub mod cli;
pub mod core;
pub mod git;
pub mod mirror;
