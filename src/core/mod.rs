//! core
//!
//! Domain rules shared by every layer.
//!
//! # Modules
//!
//! - [`types`] - Validation of untrusted refs and branch names
//! - [`paths`] - Mapping repository URLs to working-copy directories
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Nothing here spawns processes or touches the network
//! - Validation is deterministic and runs before any side effect

pub mod config;
pub mod paths;
pub mod types;
