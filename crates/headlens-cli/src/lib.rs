//! # headlens-cli
//!
//! Command-line front end for headlens.
//!
//! Provides commands for:
//! - Machines with routes, exit-node state and expiry
//! - Users and their pre-auth keys
//! - Server-wide overview counters
//!
//! Settings come from flags, their environment variables, and an optional
//! TOML file, in that order of precedence. See [`config::Settings`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use config::{FileConfig, Settings};
pub use error::CliError;
pub use output::OutputFormat;
