//! CLI module for procwatch
//!
//! Provides command-line interface with the following subcommands:
//! - `run` - Run one command with a timeout
//! - `batch` - Run every command of a manifest concurrently
//! - `config` - Show configuration

pub mod commands;

pub use commands::{Cli, Commands};
