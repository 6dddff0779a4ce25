//! Configuration module for procwatch
//!
//! Provides XDG-compliant layered configuration loading and the batch
//! manifest format.

pub mod loader;
pub mod manifest;
pub mod model;

pub use loader::{config_paths, find_config_files, load_config};
pub use manifest::{load_manifest, CommandSpec, Manifest};
pub use model::*;
