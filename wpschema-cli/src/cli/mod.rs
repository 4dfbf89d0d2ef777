//! Command-line interface definitions and handlers

pub mod commands;

pub use commands::{Cli, Commands};
