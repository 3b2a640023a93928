//! CLI command handlers

pub mod commands;

pub use commands::{check, complete, completions, hover, render_diagnostic, run, symbols};
