//! CLI module for artsweep - command-line interface.
//!
//! A single command: every flag feeds one sweep run.

pub mod commands;

pub use commands::Cli;
