// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for posture analysis.
//!
//! This module contains the command-line interface logic, including argument parsing
//! and the `analyze` command implementation.

// Modules
/// CLI arguments.
pub mod args;

/// Analysis command.
pub mod analyze;
