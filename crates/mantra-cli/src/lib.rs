//! Exercise planner CLI library.
//!
//! This crate provides the CLI interface for the exercise planner.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::{Config, Retention, SourceConfig};

/// The engine as the binary runs it: SQLite storage and the system clock.
pub type Engine = mantra_core::ConflictEngine<mantra_db::Database>;
