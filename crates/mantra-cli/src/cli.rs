//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Exercise planner with overlap detection.
///
/// Schedules exercises, imports sessions from fitness platforms, and flags
/// exercises whose time slots overlap so they can be resolved.
#[derive(Debug, Parser)]
#[command(name = "mantra", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Schedule an exercise.
    Add {
        /// Exercise name (e.g., "Morning run").
        #[arg(long)]
        name: String,

        /// Duration in minutes.
        #[arg(long)]
        duration: i64,

        /// Calories burned.
        #[arg(long, default_value_t = 0)]
        calories: i64,

        /// Start time: RFC 3339, "in 2 hours", or "30 minutes ago".
        #[arg(long)]
        at: String,
    },

    /// List live exercises.
    List {
        /// Only exercises starting at or after this time.
        #[arg(long)]
        from: Option<String>,

        /// Only exercises starting before this time.
        #[arg(long)]
        to: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show conflict groups.
    Conflicts {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve a conflict group by keeping one exercise and deleting the rest.
    Resolve {
        /// Conflict group ID (from `mantra conflicts`).
        group: String,

        /// ID of the exercise to keep.
        #[arg(long)]
        keep: i64,
    },

    /// Delete an exercise.
    Delete {
        /// Exercise ID.
        id: i64,
    },

    /// Merge sessions from the configured fitness platform.
    Sync {
        /// Read sessions from a JSON lines file instead of the platform API.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Purge exercises that start before the retention horizon.
    Cleanup,

    /// Recompute conflict groups.
    Detect,

    /// Show counts for the live set.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_parses_relative_start() {
        let cli = Cli::try_parse_from([
            "mantra", "add", "--name", "Run", "--duration", "30", "--at", "in 2 hours",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Add { duration: 30, calories: 0, ref at, .. }) if at == "in 2 hours"
        ));
    }

    #[test]
    fn resolve_takes_group_and_keep() {
        let cli = Cli::try_parse_from(["mantra", "resolve", "group-1", "--keep", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Resolve { ref group, keep: 7 }) if group == "group-1"
        ));
    }
}
