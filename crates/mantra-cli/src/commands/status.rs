//! Status command for showing counts over the live set.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use mantra_core::{Clock, ConflictEngine, ExerciseStore, RetentionPolicy};

use super::util::format_local;

pub fn run<W, S, C>(
    writer: &mut W,
    engine: &ConflictEngine<S, C>,
    database_path: &Path,
    offset: FixedOffset,
) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let summary = engine.summary().context("failed to summarize exercises")?;
    let policy = match engine.policy() {
        RetentionPolicy::Now => "now",
        RetentionPolicy::StartOfDay { .. } => "start of day",
    };

    writeln!(writer, "Exercise planner status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(
        writer,
        "Horizon: {} ({policy})",
        format_local(summary.horizon, offset)
    )?;
    writeln!(writer, "Live exercises: {}", summary.live)?;
    writeln!(
        writer,
        "Conflicted: {} in {} group(s)",
        summary.conflicted, summary.groups
    )?;
    if summary.expired > 0 {
        writeln!(
            writer,
            "Awaiting cleanup: {} (run 'mantra cleanup')",
            summary.expired
        )?;
    }
    Ok(())
}
