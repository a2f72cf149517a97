//! Cleanup and detect commands.
//!
//! Every mutating command already purges and re-detects; these run the same
//! passes on demand.

use std::io::Write;

use anyhow::{Context, Result};
use mantra_core::{Clock, ConflictEngine, ExerciseStore};

pub fn cleanup<W, S, C>(writer: &mut W, engine: &ConflictEngine<S, C>) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let removed = engine.cleanup().context("cleanup failed")?;
    // Purging can split groups, so retag what remains.
    engine.detect().context("conflict detection failed")?;
    writeln!(writer, "Removed {removed} expired exercise(s).")?;
    Ok(())
}

pub fn detect<W, S, C>(writer: &mut W, engine: &ConflictEngine<S, C>) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let report = engine.detect().context("conflict detection failed")?;
    writeln!(
        writer,
        "Found {} conflict group(s) covering {} exercise(s); {} tag(s) updated.",
        report.groups, report.conflicted, report.updated
    )?;
    Ok(())
}
