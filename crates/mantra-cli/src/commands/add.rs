//! Add command for scheduling a manual exercise.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use mantra_core::{Clock, ConflictEngine, ExerciseSource, ExerciseStore, NewExercise};

use super::util::format_local;

/// Raw `mantra add` arguments.
#[derive(Debug, Clone)]
pub struct AddArgs {
    pub name: String,
    pub duration_minutes: i64,
    pub calories: i64,
    pub start_time: DateTime<Utc>,
}

pub fn run<W, S, C>(
    writer: &mut W,
    engine: &ConflictEngine<S, C>,
    args: AddArgs,
    offset: FixedOffset,
) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let exercise = NewExercise::new(
        args.name,
        args.duration_minutes,
        args.calories,
        args.start_time,
        ExerciseSource::Manual,
    )?;
    let stored = engine.add(exercise).context("failed to add exercise")?;

    writeln!(
        writer,
        "Added exercise {}: {} at {} ({} min, {} kcal)",
        stored.id,
        stored.name,
        format_local(stored.start_time, offset),
        stored.duration_minutes,
        stored.calories
    )?;

    if let Some(group_id) = &stored.conflict_group_id {
        let others: Vec<String> = engine
            .groups()
            .context("failed to read conflict groups")?
            .into_iter()
            .find(|group| &group.id == group_id)
            .map(|group| {
                group
                    .exercises
                    .iter()
                    .filter(|e| e.id != stored.id)
                    .map(|e| format!("{} ({})", e.id, e.name))
                    .collect()
            })
            .unwrap_or_default();
        writeln!(writer, "Overlaps with: {}", others.join(", "))?;
        writeln!(
            writer,
            "Resolve with 'mantra resolve {group_id} --keep <id>'."
        )?;
    }

    Ok(())
}
