//! List command for showing live exercises.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use mantra_core::{Clock, ConflictEngine, Exercise, ExerciseStore};
use serde::Serialize;

use super::util::{format_local, truncate};

/// Optional start-time window for `mantra list`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Window {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Live exercises in `window`, ordered by start time.
pub fn select<S: ExerciseStore, C: Clock>(
    engine: &ConflictEngine<S, C>,
    window: Window,
) -> Result<Vec<Exercise>> {
    if let (Some(from), Some(to)) = (window.from, window.to) {
        return engine
            .list_in_range(from, to)
            .context("failed to list exercises");
    }
    let live = engine.live().context("failed to list exercises")?;
    Ok(live
        .into_iter()
        .filter(|e| window.from.is_none_or(|from| e.start_time >= from))
        .filter(|e| window.to.is_none_or(|to| e.start_time < to))
        .collect())
}

// ========== Human-Readable Output ==========

pub fn write_table<W: Write>(
    writer: &mut W,
    exercises: &[Exercise],
    offset: FixedOffset,
) -> Result<()> {
    if exercises.is_empty() {
        writeln!(writer, "No exercises scheduled.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:>4}  {:<16}  {:<20}  {:>5}  {:>5}  {:<14}  Conflict",
        "ID", "Start", "Name", "Min", "Kcal", "Source"
    )?;
    writeln!(
        writer,
        "────  ────────────────  ────────────────────  ─────  ─────  ──────────────  ────────"
    )?;
    for exercise in exercises {
        let conflict = exercise
            .conflict_group_id
            .as_ref()
            .map(|id| id.as_str().chars().take(8).collect::<String>())
            .unwrap_or_default();
        let row = format!(
            "{:>4}  {:<16}  {:<20}  {:>5}  {:>5}  {:<14}  {}",
            exercise.id,
            format_local(exercise.start_time, offset),
            truncate(&exercise.name, 20),
            exercise.duration_minutes,
            exercise.calories,
            exercise.source,
            conflict
        );
        writeln!(writer, "{}", row.trim_end())?;
    }
    Ok(())
}

// ========== JSON Output ==========

/// One exercise as printed by `--json`.
#[derive(Debug, Serialize)]
pub struct JsonExercise {
    pub id: i64,
    pub name: String,
    pub duration_minutes: u32,
    pub calories: u32,
    pub start_time: String,
    pub end_time: String,
    pub source: String,
    pub is_conflicted: bool,
    pub conflict_group_id: Option<String>,
}

impl From<&Exercise> for JsonExercise {
    fn from(exercise: &Exercise) -> Self {
        Self {
            id: exercise.id.get(),
            name: exercise.name.clone(),
            duration_minutes: exercise.duration_minutes,
            calories: exercise.calories,
            start_time: exercise.start_time.to_rfc3339(),
            end_time: exercise.end_time().to_rfc3339(),
            source: exercise.source.to_string(),
            is_conflicted: exercise.is_conflicted(),
            conflict_group_id: exercise
                .conflict_group_id
                .as_ref()
                .map(|id| id.as_str().to_string()),
        }
    }
}

pub fn format_json(exercises: &[Exercise]) -> Result<String> {
    let json: Vec<JsonExercise> = exercises.iter().map(JsonExercise::from).collect();
    Ok(serde_json::to_string_pretty(&json)?)
}

// ========== Public Interface ==========

/// Runs the list command.
pub fn run<W, S, C>(
    writer: &mut W,
    engine: &ConflictEngine<S, C>,
    window: Window,
    json: bool,
    offset: FixedOffset,
) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let exercises = select(engine, window)?;
    if json {
        writeln!(writer, "{}", format_json(&exercises)?)?;
    } else {
        write_table(writer, &exercises, offset)?;
    }
    Ok(())
}
