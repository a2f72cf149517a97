//! Conflicts command for listing overlapping exercises by group.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use mantra_core::{Clock, ConflictEngine, ConflictGroup, ExerciseStore};
use serde::Serialize;

use super::list::JsonExercise;
use super::util::{format_local, truncate};

// ========== Human-Readable Output ==========

pub fn write_groups<W: Write>(
    writer: &mut W,
    groups: &[ConflictGroup],
    offset: FixedOffset,
) -> Result<()> {
    if groups.is_empty() {
        writeln!(writer, "No conflicts.")?;
        return Ok(());
    }

    writeln!(writer, "CONFLICTS ({})", groups.len())?;
    for group in groups {
        writeln!(writer)?;
        writeln!(
            writer,
            "Group {}  starts {}  spread {} min",
            group.id,
            format_local(group.representative_date, offset),
            group.time_span().num_minutes()
        )?;
        for exercise in &group.exercises {
            writeln!(
                writer,
                "  {:>4}  {}-{}  {:<20}  {}",
                exercise.id,
                exercise.start_time.with_timezone(&offset).format("%H:%M"),
                exercise.end_time().with_timezone(&offset).format("%H:%M"),
                truncate(&exercise.name, 20),
                exercise.source
            )?;
        }
    }
    writeln!(writer)?;
    writeln!(
        writer,
        "Tip: Use 'mantra resolve <group> --keep <id>' to keep one exercise per group."
    )?;
    Ok(())
}

// ========== JSON Output ==========

#[derive(Debug, Serialize)]
pub struct JsonGroup {
    pub id: String,
    pub representative_date: String,
    pub time_span_minutes: i64,
    pub exercises: Vec<JsonExercise>,
}

pub fn format_json(groups: &[ConflictGroup]) -> Result<String> {
    let json: Vec<JsonGroup> = groups
        .iter()
        .map(|group| JsonGroup {
            id: group.id.to_string(),
            representative_date: group.representative_date.to_rfc3339(),
            time_span_minutes: group.time_span().num_minutes(),
            exercises: group.exercises.iter().map(JsonExercise::from).collect(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&json)?)
}

// ========== Public Interface ==========

/// Runs the conflicts command.
pub fn run<W, S, C>(
    writer: &mut W,
    engine: &ConflictEngine<S, C>,
    json: bool,
    offset: FixedOffset,
) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let groups = engine.groups().context("failed to read conflict groups")?;
    if json {
        writeln!(writer, "{}", format_json(&groups)?)?;
    } else {
        write_groups(writer, &groups, offset)?;
    }
    Ok(())
}
