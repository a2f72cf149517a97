//! Resolve and delete commands.

use std::io::Write;

use anyhow::{Context, Result};
use mantra_core::{Clock, ConflictEngine, ExerciseId, ExerciseStore, GroupId};

/// Keeps `keep` and deletes the other members of `group`.
pub fn run<W, S, C>(
    writer: &mut W,
    engine: &ConflictEngine<S, C>,
    group: &str,
    keep: i64,
) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let group_id = GroupId::new(group).context("invalid group ID")?;
    let report = engine
        .resolve(ExerciseId::new(keep), &group_id)
        .with_context(|| format!("failed to resolve conflict group {group_id}"))?;

    let removed: Vec<String> = report.removed.iter().map(ToString::to_string).collect();
    writeln!(
        writer,
        "Kept exercise {} ({}); removed {}.",
        report.kept.id,
        report.kept.name,
        removed.join(", ")
    )?;
    Ok(())
}

/// Deletes one exercise.
pub fn delete<W, S, C>(writer: &mut W, engine: &ConflictEngine<S, C>, id: i64) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
{
    let deleted = engine
        .delete(ExerciseId::new(id))
        .with_context(|| format!("failed to delete exercise {id}"))?;
    writeln!(writer, "Deleted exercise {} ({}).", deleted.id, deleted.name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use insta::assert_snapshot;
    use mantra_core::{
        EngineError, ExerciseSource, FixedClock, InMemoryStore, NewExercise, RetentionPolicy,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 4, 8, 6, 0, 0).unwrap()
    }

    fn engine() -> ConflictEngine<InMemoryStore, FixedClock> {
        let engine =
            ConflictEngine::new(InMemoryStore::new(), FixedClock::new(t0()), RetentionPolicy::Now);
        let candidates = [("Run", 0), ("Ride", 10), ("Row", 20)]
            .into_iter()
            .map(|(name, start)| {
                NewExercise::new(
                    name,
                    30,
                    100,
                    t0() + Duration::minutes(start),
                    ExerciseSource::Manual,
                )
                .unwrap()
            })
            .collect();
        engine.merge(candidates).unwrap();
        engine
    }

    #[test]
    fn resolve_reports_kept_and_removed() {
        let engine = engine();
        let group = engine.groups().unwrap().remove(0);

        let mut output = Vec::new();
        run(&mut output, &engine, group.id.as_str(), 2).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"Kept exercise 2 (Ride); removed 1, 3.");
        assert!(engine.groups().unwrap().is_empty());
    }

    #[test]
    fn resolve_unknown_group_fails() {
        let engine = engine();
        let err = run(&mut Vec::new(), &engine, "no-such-group", 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::GroupNotFound { .. })
        ));
        assert_eq!(engine.stored().unwrap().len(), 3);
    }

    #[test]
    fn resolve_rejects_blank_group() {
        let engine = engine();
        assert!(run(&mut Vec::new(), &engine, "  ", 1).is_err());
    }

    #[test]
    fn delete_reports_removed_exercise() {
        let engine = engine();
        let mut output = Vec::new();
        delete(&mut output, &engine, 3).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"Deleted exercise 3 (Row).");

        let err = delete(&mut Vec::new(), &engine, 3).unwrap_err();
        assert!(err.to_string().contains("failed to delete exercise 3"));
    }
}
