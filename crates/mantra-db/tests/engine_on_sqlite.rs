//! Runs the conflict engine against a file-backed database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use mantra_core::{
    ConflictEngine, ExerciseSource, ExerciseStore, FixedClock, NewExercise, RetentionPolicy,
};
use mantra_db::Database;
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 9, 2, 6, 0, 0).unwrap()
}

fn ts(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

fn exercise(name: &str, start: i64, duration: i64) -> NewExercise {
    NewExercise::new(name, duration, 200, ts(start), ExerciseSource::Manual).unwrap()
}

fn open_engine(dir: &TempDir, clock: &FixedClock) -> ConflictEngine<Database, FixedClock> {
    let db = Database::open(&dir.path().join("mantra.db")).expect("open database");
    ConflictEngine::new(db, clock.clone(), RetentionPolicy::Now)
}

#[test]
fn conflict_tags_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = FixedClock::new(t0());

    let (a, b) = {
        let engine = open_engine(&dir, &clock);
        let a = engine.add(exercise("Yoga", 0, 60)).expect("add");
        let b = engine.add(exercise("Run", 30, 30)).expect("add");
        engine.add(exercise("Swim", 240, 30)).expect("add");
        (a, b)
    };

    let engine = open_engine(&dir, &clock);
    let groups = engine.conflict_groups().current();
    assert_eq!(groups.len(), 1);
    let ids: Vec<_> = groups[0].exercises.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert_eq!(groups[0].time_span(), Duration::minutes(30));
}

#[test]
fn resolve_and_delete_reach_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = FixedClock::new(t0());
    let engine = open_engine(&dir, &clock);

    let x = engine.add(exercise("X", 0, 30)).expect("add");
    let y = engine.add(exercise("Y", 10, 30)).expect("add");
    engine.add(exercise("Z", 20, 30)).expect("add");
    let group = engine.conflict_groups().current().remove(0);

    engine.resolve(y.id, &group.id).expect("resolve");
    drop(engine);

    let db = Database::open(&dir.path().join("mantra.db")).expect("reopen");
    let stored = db.list_all().expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, y.id);
    assert!(!stored[0].is_conflicted());
    assert_eq!(db.get(x.id).expect("get"), None);
}

#[test]
fn expired_rows_are_purged_on_next_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = FixedClock::new(t0());
    let engine = open_engine(&dir, &clock);

    engine.add(exercise("Early", 0, 30)).expect("add");
    engine.add(exercise("Overlap", 15, 30)).expect("add");
    clock.advance(Duration::hours(2));

    let late = engine.add(exercise("Late", 180, 30)).expect("add");
    let stored = engine.stored().expect("stored");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, late.id);
    assert!(!stored[0].is_conflicted());
}

#[test]
fn merge_into_database_skips_reimports() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = FixedClock::new(t0());
    let engine = open_engine(&dir, &clock);

    let imported = vec![
        NewExercise::new("Walk", 40, 160, ts(0), ExerciseSource::GoogleHealth).unwrap(),
        NewExercise::new("Ride", 60, 400, ts(30), ExerciseSource::GoogleHealth).unwrap(),
    ];
    let first = engine.merge(imported.clone()).expect("merge");
    assert_eq!(first.inserted, 2);
    assert_eq!(first.detect.groups, 1);

    let second = engine.merge(imported).expect("merge");
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(engine.stored().expect("stored").len(), 2);
}

#[test]
fn resynced_session_with_submillisecond_start_is_a_duplicate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = FixedClock::new(t0());
    let engine = open_engine(&dir, &clock);
    let session = NewExercise {
        name: "Swim".to_string(),
        duration_minutes: 40,
        calories: 280,
        start_time: ts(60) + Duration::microseconds(123_456),
        source: ExerciseSource::GoogleHealth,
    };

    let first = engine.merge(vec![session.clone()]).expect("merge");
    assert_eq!(first.inserted, 1);
    let second = engine.merge(vec![session]).expect("merge");
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 1);

    let stored = engine.stored().expect("stored");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].start_time, ts(60) + Duration::milliseconds(123));
    assert!(engine.conflict_groups().current().is_empty());
}
