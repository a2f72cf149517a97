//! Storage layer for the exercise planner.
//!
//! Persists exercise records with `rusqlite` and implements
//! [`mantra_core::ExerciseStore`], so the conflict engine can run directly on
//! a database file.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The conflict engine already serializes access behind its own lock; other
//! callers sharing a `Database` across threads need a `Mutex<Database>`.
//!
//! # Schema
//!
//! One `exercises` table. `id` is `AUTOINCREMENT`, so IDs of deleted rows are
//! never handed out again.
//!
//! ## Timestamp Format
//!
//! `start_time` is stored as TEXT in RFC 3339 with millisecond precision and a
//! `Z` suffix (e.g., `2024-01-15T10:30:00.000Z`). Fixed width and UTC keep
//! lexicographic order equal to chronological order, which range queries rely on.
//!
//! ## Conflict Columns
//!
//! `is_conflicted` is kept next to `conflict_group_id` for readers of the raw
//! table. A `CHECK` constraint ties the two together: the flag is set exactly
//! when a group ID is present.
//!
//! # Snapshots
//!
//! Every committed write re-reads the table and publishes it to subscribers.
//! Failed writes roll back and publish nothing.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use mantra_core::{
    Exercise, ExerciseId, ExerciseSource, ExerciseStore, GroupId, NewExercise, Snapshot,
    SnapshotPublisher,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tokio::sync::watch;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored start time.
    #[error("invalid start time for exercise {id}: {timestamp}")]
    TimestampParse {
        id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row does not describe a valid exercise.
    #[error("invalid exercise row {id}: {message}")]
    InvalidRecord { id: i64, message: String },
    /// `COUNT(*)` returned a value that does not fit in `usize`.
    #[error("invalid row count: {0}")]
    InvalidCount(i64),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    publisher: SnapshotPublisher,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish_non_exhaustive()
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, duration_minutes, calories, start_time, source, conflict_group_id FROM exercises";

/// New records always start untagged.
const INSERT_EXERCISE: &str = "
    INSERT INTO exercises
    (name, duration_minutes, calories, start_time, source, is_conflicted, conflict_group_id)
    VALUES (?, ?, ?, ?, ?, 0, NULL)
";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        init(&conn)?;
        let existing = list_ordered(&conn)?;
        tracing::debug!(records = existing.len(), "opened exercise database");
        Ok(Self {
            conn,
            publisher: SnapshotPublisher::new(existing),
        })
    }

    /// Number of stored records, expired ones included.
    pub fn count(&self) -> Result<usize, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM exercises", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| DbError::InvalidCount(count))
    }

    /// Sends the current table to subscribers.
    ///
    /// Runs after a commit, so a failed read is logged and the write still
    /// reports success. Subscribers catch up on the next write.
    fn publish(&self) {
        match list_ordered(&self.conn) {
            Ok(records) => self.publisher.publish(records),
            Err(err) => tracing::warn!(error = %err, "failed to publish exercise snapshot"),
        }
    }
}

/// Initializes the database schema.
///
/// This is idempotent - safe to call on an already-initialized database.
fn init(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        -- start_time: RFC 3339, UTC, millisecond precision
        -- source: manual | google_health | samsung_health | garmin
        CREATE TABLE IF NOT EXISTS exercises (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL CHECK (duration_minutes >= 0),
            calories INTEGER NOT NULL CHECK (calories >= 0),
            start_time TEXT NOT NULL,
            source TEXT NOT NULL,
            is_conflicted INTEGER NOT NULL DEFAULT 0,
            conflict_group_id TEXT,
            CHECK (is_conflicted = (conflict_group_id IS NOT NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_exercises_start_time ON exercises(start_time);
        CREATE INDEX IF NOT EXISTS idx_exercises_conflict_group ON exercises(conflict_group_id);
        ",
    )?;
    Ok(())
}

impl ExerciseStore for Database {
    type Error = DbError;

    fn insert(&mut self, exercise: &NewExercise) -> Result<Exercise, DbError> {
        self.conn.execute(
            INSERT_EXERCISE,
            params![
                exercise.name,
                exercise.duration_minutes,
                exercise.calories,
                format_timestamp(exercise.start_time),
                exercise.source.as_str(),
            ],
        )?;
        let id = ExerciseId::new(self.conn.last_insert_rowid());
        self.publish();
        Ok(exercise.clone().into_exercise(id))
    }

    fn insert_batch(&mut self, exercises: &[NewExercise]) -> Result<Vec<Exercise>, DbError> {
        if exercises.is_empty() {
            return Ok(Vec::new());
        }
        let tx = self.conn.transaction()?;
        let mut stored = Vec::with_capacity(exercises.len());
        {
            let mut stmt = tx.prepare(INSERT_EXERCISE)?;
            for exercise in exercises {
                let id = stmt.insert(params![
                    exercise.name,
                    exercise.duration_minutes,
                    exercise.calories,
                    format_timestamp(exercise.start_time),
                    exercise.source.as_str(),
                ])?;
                stored.push(exercise.clone().into_exercise(ExerciseId::new(id)));
            }
        }
        tx.commit()?;
        tracing::debug!(inserted = stored.len(), "inserted exercises");
        self.publish();
        Ok(stored)
    }

    fn update_batch(&mut self, exercises: &[Exercise]) -> Result<usize, DbError> {
        self.apply(&[], exercises).map(|(_, updated)| updated)
    }

    fn delete_by_ids(&mut self, ids: &[ExerciseId]) -> Result<usize, DbError> {
        self.apply(ids, &[]).map(|(deleted, _)| deleted)
    }

    fn apply(
        &mut self,
        deletes: &[ExerciseId],
        updates: &[Exercise],
    ) -> Result<(usize, usize), DbError> {
        if deletes.is_empty() && updates.is_empty() {
            return Ok((0, 0));
        }
        let tx = self.conn.transaction()?;
        let deleted = delete_rows(&tx, deletes)?;
        let updated = update_rows(&tx, updates)?;
        tx.commit()?;
        if deleted + updated > 0 {
            tracing::debug!(deleted, updated, "applied exercise changes");
            self.publish();
        }
        Ok((deleted, updated))
    }

    fn get(&self, id: ExerciseId) -> Result<Option<Exercise>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?"),
                [id.get()],
                ExerciseRow::from_row,
            )
            .optional()?;
        row.map(ExerciseRow::into_exercise).transpose()
    }

    fn list_all(&self) -> Result<Vec<Exercise>, DbError> {
        list_ordered(&self.conn)
    }

    /// The range is inclusive of `start` and exclusive of `end`.
    fn list_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Exercise>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        query_exercises(
            &self.conn,
            &format!(
                "{SELECT_COLUMNS} WHERE start_time >= ? AND start_time < ? ORDER BY start_time ASC, id ASC"
            ),
            [format_timestamp(start), format_timestamp(end)],
        )
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.publisher.subscribe()
    }
}

/// A row as stored, before validation.
struct ExerciseRow {
    id: i64,
    name: String,
    duration_minutes: i64,
    calories: i64,
    start_time: String,
    source: String,
    conflict_group_id: Option<String>,
}

impl ExerciseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            duration_minutes: row.get(2)?,
            calories: row.get(3)?,
            start_time: row.get(4)?,
            source: row.get(5)?,
            conflict_group_id: row.get(6)?,
        })
    }

    fn into_exercise(self) -> Result<Exercise, DbError> {
        let id = self.id;
        let invalid = |message: String| DbError::InvalidRecord { id, message };
        let start_time = parse_timestamp(&self.start_time, id)?;
        let source: ExerciseSource = self.source.parse().map_err(|err| invalid(format!("{err}")))?;
        let duration_minutes = u32::try_from(self.duration_minutes)
            .map_err(|_| invalid(format!("duration out of range: {}", self.duration_minutes)))?;
        let calories = u32::try_from(self.calories)
            .map_err(|_| invalid(format!("calories out of range: {}", self.calories)))?;
        let conflict_group_id = self
            .conflict_group_id
            .map(GroupId::new)
            .transpose()
            .map_err(|err| invalid(format!("{err}")))?;

        Ok(Exercise {
            id: ExerciseId::new(id),
            name: self.name,
            duration_minutes,
            calories,
            start_time,
            source,
            conflict_group_id,
        })
    }
}

fn delete_rows(conn: &Connection, ids: &[ExerciseId]) -> Result<usize, DbError> {
    let mut stmt = conn.prepare("DELETE FROM exercises WHERE id = ?")?;
    let mut deleted = 0;
    for id in ids {
        deleted += stmt.execute([id.get()])?;
    }
    Ok(deleted)
}

fn update_rows(conn: &Connection, exercises: &[Exercise]) -> Result<usize, DbError> {
    let mut stmt = conn.prepare(
        "
        UPDATE exercises
        SET name = ?, duration_minutes = ?, calories = ?, start_time = ?, source = ?,
            is_conflicted = ?, conflict_group_id = ?
        WHERE id = ?
        ",
    )?;
    let mut updated = 0;
    for exercise in exercises {
        updated += stmt.execute(params![
            exercise.name,
            exercise.duration_minutes,
            exercise.calories,
            format_timestamp(exercise.start_time),
            exercise.source.as_str(),
            exercise.is_conflicted(),
            exercise.conflict_group_id.as_ref().map(GroupId::as_str),
            exercise.id.get(),
        ])?;
    }
    Ok(updated)
}

fn list_ordered(conn: &Connection) -> Result<Vec<Exercise>, DbError> {
    query_exercises(
        conn,
        &format!("{SELECT_COLUMNS} ORDER BY start_time ASC, id ASC"),
        [],
    )
}

fn query_exercises<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Exercise>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, ExerciseRow::from_row)?;
    let mut exercises = Vec::new();
    for row in rows {
        exercises.push(row?.into_exercise()?);
    }
    Ok(exercises)
}

fn parse_timestamp(timestamp: &str, id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
