//! The persistence boundary the conflict engine writes through.
//!
//! Stores publish an immutable [`Snapshot`] after every committed write.
//! Subscribers observe snapshots through a `tokio::sync::watch` receiver, so
//! they only ever see the latest completed state and never call back into the
//! writer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::exercise::{Exercise, NewExercise};
use crate::types::ExerciseId;

/// An immutable view of every stored record, ordered by start time then ID.
pub type Snapshot = Arc<[Exercise]>;

/// A durable, queryable collection of exercise records.
///
/// Implementations must make `insert_batch`, `update_batch`, `delete_by_ids`
/// and `apply` all-or-nothing, and must publish a new snapshot after each
/// write that commits (and never after one that fails).
pub trait ExerciseStore: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts one record and returns it with its assigned ID.
    fn insert(&mut self, exercise: &NewExercise) -> Result<Exercise, Self::Error>;

    /// Inserts records in one transaction, returning them in input order.
    fn insert_batch(&mut self, exercises: &[NewExercise]) -> Result<Vec<Exercise>, Self::Error>;

    /// Overwrites stored records by ID. Unknown IDs are skipped.
    ///
    /// Returns how many records were updated.
    fn update_batch(&mut self, exercises: &[Exercise]) -> Result<usize, Self::Error>;

    /// Overwrites one record. Returns `false` if the ID is unknown.
    fn update(&mut self, exercise: &Exercise) -> Result<bool, Self::Error> {
        self.update_batch(std::slice::from_ref(exercise))
            .map(|updated| updated == 1)
    }

    /// Deletes records by ID, returning how many existed.
    fn delete_by_ids(&mut self, ids: &[ExerciseId]) -> Result<usize, Self::Error>;

    /// Deletes one record. Returns `false` if the ID is unknown.
    fn delete_by_id(&mut self, id: ExerciseId) -> Result<bool, Self::Error> {
        self.delete_by_ids(&[id]).map(|deleted| deleted == 1)
    }

    /// Deletes `deletes` and overwrites `updates` in one write that commits
    /// entirely or not at all.
    ///
    /// Returns `(deleted, updated)` counts.
    fn apply(
        &mut self,
        deletes: &[ExerciseId],
        updates: &[Exercise],
    ) -> Result<(usize, usize), Self::Error>;

    fn get(&self, id: ExerciseId) -> Result<Option<Exercise>, Self::Error>;

    /// Lists every stored record, ordered by start time then ID.
    fn list_all(&self) -> Result<Vec<Exercise>, Self::Error>;

    /// Lists records with `start <= start_time < end`.
    fn list_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Exercise>, Self::Error>;

    /// Subscribes to snapshots published after each committed write.
    ///
    /// The receiver starts at the current snapshot, marked as seen.
    fn subscribe(&self) -> watch::Receiver<Snapshot>;
}

/// Owns the sending half of a store's snapshot channel.
#[derive(Debug)]
pub struct SnapshotPublisher {
    tx: watch::Sender<Snapshot>,
}

impl SnapshotPublisher {
    pub fn new(initial: Vec<Exercise>) -> Self {
        let (tx, _rx) = watch::channel(Self::freeze(initial));
        Self { tx }
    }

    /// Replaces the current snapshot, whether or not anyone is subscribed.
    pub fn publish(&self, exercises: Vec<Exercise>) {
        self.tx.send_replace(Self::freeze(exercises));
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    fn freeze(mut exercises: Vec<Exercise>) -> Snapshot {
        exercises.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        exercises.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::types::ExerciseSource;

    fn exercise(id: i64, start_minutes: i64) -> Exercise {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap()
            + Duration::minutes(start_minutes);
        NewExercise::new("Walk", 10, 0, start, ExerciseSource::Manual)
            .unwrap()
            .into_exercise(ExerciseId::new(id))
    }

    #[test]
    fn publisher_orders_snapshot() {
        let publisher = SnapshotPublisher::new(Vec::new());
        publisher.publish(vec![exercise(2, 30), exercise(3, 0), exercise(1, 30)]);

        let rx = publisher.subscribe();
        let ids: Vec<i64> = rx.borrow().iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn publish_without_subscribers_is_kept() {
        let publisher = SnapshotPublisher::new(Vec::new());
        publisher.publish(vec![exercise(1, 0)]);
        assert_eq!(publisher.subscribe().borrow().len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_later_publishes() {
        let publisher = SnapshotPublisher::new(Vec::new());
        let mut rx = publisher.subscribe();
        assert!(!rx.has_changed().unwrap());

        publisher.publish(vec![exercise(1, 0)]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
