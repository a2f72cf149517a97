//! An in-process [`ExerciseStore`].
//!
//! Useful for embedding and tests. Every operation succeeds, so the error type
//! is [`Infallible`].

use std::collections::BTreeMap;
use std::convert::Infallible;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::exercise::{Exercise, NewExercise};
use crate::store::{ExerciseStore, Snapshot, SnapshotPublisher};
use crate::types::ExerciseId;

#[derive(Debug)]
pub struct InMemoryStore {
    records: BTreeMap<ExerciseId, Exercise>,
    next_id: i64,
    publisher: SnapshotPublisher,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
            publisher: SnapshotPublisher::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn assign(&mut self, exercise: &NewExercise) -> Exercise {
        let id = ExerciseId::new(self.next_id);
        self.next_id += 1;
        let stored = exercise.clone().into_exercise(id);
        self.records.insert(id, stored.clone());
        stored
    }

    fn sorted(&self) -> Vec<Exercise> {
        let mut records: Vec<Exercise> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        records
    }

    fn publish(&self) {
        self.publisher.publish(self.records.values().cloned().collect());
    }
}

impl ExerciseStore for InMemoryStore {
    type Error = Infallible;

    fn insert(&mut self, exercise: &NewExercise) -> Result<Exercise, Self::Error> {
        let stored = self.assign(exercise);
        self.publish();
        Ok(stored)
    }

    fn insert_batch(&mut self, exercises: &[NewExercise]) -> Result<Vec<Exercise>, Self::Error> {
        if exercises.is_empty() {
            return Ok(Vec::new());
        }
        let stored = exercises.iter().map(|e| self.assign(e)).collect();
        self.publish();
        Ok(stored)
    }

    fn update_batch(&mut self, exercises: &[Exercise]) -> Result<usize, Self::Error> {
        self.apply(&[], exercises).map(|(_, updated)| updated)
    }

    fn delete_by_ids(&mut self, ids: &[ExerciseId]) -> Result<usize, Self::Error> {
        self.apply(ids, &[]).map(|(deleted, _)| deleted)
    }

    fn apply(
        &mut self,
        deletes: &[ExerciseId],
        updates: &[Exercise],
    ) -> Result<(usize, usize), Self::Error> {
        let mut deleted = 0;
        for id in deletes {
            if self.records.remove(id).is_some() {
                deleted += 1;
            }
        }
        let mut updated = 0;
        for exercise in updates {
            if let Some(slot) = self.records.get_mut(&exercise.id) {
                slot.clone_from(exercise);
                updated += 1;
            }
        }
        if deleted + updated > 0 {
            self.publish();
        }
        Ok((deleted, updated))
    }

    fn get(&self, id: ExerciseId) -> Result<Option<Exercise>, Self::Error> {
        Ok(self.records.get(&id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Exercise>, Self::Error> {
        Ok(self.sorted())
    }

    fn list_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Exercise>, Self::Error> {
        if end <= start {
            return Ok(Vec::new());
        }
        Ok(self
            .sorted()
            .into_iter()
            .filter(|e| e.start_time >= start && e.start_time < end)
            .collect())
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.publisher.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::types::{ExerciseSource, GroupId};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn new_exercise(name: &str, start: i64) -> NewExercise {
        NewExercise::new(name, 30, 100, ts(start), ExerciseSource::Manual).unwrap()
    }

    #[test]
    fn ids_are_assigned_and_never_reused() {
        let mut store = InMemoryStore::new();
        let a = store.insert(&new_exercise("a", 0)).unwrap();
        let b = store.insert(&new_exercise("b", 10)).unwrap();
        assert_eq!(a.id, ExerciseId::new(1));
        assert_eq!(b.id, ExerciseId::new(2));

        assert!(store.delete_by_id(b.id).unwrap());
        let c = store.insert(&new_exercise("c", 20)).unwrap();
        assert_eq!(c.id, ExerciseId::new(3));
    }

    #[test]
    fn update_skips_unknown_ids() {
        let mut store = InMemoryStore::new();
        let a = store.insert(&new_exercise("a", 0)).unwrap();
        let tagged = a.with_group(Some(GroupId::new("g").unwrap()));
        let ghost = Exercise {
            id: ExerciseId::new(99),
            ..a.clone()
        };

        assert_eq!(store.update_batch(&[tagged.clone(), ghost]).unwrap(), 1);
        assert_eq!(store.get(a.id).unwrap(), Some(tagged));
        assert!(!store.delete_by_id(ExerciseId::new(99)).unwrap());
    }

    #[test]
    fn list_in_range_is_half_open() {
        let mut store = InMemoryStore::new();
        store
            .insert_batch(&[new_exercise("a", 0), new_exercise("b", 30), new_exercise("c", 60)])
            .unwrap();

        let names: Vec<String> = store
            .list_in_range(ts(0), ts(60))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store.list_in_range(ts(60), ts(0)).unwrap().is_empty());
    }

    #[test]
    fn writes_publish_snapshots() {
        let mut store = InMemoryStore::new();
        let mut rx = store.subscribe();
        assert!(rx.borrow().is_empty());

        store.insert(&new_exercise("late", 60)).unwrap();
        store.insert(&new_exercise("early", 0)).unwrap();
        assert!(rx.has_changed().unwrap());

        let names: Vec<String> = rx
            .borrow_and_update()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn noop_writes_do_not_publish() {
        let mut store = InMemoryStore::new();
        let rx = store.subscribe();
        store.insert_batch(&[]).unwrap();
        store.delete_by_ids(&[ExerciseId::new(5)]).unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn apply_deletes_and_updates_together() {
        let mut store = InMemoryStore::new();
        let stored = store
            .insert_batch(&[new_exercise("a", 0), new_exercise("b", 10)])
            .unwrap();
        let mut rx = store.subscribe();

        let untagged = stored[1].with_group(None);
        assert_eq!(store.apply(&[stored[0].id], &[untagged.clone()]).unwrap(), (1, 1));
        assert_eq!(store.list_all().unwrap(), vec![untagged]);
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
