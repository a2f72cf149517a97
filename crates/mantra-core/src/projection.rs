//! Live, read-only views over a store's published snapshots.
//!
//! Each view owns its own `watch` receiver, so views never block writers and
//! can be created again at any time to restart observation.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::conflict::{ConflictGroup, build_conflict_groups};
use crate::exercise::Exercise;
use crate::retention::{Clock, RetentionPolicy, is_live};
use crate::store::Snapshot;

/// Live records at `horizon`, ordered by start time then ID.
pub fn project_live(snapshot: &[Exercise], horizon: DateTime<Utc>) -> Vec<Exercise> {
    let mut live: Vec<Exercise> = snapshot
        .iter()
        .filter(|exercise| is_live(exercise, horizon))
        .cloned()
        .collect();
    live.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
    live
}

/// Continuously updated list of live exercises.
#[derive(Debug)]
pub struct LiveExercises<C> {
    rx: watch::Receiver<Snapshot>,
    clock: C,
    policy: RetentionPolicy,
}

impl<C: Clock> LiveExercises<C> {
    pub(crate) const fn new(rx: watch::Receiver<Snapshot>, clock: C, policy: RetentionPolicy) -> Self {
        Self { rx, clock, policy }
    }

    /// The view as of the latest published snapshot.
    pub fn current(&self) -> Vec<Exercise> {
        let snapshot = self.rx.borrow().clone();
        project_live(&snapshot, self.policy.horizon(self.clock.now()))
    }

    /// Waits for the next committed write and returns the recomputed view.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Vec<Exercise>> {
        self.rx.changed().await.ok()?;
        let snapshot = self.rx.borrow_and_update().clone();
        Some(project_live(&snapshot, self.policy.horizon(self.clock.now())))
    }
}

/// Continuously updated conflict groups, derived from [`LiveExercises`].
#[derive(Debug)]
pub struct LiveConflictGroups<C> {
    inner: LiveExercises<C>,
}

impl<C: Clock> LiveConflictGroups<C> {
    pub(crate) const fn new(inner: LiveExercises<C>) -> Self {
        Self { inner }
    }

    pub fn current(&self) -> Vec<ConflictGroup> {
        build_conflict_groups(&self.inner.current())
    }

    pub async fn changed(&mut self) -> Option<Vec<ConflictGroup>> {
        self.inner
            .changed()
            .await
            .map(|live| build_conflict_groups(&live))
    }
}
