//! The conflict detection and reconciliation engine.
//!
//! Every mutating entry point takes the store lock once and holds it for the
//! whole read-modify-write cycle: apply the mutation, purge expired records,
//! then recompute conflict tags from scratch and persist them as one batch.
//! Concurrent callers are serialized; readers go through the snapshot
//! projections and never wait on the lock.

use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;

use crate::conflict::{ConflictGroup, build_conflict_groups, plan_tagging};
use crate::error::EngineError;
use crate::exercise::{Exercise, NewExercise, START_TIME_PRECISION};
use crate::projection::{LiveConflictGroups, LiveExercises};
use crate::retention::{Clock, RetentionPolicy, SystemClock, partition_expired};
use crate::source::ExternalSource;
use crate::store::ExerciseStore;
use crate::types::{ExerciseId, ExerciseSource, GroupId, ValidationError};

/// Outcome of a detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectReport {
    /// Conflict groups found.
    pub groups: usize,
    /// Records now tagged as conflicted.
    pub conflicted: usize,
    /// Records whose tag was rewritten.
    pub updated: usize,
}

/// Outcome of merging candidates from an external source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub fetched: usize,
    pub inserted: usize,
    /// Candidates matching a stored record or an earlier candidate.
    pub duplicates: usize,
    /// Candidates that failed validation.
    pub invalid: usize,
    /// Candidates starting before the retention horizon.
    pub expired: usize,
    /// Stored records purged by the cleanup that followed the insert.
    pub purged: usize,
    pub detect: DetectReport,
}

/// Outcome of resolving a conflict group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveReport {
    /// The surviving record, untagged.
    pub kept: Exercise,
    pub removed: Vec<ExerciseId>,
}

/// Counts over the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub horizon: DateTime<Utc>,
    pub live: usize,
    pub conflicted: usize,
    pub groups: usize,
    /// Stored records before the horizon, waiting for cleanup.
    pub expired: usize,
}

/// Content key used to skip re-imported records.
///
/// Start times are compared at stored precision, so a candidate built with
/// finer timestamps still matches the row it was saved as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DuplicateKey {
    source: ExerciseSource,
    start_time: DateTime<Utc>,
    name: String,
    duration_minutes: u32,
}

impl DuplicateKey {
    fn of_stored(exercise: &Exercise) -> Self {
        Self {
            source: exercise.source,
            start_time: exercise.start_time.trunc_subsecs(START_TIME_PRECISION),
            name: exercise.name.clone(),
            duration_minutes: exercise.duration_minutes,
        }
    }

    fn of_candidate(exercise: &NewExercise) -> Self {
        Self {
            source: exercise.source,
            start_time: exercise.start_time.trunc_subsecs(START_TIME_PRECISION),
            name: exercise.name.clone(),
            duration_minutes: exercise.duration_minutes,
        }
    }
}

/// Keeps conflict tags on an [`ExerciseStore`] consistent with its contents.
pub struct ConflictEngine<S, C = SystemClock> {
    store: Mutex<S>,
    clock: C,
    policy: RetentionPolicy,
}

impl<S, C> std::fmt::Debug for ConflictEngine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S: ExerciseStore> ConflictEngine<S, SystemClock> {
    /// Creates an engine reading the system clock.
    pub fn with_system_clock(store: S, policy: RetentionPolicy) -> Self {
        Self::new(store, SystemClock, policy)
    }
}

impl<S: ExerciseStore, C: Clock> ConflictEngine<S, C> {
    pub fn new(store: S, clock: C, policy: RetentionPolicy) -> Self {
        Self {
            store: Mutex::new(store),
            clock,
            policy,
        }
    }

    pub const fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// The current retention horizon.
    pub fn horizon(&self) -> DateTime<Utc> {
        self.policy.horizon(self.clock.now())
    }

    /// Stores a new exercise, then purges and re-detects.
    ///
    /// Returns the stored record with its conflict tag.
    pub fn add(&self, exercise: NewExercise) -> Result<Exercise, EngineError> {
        exercise.validate()?;
        let horizon = self.horizon();
        if exercise.start_time < horizon {
            return Err(ValidationError::BeforeHorizon {
                start_time: exercise.start_time,
                horizon,
            }
            .into());
        }

        let mut store = self.store.lock();
        let inserted = store.insert(&exercise).map_err(EngineError::store)?;
        cleanup_locked(&mut *store, horizon)?;
        let report = detect_locked(&mut *store, horizon)?;
        let stored = store
            .get(inserted.id)
            .map_err(EngineError::store)?
            .unwrap_or(inserted);

        tracing::info!(
            id = %stored.id,
            name = %stored.name,
            conflicted = stored.is_conflicted(),
            groups = report.groups,
            "exercise added"
        );
        Ok(stored)
    }

    /// Fetches candidates from `source` and merges them.
    ///
    /// An unreachable or unauthorized source leaves the store untouched and is
    /// reported as [`EngineError::SourceUnavailable`].
    pub async fn merge_from_source<X: ExternalSource>(
        &self,
        source: &X,
    ) -> Result<MergeReport, EngineError> {
        let candidates = match source.fetch().await {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(
                    source = source.name(),
                    error = %err,
                    "exercise source unavailable"
                );
                return Err(EngineError::SourceUnavailable(err));
            }
        };
        tracing::debug!(
            source = source.name(),
            fetched = candidates.len(),
            "fetched candidates"
        );
        self.merge(candidates)
    }

    /// Merges already-fetched candidates.
    ///
    /// Candidates that fail validation, start before the horizon, or repeat a
    /// stored record (same source, start, name and duration) are skipped and
    /// counted. If nothing is left to insert the store is not written.
    pub fn merge(&self, candidates: Vec<NewExercise>) -> Result<MergeReport, EngineError> {
        let mut report = MergeReport {
            fetched: candidates.len(),
            ..MergeReport::default()
        };
        if candidates.is_empty() {
            return Ok(report);
        }

        let horizon = self.horizon();
        let mut store = self.store.lock();
        let mut seen: HashSet<DuplicateKey> = store
            .list_all()
            .map_err(EngineError::store)?
            .iter()
            .map(DuplicateKey::of_stored)
            .collect();

        let mut accepted = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Err(err) = candidate.validate() {
                tracing::warn!(error = %err, "skipping invalid candidate");
                report.invalid += 1;
                continue;
            }
            if candidate.start_time < horizon {
                report.expired += 1;
                continue;
            }
            if !seen.insert(DuplicateKey::of_candidate(&candidate)) {
                report.duplicates += 1;
                continue;
            }
            accepted.push(candidate);
        }

        if accepted.is_empty() {
            tracing::info!(?report, "nothing new to merge");
            return Ok(report);
        }

        report.inserted = store
            .insert_batch(&accepted)
            .map_err(EngineError::store)?
            .len();
        report.purged = cleanup_locked(&mut *store, horizon)?;
        report.detect = detect_locked(&mut *store, horizon)?;

        tracing::info!(?report, "merged exercises");
        Ok(report)
    }

    /// Deletes a record and re-detects the remaining ones.
    ///
    /// Returns the deleted record.
    pub fn delete(&self, id: ExerciseId) -> Result<Exercise, EngineError> {
        let horizon = self.horizon();
        let mut store = self.store.lock();
        let Some(existing) = store.get(id).map_err(EngineError::store)? else {
            return Err(EngineError::ExerciseNotFound { id });
        };
        if !store.delete_by_id(id).map_err(EngineError::store)? {
            return Err(EngineError::ExerciseNotFound { id });
        }
        let report = detect_locked(&mut *store, horizon)?;

        tracing::info!(%id, groups = report.groups, "exercise deleted");
        Ok(existing)
    }

    /// Keeps one member of a conflict group and deletes the others.
    ///
    /// Only the named group is touched; tags elsewhere are left for the next
    /// full detection pass.
    pub fn resolve(
        &self,
        keep: ExerciseId,
        group_id: &GroupId,
    ) -> Result<ResolveReport, EngineError> {
        let horizon = self.horizon();
        let mut store = self.store.lock();
        let (live, _) = partition_expired(store.list_all().map_err(EngineError::store)?, horizon);
        let members: Vec<Exercise> = live
            .into_iter()
            .filter(|exercise| exercise.conflict_group_id.as_ref() == Some(group_id))
            .collect();
        if members.is_empty() {
            return Err(EngineError::GroupNotFound {
                group_id: group_id.clone(),
            });
        }

        let Some(kept) = members.iter().find(|exercise| exercise.id == keep) else {
            let exists = store.get(keep).map_err(EngineError::store)?.is_some();
            return Err(if exists {
                EngineError::NotInGroup {
                    id: keep,
                    group_id: group_id.clone(),
                }
            } else {
                EngineError::ExerciseNotFound { id: keep }
            });
        };
        let kept = kept.with_group(None);
        let removed: Vec<ExerciseId> = members
            .iter()
            .map(|exercise| exercise.id)
            .filter(|id| *id != keep)
            .collect();

        store
            .apply(&removed, std::slice::from_ref(&kept))
            .map_err(EngineError::store)?;

        tracing::info!(%keep, %group_id, removed = removed.len(), "conflict resolved");
        Ok(ResolveReport { kept, removed })
    }

    /// Deletes every stored record that starts before the horizon.
    pub fn cleanup(&self) -> Result<usize, EngineError> {
        let horizon = self.horizon();
        cleanup_locked(&mut *self.store.lock(), horizon)
    }

    /// Recomputes conflict tags for the live set.
    pub fn detect(&self) -> Result<DetectReport, EngineError> {
        let horizon = self.horizon();
        detect_locked(&mut *self.store.lock(), horizon)
    }

    pub fn summary(&self) -> Result<Summary, EngineError> {
        let horizon = self.horizon();
        let stored = self.store.lock().list_all().map_err(EngineError::store)?;
        let (live, expired) = partition_expired(stored, horizon);
        Ok(Summary {
            horizon,
            live: live.len(),
            conflicted: live.iter().filter(|e| e.is_conflicted()).count(),
            groups: build_conflict_groups(&live).len(),
            expired: expired.len(),
        })
    }

    /// Live records, ordered by start time.
    pub fn live(&self) -> Result<Vec<Exercise>, EngineError> {
        let horizon = self.horizon();
        let stored = self.store.lock().list_all().map_err(EngineError::store)?;
        Ok(partition_expired(stored, horizon).0)
    }

    /// Conflict groups over the live set, ordered by earliest start time.
    pub fn groups(&self) -> Result<Vec<ConflictGroup>, EngineError> {
        Ok(build_conflict_groups(&self.live()?))
    }

    /// Every stored record, including expired ones not yet purged.
    pub fn stored(&self) -> Result<Vec<Exercise>, EngineError> {
        self.store.lock().list_all().map_err(EngineError::store)
    }

    /// Live records with `start <= start_time < end`.
    pub fn list_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Exercise>, EngineError> {
        let horizon = self.horizon();
        let records = self
            .store
            .lock()
            .list_in_range(start, end)
            .map_err(EngineError::store)?;
        Ok(partition_expired(records, horizon).0)
    }
}

impl<S: ExerciseStore, C: Clock + Clone> ConflictEngine<S, C> {
    /// Subscribes to live records, ordered by start time.
    pub fn live_exercises(&self) -> LiveExercises<C> {
        let rx = self.store.lock().subscribe();
        LiveExercises::new(rx, self.clock.clone(), self.policy)
    }

    /// Subscribes to conflict groups, ordered by earliest start time.
    pub fn conflict_groups(&self) -> LiveConflictGroups<C> {
        LiveConflictGroups::new(self.live_exercises())
    }
}

fn cleanup_locked<S: ExerciseStore>(
    store: &mut S,
    horizon: DateTime<Utc>,
) -> Result<usize, EngineError> {
    let (_, expired) = partition_expired(store.list_all().map_err(EngineError::store)?, horizon);
    if expired.is_empty() {
        return Ok(0);
    }
    let ids: Vec<ExerciseId> = expired.iter().map(|exercise| exercise.id).collect();
    let removed = store.delete_by_ids(&ids).map_err(EngineError::store)?;
    tracing::info!(removed, %horizon, "purged expired exercises");
    Ok(removed)
}

fn detect_locked<S: ExerciseStore>(
    store: &mut S,
    horizon: DateTime<Utc>,
) -> Result<DetectReport, EngineError> {
    let (live, _) = partition_expired(store.list_all().map_err(EngineError::store)?, horizon);
    let plan = plan_tagging(&live, GroupId::generate);
    if !plan.changes.is_empty() {
        store
            .update_batch(&plan.changes)
            .map_err(EngineError::store)?;
    }

    let report = DetectReport {
        groups: plan.groups.len(),
        conflicted: plan.tagged_count(),
        updated: plan.changes.len(),
    };
    tracing::debug!(live = live.len(), ?report, "conflict detection pass");
    Ok(report)
}
