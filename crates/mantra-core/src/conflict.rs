//! Overlap clustering and conflict group projection.
//!
//! # Algorithm Summary
//!
//! Two exercises conflict when their half-open intervals overlap. A conflict
//! group is a connected component of the overlap graph with at least two
//! members, so a chain A-B-C lands in one group even when A and C are apart.
//!
//! For intervals the components fall out of a single sweep: sort by start,
//! keep the furthest end seen in the current cluster, and start a new cluster
//! whenever the next start is at or past that end. Zero-length intervals
//! overlap nothing and are never clustered.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::exercise::{Exercise, Interval};
use crate::types::{ExerciseId, GroupId};

/// Clusters exercises into connected components of the overlap graph.
///
/// Only components with two or more members are returned. Members are
/// ordered by start time then ID; clusters are ordered by earliest start.
pub fn find_clusters(exercises: &[Exercise]) -> Vec<Vec<ExerciseId>> {
    let mut spans: Vec<(Interval, ExerciseId)> = exercises
        .iter()
        .map(|exercise| (exercise.interval(), exercise.id))
        .filter(|(interval, _)| !interval.is_empty())
        .collect();
    spans.sort_by(|a, b| a.0.start.cmp(&b.0.start).then_with(|| a.1.cmp(&b.1)));

    let mut clusters = Vec::new();
    let mut current: Vec<ExerciseId> = Vec::new();
    let mut current_end: Option<DateTime<Utc>> = None;

    for (interval, id) in spans {
        match current_end {
            Some(end) if interval.start < end => {
                current.push(id);
                current_end = Some(end.max(interval.end));
            }
            _ => {
                if current.len() >= 2 {
                    clusters.push(std::mem::take(&mut current));
                }
                current.clear();
                current.push(id);
                current_end = Some(interval.end);
            }
        }
    }
    if current.len() >= 2 {
        clusters.push(current);
    }

    clusters
}

/// A group of exercises about to be tagged with one ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedGroup {
    pub id: GroupId,
    pub members: Vec<ExerciseId>,
}

/// The staged result of a detection pass.
///
/// `changes` holds every record whose tag differs from what is stored,
/// already carrying its new tag, so it can be persisted as one batch.
#[derive(Debug, Clone, Default)]
pub struct TaggingPlan {
    pub groups: Vec<PlannedGroup>,
    pub changes: Vec<Exercise>,
}

impl TaggingPlan {
    pub fn tagged_count(&self) -> usize {
        self.groups.iter().map(|group| group.members.len()).sum()
    }
}

/// Computes the full tagging for `live` from scratch.
///
/// Every record that is not in a cluster ends up untagged and every clustered
/// record gets the ID minted for its cluster, so stale tags left by earlier
/// passes are always cleared.
pub fn plan_tagging(live: &[Exercise], mut next_group_id: impl FnMut() -> GroupId) -> TaggingPlan {
    let groups: Vec<PlannedGroup> = find_clusters(live)
        .into_iter()
        .map(|members| PlannedGroup {
            id: next_group_id(),
            members,
        })
        .collect();

    let mut assigned: BTreeMap<ExerciseId, &GroupId> = BTreeMap::new();
    for group in &groups {
        for id in &group.members {
            assigned.insert(*id, &group.id);
        }
    }

    let changes = live
        .iter()
        .filter_map(|exercise| {
            let desired = assigned.get(&exercise.id).copied();
            (exercise.conflict_group_id.as_ref() != desired)
                .then(|| exercise.with_group(desired.cloned()))
        })
        .collect();

    TaggingPlan { groups, changes }
}

/// A read-only view of exercises sharing a conflict group ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictGroup {
    pub id: GroupId,
    /// Ordered by start time then ID; always at least two entries.
    pub exercises: Vec<Exercise>,
    /// Earliest start time among the members.
    pub representative_date: DateTime<Utc>,
}

impl ConflictGroup {
    /// Builds a group, or `None` when fewer than two exercises remain.
    pub fn new(id: GroupId, mut exercises: Vec<Exercise>) -> Option<Self> {
        if exercises.len() < 2 {
            return None;
        }
        exercises.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        let representative_date = exercises[0].start_time;
        Some(Self {
            id,
            exercises,
            representative_date,
        })
    }

    /// Distance between the earliest and latest member start times.
    pub fn time_span(&self) -> Duration {
        let first = self.representative_date;
        let last = self
            .exercises
            .iter()
            .map(|exercise| exercise.start_time)
            .max()
            .unwrap_or(first);
        last - first
    }

    pub fn contains(&self, id: ExerciseId) -> bool {
        self.exercises.iter().any(|exercise| exercise.id == id)
    }
}

/// Groups tagged records by conflict group ID.
///
/// Untagged records are dropped, as is any group left with a single visible
/// member. Groups are ordered by representative date, ties broken by ID.
pub fn build_conflict_groups<'a>(
    exercises: impl IntoIterator<Item = &'a Exercise>,
) -> Vec<ConflictGroup> {
    let mut by_group: BTreeMap<&GroupId, Vec<Exercise>> = BTreeMap::new();
    for exercise in exercises {
        if let Some(group_id) = exercise.conflict_group_id.as_ref() {
            by_group.entry(group_id).or_default().push(exercise.clone());
        }
    }

    let mut groups: Vec<ConflictGroup> = by_group
        .into_iter()
        .filter_map(|(id, members)| ConflictGroup::new(id.clone(), members))
        .collect();
    groups.sort_by(|a, b| {
        a.representative_date
            .cmp(&b.representative_date)
            .then_with(|| a.id.cmp(&b.id))
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use crate::exercise::NewExercise;
    use crate::types::ExerciseSource;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn exercise(id: i64, start: i64, duration: i64) -> Exercise {
        NewExercise::new(format!("ex-{id}"), duration, 0, ts(start), ExerciseSource::Manual)
            .unwrap()
            .into_exercise(ExerciseId::new(id))
    }

    fn ids(raw: &[i64]) -> Vec<ExerciseId> {
        raw.iter().copied().map(ExerciseId::new).collect()
    }

    fn counter_ids() -> impl FnMut() -> GroupId {
        let mut n = 0;
        move || {
            n += 1;
            GroupId::new(format!("g{n}")).unwrap()
        }
    }

    fn apply(live: &[Exercise], plan: &TaggingPlan) -> Vec<Exercise> {
        live.iter()
            .map(|exercise| {
                plan.changes
                    .iter()
                    .find(|changed| changed.id == exercise.id)
                    .cloned()
                    .unwrap_or_else(|| exercise.clone())
            })
            .collect()
    }

    fn memberships(groups: &[PlannedGroup]) -> BTreeSet<Vec<ExerciseId>> {
        groups.iter().map(|group| group.members.clone()).collect()
    }

    #[test]
    fn test_two_overlapping_exercises_cluster() {
        let live = vec![exercise(1, 0, 30), exercise(2, 10, 30)];
        assert_eq!(find_clusters(&live), vec![ids(&[1, 2])]);
    }

    #[test]
    fn test_isolated_exercise_not_clustered() {
        let live = vec![exercise(1, 0, 30), exercise(2, 10, 30), exercise(3, 100, 10)];
        assert_eq!(find_clusters(&live), vec![ids(&[1, 2])]);
    }

    #[test]
    fn test_chain_is_transitive() {
        // 1 overlaps 2, 2 overlaps 3, 1 does not overlap 3.
        let live = vec![exercise(1, 0, 30), exercise(2, 20, 30), exercise(3, 45, 30)];
        assert!(!live[0].interval().overlaps(&live[2].interval()));
        assert_eq!(find_clusters(&live), vec![ids(&[1, 2, 3])]);
    }

    #[test]
    fn test_chain_independent_of_input_order() {
        let live = vec![exercise(3, 45, 30), exercise(1, 0, 30), exercise(2, 20, 30)];
        assert_eq!(find_clusters(&live), vec![ids(&[1, 2, 3])]);
    }

    #[test]
    fn test_wide_interval_bridges_later_members() {
        // 1 spans everything; 2 and 3 only overlap 1.
        let live = vec![exercise(1, 0, 120), exercise(2, 10, 10), exercise(3, 100, 10)];
        assert_eq!(find_clusters(&live), vec![ids(&[1, 2, 3])]);
    }

    #[test]
    fn test_back_to_back_not_clustered() {
        let live = vec![exercise(1, 0, 30), exercise(2, 30, 30), exercise(3, 60, 30)];
        assert!(find_clusters(&live).is_empty());
    }

    #[test]
    fn test_zero_duration_never_clustered() {
        let live = vec![exercise(1, 0, 60), exercise(2, 10, 0), exercise(3, 10, 0)];
        assert!(find_clusters(&live).is_empty());
    }

    #[test]
    fn test_equal_starts_cluster() {
        let live = vec![exercise(1, 0, 5), exercise(2, 0, 60)];
        assert_eq!(find_clusters(&live), vec![ids(&[1, 2])]);
    }

    #[test]
    fn test_separate_clusters_ordered_by_start() {
        let live = vec![
            exercise(4, 200, 30),
            exercise(1, 0, 30),
            exercise(3, 210, 30),
            exercise(2, 15, 30),
        ];
        assert_eq!(find_clusters(&live), vec![ids(&[1, 2]), ids(&[4, 3])]);
    }

    #[test]
    fn test_plan_tags_only_changed_records() {
        let live = vec![exercise(1, 0, 30), exercise(2, 10, 30), exercise(3, 100, 10)];
        let plan = plan_tagging(&live, counter_ids());

        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.tagged_count(), 2);
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|e| e.conflict_group_id.as_ref() == Some(&plan.groups[0].id)));
    }

    #[test]
    fn test_plan_clears_stale_tags() {
        let stale = GroupId::new("stale").unwrap();
        let live = vec![
            exercise(1, 0, 30).with_group(Some(stale.clone())),
            exercise(2, 100, 30).with_group(Some(stale)),
        ];
        let plan = plan_tagging(&live, counter_ids());

        assert!(plan.groups.is_empty());
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|e| !e.is_conflicted()));
    }

    #[test]
    fn test_plan_is_idempotent_on_membership() {
        let live = vec![
            exercise(1, 0, 30),
            exercise(2, 20, 30),
            exercise(3, 45, 30),
            exercise(4, 300, 30),
            exercise(5, 310, 5),
        ];
        let first = plan_tagging(&live, counter_ids());
        let tagged = apply(&live, &first);
        let second = plan_tagging(&tagged, GroupId::generate);

        assert_eq!(memberships(&first.groups), memberships(&second.groups));
        let regrouped = apply(&tagged, &second);
        assert_eq!(build_conflict_groups(&regrouped).len(), 2);
    }

    #[test]
    fn test_conflict_group_requires_two_members() {
        let id = GroupId::new("g").unwrap();
        assert!(ConflictGroup::new(id.clone(), vec![exercise(1, 0, 30)]).is_none());
        assert!(ConflictGroup::new(id, vec![exercise(1, 0, 30), exercise(2, 5, 30)]).is_some());
    }

    #[test]
    fn test_conflict_group_time_span_and_date() {
        let id = GroupId::new("g").unwrap();
        let group = ConflictGroup::new(
            id,
            vec![exercise(2, 25, 30), exercise(1, 0, 30), exercise(3, 10, 30)],
        )
        .unwrap();
        assert_eq!(group.representative_date, ts(0));
        assert_eq!(group.time_span(), Duration::minutes(25));
        assert_eq!(
            group.exercises.iter().map(|e| e.id).collect::<Vec<_>>(),
            ids(&[1, 3, 2])
        );
        assert!(group.contains(ExerciseId::new(3)));
        assert!(!group.contains(ExerciseId::new(9)));
    }

    #[test]
    fn test_build_groups_skips_untagged_and_singletons() {
        let a = GroupId::new("a").unwrap();
        let b = GroupId::new("b").unwrap();
        let c = GroupId::new("c").unwrap();
        let records = vec![
            exercise(1, 100, 30).with_group(Some(a.clone())),
            exercise(2, 110, 30).with_group(Some(a.clone())),
            exercise(3, 0, 30).with_group(Some(b.clone())),
            exercise(4, 5, 30).with_group(Some(b.clone())),
            exercise(5, 500, 30).with_group(Some(c)),
            exercise(6, 600, 30),
        ];
        let groups = build_conflict_groups(&records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, b);
        assert_eq!(groups[1].id, a);
    }
}
