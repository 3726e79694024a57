// Eligibility filter
// Derives the candidate pool from a snapshot

use std::collections::HashSet;

use tracing::warn;

use crate::position::{ObjectId, PositionSample, Snapshot};

/// Samples strictly above `threshold_deg`, in snapshot order.
///
/// Samples with a non-finite angle are logged and dropped.
pub fn eligible(snapshot: &Snapshot, threshold_deg: f64) -> Vec<PositionSample> {
    snapshot
        .samples()
        .iter()
        .filter(|s| accept(s, threshold_deg))
        .cloned()
        .collect()
}

/// Like [`eligible`], additionally excluding every id in `history`.
/// Used when searching for a new target.
pub fn eligible_untracked(
    snapshot: &Snapshot,
    threshold_deg: f64,
    history: &TrackedHistory,
) -> Vec<PositionSample> {
    snapshot
        .samples()
        .iter()
        .filter(|s| accept(s, threshold_deg) && !history.contains(&s.id))
        .cloned()
        .collect()
}

fn accept(sample: &PositionSample, threshold_deg: f64) -> bool {
    if !sample.is_well_formed() {
        warn!(
            id = %sample.id,
            altitude = sample.altitude_deg,
            azimuth = sample.azimuth_deg,
            "Rejecting malformed position sample"
        );
        return false;
    }
    sample.altitude_deg > threshold_deg
}

/// Ids that have been tracked this run and must never be selected again.
///
/// Append-only: there is no way to remove an id.
#[derive(Debug, Clone, Default)]
pub struct TrackedHistory {
    ids: HashSet<ObjectId>,
}

impl TrackedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`; returns true if it was not already present.
    pub fn insert(&mut self, id: ObjectId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_subset(&self, other: &TrackedHistory) -> bool {
        self.ids.is_subset(&other.ids)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectId> {
        self.ids.iter()
    }
}

/// Population counts shown on the status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CandidateCounts {
    /// Objects in the snapshot
    pub total: usize,
    /// Objects above the threshold
    pub above: usize,
    /// Objects above the threshold that were never tracked
    pub untracked_above: usize,
    /// Objects tracked so far this run
    pub tracked: usize,
}

impl CandidateCounts {
    pub fn compute(snapshot: &Snapshot, threshold_deg: f64, history: &TrackedHistory) -> Self {
        let mut counts = CandidateCounts {
            total: snapshot.len(),
            tracked: history.len(),
            ..Default::default()
        };
        for s in snapshot.samples() {
            if s.is_well_formed() && s.altitude_deg > threshold_deg {
                counts.above += 1;
                if !history.contains(&s.id) {
                    counts.untracked_above += 1;
                }
            }
        }
        counts
    }
}
