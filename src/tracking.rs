// Tracking state machine
// Owns the current target, the tracked history and the hold point, and decides each
// control cycle whether to acquire, keep, hand off or hold.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::eligibility::{eligible, eligible_untracked, CandidateCounts, TrackedHistory};
use crate::feedback::{remaining_secs, FeedbackSink, HandoffEvent, HandoffKind, Status};
use crate::oracle::PositionOracle;
use crate::position::{ObjectId, PositionSample, Snapshot};
use crate::selector::{cluster_center, nearest_neighbor};

/// The object currently being followed.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: ObjectId,
    pub start_time: DateTime<Utc>,
    /// None when no set-time was found within the search horizon
    pub estimated_set_time: Option<DateTime<Utc>>,
    /// Most recent position seen for this object, refreshed every cycle.
    /// Handoffs search around it and report Δalt/Δaz from it.
    pub last_known: PositionSample,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackingState {
    #[default]
    NoTarget,
    Tracking(Track),
    /// Last target set with nothing to hand off to; its final position is frozen here.
    HoldingReference {
        id: ObjectId,
        last_altitude: f64,
        last_azimuth: f64,
    },
}

impl TrackingState {
    pub fn target(&self) -> Option<&ObjectId> {
        match self {
            TrackingState::Tracking(track) => Some(&track.id),
            _ => None,
        }
    }
}

/// Selection and handoff decisions, one [`Tracker::step`] per control cycle.
pub struct Tracker {
    config: TrackerConfig,
    state: TrackingState,
    history: TrackedHistory,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Tracker { config, state: TrackingState::NoTarget, history: TrackedHistory::new() }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn history(&self) -> &TrackedHistory {
        &self.history
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Run one control cycle against `snapshot`.
    ///
    /// `switch_requested` forces a nearest-neighbor handoff attempt while tracking.
    pub fn step(
        &mut self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        switch_requested: bool,
        oracle: &dyn PositionOracle,
        sink: &mut dyn FeedbackSink,
    ) {
        if !matches!(self.state, TrackingState::Tracking(_)) {
            self.acquire(snapshot, now, oracle, sink);
        }

        if switch_requested {
            self.manual_switch(snapshot, now, oracle, sink);
        }

        self.evaluate(snapshot, now, oracle, sink);
    }

    /// Cold start or resume from hold: pick the cluster center of the full eligible pool.
    fn acquire(
        &mut self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        oracle: &dyn PositionOracle,
        sink: &mut dyn FeedbackSink,
    ) {
        let pool = eligible(snapshot, self.config.threshold_deg);
        let Some(center) = cluster_center(&pool, self.config.cluster_neighbors) else {
            return;
        };
        let kind = match self.state {
            TrackingState::HoldingReference { .. } => HandoffKind::Resumed,
            _ => HandoffKind::Acquired,
        };
        let set_time = self.predict(oracle, &center.id, now);
        self.history.insert(center.id.clone());
        info!(
            id = %center.id,
            altitude = center.altitude_deg,
            azimuth = center.azimuth_deg,
            candidates = pool.len(),
            "{:?} cluster center",
            kind
        );
        let event = HandoffEvent {
            kind,
            at: now,
            from: None,
            to: center.id.clone(),
            altitude: center.altitude_deg,
            azimuth: center.azimuth_deg,
            delta_altitude: None,
            delta_azimuth: None,
            set_time,
        };
        self.state = TrackingState::Tracking(Track {
            id: center.id.clone(),
            start_time: now,
            estimated_set_time: set_time,
            last_known: center.clone(),
        });
        sink.on_handoff_success(&event);
    }

    /// Operator-requested handoff; only meaningful while tracking.
    fn manual_switch(
        &mut self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        oracle: &dyn PositionOracle,
        sink: &mut dyn FeedbackSink,
    ) {
        let TrackingState::Tracking(track) = &self.state else {
            debug!("Switch requested with nothing tracked");
            return;
        };
        let from = track.last_known.clone();
        match self.handoff(&from, snapshot, now, HandoffKind::Switch, oracle) {
            Some((next, event)) => {
                self.state = TrackingState::Tracking(next);
                sink.on_handoff_success(&event);
            }
            None => {
                info!(id = %from.id, "No eligible object to switch to");
                sink.on_handoff_failure(&from.id, now);
            }
        }
    }

    /// Refresh the current target's position; hand off or hold once it drops below threshold.
    fn evaluate(
        &mut self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        oracle: &dyn PositionOracle,
        sink: &mut dyn FeedbackSink,
    ) {
        let TrackingState::Tracking(track) = &mut self.state else {
            return;
        };

        let current = match oracle.position(&track.id, now) {
            Ok(position) => position,
            Err(e) => match snapshot.get(&track.id) {
                Some(sample) => {
                    debug!(id = %track.id, "Using snapshot position: {}", e);
                    sample.clone()
                }
                None => {
                    warn!(id = %track.id, "No position for tracked object: {}", e);
                    return;
                }
            },
        };
        if !current.is_well_formed() {
            warn!(id = %track.id, "Ignoring malformed position for tracked object");
            return;
        }
        track.last_known = current.clone();

        if current.altitude_deg >= self.config.threshold_deg {
            let status = Status::Tracking {
                id: track.id.clone(),
                altitude: current.altitude_deg,
                azimuth: current.azimuth_deg,
                elapsed_secs: (now - track.start_time).num_milliseconds() as f64 / 1000.0,
                remaining_secs: track.estimated_set_time.map(|t| remaining_secs(t, now)),
                counts: CandidateCounts::compute(snapshot, self.config.threshold_deg, &self.history),
            };
            sink.on_status(&status);
            return;
        }

        match self.handoff(&current, snapshot, now, HandoffKind::Handoff, oracle) {
            Some((next, event)) => {
                self.state = TrackingState::Tracking(next);
                sink.on_handoff_success(&event);
            }
            None => {
                info!(
                    id = %current.id,
                    altitude = current.altitude_deg,
                    azimuth = current.azimuth_deg,
                    "Target below threshold with no eligible replacement, holding reference point"
                );
                self.state = TrackingState::HoldingReference {
                    id: current.id.clone(),
                    last_altitude: current.altitude_deg,
                    last_azimuth: current.azimuth_deg,
                };
                sink.on_status(&Status::Holding {
                    id: current.id,
                    altitude: current.altitude_deg,
                    azimuth: current.azimuth_deg,
                    at: now,
                });
            }
        }
    }

    /// Nearest untracked eligible object to `from`. On success both ids join the history.
    fn handoff(
        &mut self,
        from: &PositionSample,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        kind: HandoffKind,
        oracle: &dyn PositionOracle,
    ) -> Option<(Track, HandoffEvent)> {
        let pool = eligible_untracked(snapshot, self.config.threshold_deg, &self.history);
        let neighbor = nearest_neighbor(from, &pool, &self.history)?;
        let set_time = self.predict(oracle, &neighbor.sample.id, now);

        self.history.insert(from.id.clone());
        self.history.insert(neighbor.sample.id.clone());
        info!(
            from = %from.id,
            to = %neighbor.sample.id,
            d_alt = neighbor.delta_altitude,
            d_az = neighbor.delta_azimuth,
            "{:?} to nearest neighbor",
            kind
        );

        let event = HandoffEvent {
            kind,
            at: now,
            from: Some(from.id.clone()),
            to: neighbor.sample.id.clone(),
            altitude: neighbor.sample.altitude_deg,
            azimuth: neighbor.sample.azimuth_deg,
            delta_altitude: Some(neighbor.delta_altitude),
            delta_azimuth: Some(neighbor.delta_azimuth),
            set_time,
        };
        let track = Track {
            id: neighbor.sample.id.clone(),
            start_time: now,
            estimated_set_time: set_time,
            last_known: neighbor.sample,
        };
        Some((track, event))
    }

    fn predict(&self, oracle: &dyn PositionOracle, id: &ObjectId, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let set_time = oracle.predict_set_time(
            id,
            now,
            self.config.threshold_deg,
            self.config.horizon_secs,
            self.config.step_secs,
        );
        if set_time.is_none() {
            debug!(%id, "No set-time within {} s", self.config.horizon_secs);
        }
        set_time
    }
}
