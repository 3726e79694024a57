// Position oracle
// Source of altitude/azimuth for every known object at a given instant

use std::fmt;

use chrono::{DateTime, Utc};

use crate::position::{ObjectId, PositionSample, Snapshot};
use crate::settime::estimate_set_time;

#[derive(Debug, Clone, PartialEq)]
pub enum OracleError {
    /// The backing data source cannot be reached
    Unavailable(String),
    /// The oracle has no object with this id
    UnknownObject(ObjectId),
    /// The oracle could not be constructed from its parameters
    InvalidConfig(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Unavailable(why) => write!(f, "position source unavailable: {}", why),
            OracleError::UnknownObject(id) => write!(f, "unknown object {}", id),
            OracleError::InvalidConfig(why) => write!(f, "invalid oracle configuration: {}", why),
        }
    }
}

impl std::error::Error for OracleError {}

/// Computes object positions. Shared between the feed task and the control loop.
pub trait PositionOracle: Send + Sync {
    /// Positions of every known object at `at`.
    fn snapshot(&self, at: DateTime<Utc>) -> Result<Snapshot, OracleError>;

    /// Position of a single object at `at`.
    fn position(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<PositionSample, OracleError>;

    /// Altitude (degrees) of a single object at `at`.
    fn altitude(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<f64, OracleError> {
        self.position(id, at).map(|s| s.altitude_deg)
    }

    /// First instant within `horizon_secs` of `now` at which `id` drops below
    /// `threshold_deg`, sampled every `step_secs` and refined between samples.
    ///
    /// Returns None if no crossing is found or the object is unknown.
    fn predict_set_time(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
        threshold_deg: f64,
        horizon_secs: f64,
        step_secs: f64,
    ) -> Option<DateTime<Utc>> {
        // Probe once so an unknown id doesn't cost a full sweep
        self.altitude(id, now).ok()?;
        estimate_set_time(
            now,
            |at| self.altitude(id, at).unwrap_or(f64::NAN),
            threshold_deg,
            horizon_secs,
            step_secs,
        )
    }
}
