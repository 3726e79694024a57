// Position data model
// Samples and snapshots handed from the position feed to the control loop

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of a tracked body (catalog name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Arc<str>);

impl ObjectId {
    pub fn new(name: &str) -> Self {
        ObjectId(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(name: &str) -> Self {
        ObjectId::new(name)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Altitude/azimuth of one object, valid only at the time of the snapshot it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub id: ObjectId,
    /// Degrees above the horizon
    pub altitude_deg: f64,
    /// Degrees clockwise from north, [0, 360)
    pub azimuth_deg: f64,
}

impl PositionSample {
    pub fn new(id: impl Into<ObjectId>, altitude_deg: f64, azimuth_deg: f64) -> Self {
        PositionSample {
            id: id.into(),
            altitude_deg,
            azimuth_deg,
        }
    }

    /// Both angles are finite numbers.
    pub fn is_well_formed(&self) -> bool {
        self.altitude_deg.is_finite() && self.azimuth_deg.is_finite()
    }
}

/// Positions of every known object at one instant.
///
/// Immutable once built; cloning only bumps a reference count so the feed can
/// publish and the consumer can hold a snapshot without copying samples.
#[derive(Debug, Clone)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    samples: Arc<[PositionSample]>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>, samples: Vec<PositionSample>) -> Self {
        Snapshot {
            taken_at,
            samples: samples.into(),
        }
    }

    /// Snapshot with no objects, used before the feed has published anything.
    pub fn empty(taken_at: DateTime<Utc>) -> Self {
        Self::new(taken_at, Vec::new())
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, id: &ObjectId) -> Option<&PositionSample> {
        self.samples.iter().find(|s| &s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_clone_shares_samples() {
        let snap = Snapshot::new(Utc::now(), vec![PositionSample::new("A", 40.0, 10.0)]);
        let copy = snap.clone();
        assert!(Arc::ptr_eq(&snap.samples, &copy.samples));
        assert_eq!(copy.get(&ObjectId::new("A")).map(|s| s.altitude_deg), Some(40.0));
        assert!(copy.get(&ObjectId::new("B")).is_none());
    }

    #[test]
    fn test_well_formed() {
        assert!(PositionSample::new("A", 40.0, 10.0).is_well_formed());
        assert!(!PositionSample::new("A", f64::NAN, 10.0).is_well_formed());
        assert!(!PositionSample::new("A", 40.0, f64::INFINITY).is_well_formed());
    }

    #[test]
    fn test_object_id_serializes_as_string() {
        let json = serde_json::to_string(&ObjectId::new("STARLINK-1007")).unwrap();
        assert_eq!(json, "\"STARLINK-1007\"");
    }
}
