// Simulated constellation
// Deterministic position oracle: each object repeats a simple overhead pass,
// rising at one azimuth, peaking, and setting while sweeping across the sky.

use std::collections::HashMap;
use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::oracle::{OracleError, PositionOracle};
use crate::position::{ObjectId, PositionSample, Snapshot};

/// Parameters of the simulated constellation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub objects: usize,
    pub seed: u64,
    /// Range of the time between successive passes (s)
    pub period_secs: (f64, f64),
    /// Range of the time spent above the horizon per pass (s)
    pub pass_secs: (f64, f64),
    /// Range of the culmination altitude (deg)
    pub peak_deg: (f64, f64),
    /// Range of the azimuth swept during a pass (deg)
    pub sweep_deg: (f64, f64),
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            objects: 1500,
            seed: 1,
            period_secs: (5400.0, 6000.0),
            pass_secs: (300.0, 720.0),
            peak_deg: (20.0, 89.0),
            sweep_deg: (90.0, 200.0),
        }
    }
}

impl SimParams {
    fn validate(&self) -> Result<(), OracleError> {
        let ordered = |(lo, hi): (f64, f64)| lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi;
        if self.objects == 0 {
            return Err(OracleError::InvalidConfig("constellation is empty".into()));
        }
        if !ordered(self.period_secs) || !ordered(self.pass_secs) || !ordered(self.sweep_deg) {
            return Err(OracleError::InvalidConfig("ranges must be positive and ordered".into()));
        }
        if !ordered(self.peak_deg) || self.peak_deg.1 > 90.0 {
            return Err(OracleError::InvalidConfig("peak altitude must lie in (0, 90]".into()));
        }
        if self.pass_secs.1 >= self.period_secs.0 {
            return Err(OracleError::InvalidConfig("passes must be shorter than the period".into()));
        }
        Ok(())
    }
}

/// One simulated object's orbit, reduced to its pass geometry.
#[derive(Debug, Clone)]
struct Pass {
    /// Offset of the first rise from the constellation epoch (s)
    phase_secs: f64,
    period_secs: f64,
    pass_secs: f64,
    peak_deg: f64,
    rise_az_deg: f64,
    /// Signed azimuth swept from rise to set
    sweep_deg: f64,
}

/// Depth the simulated objects dip below the horizon between passes (deg).
const BELOW_HORIZON_DEPTH: f64 = 15.0;

impl Pass {
    fn random(rng: &mut StdRng, params: &SimParams) -> Self {
        let period_secs = rng.gen_range(params.period_secs.0..=params.period_secs.1);
        let sweep = rng.gen_range(params.sweep_deg.0..=params.sweep_deg.1);
        Pass {
            phase_secs: rng.gen_range(0.0..period_secs),
            period_secs,
            pass_secs: rng.gen_range(params.pass_secs.0..=params.pass_secs.1),
            peak_deg: rng.gen_range(params.peak_deg.0..=params.peak_deg.1),
            rise_az_deg: rng.gen_range(0.0..360.0),
            sweep_deg: if rng.gen_bool(0.5) { sweep } else { -sweep },
        }
    }

    /// (altitude, azimuth) at `t` seconds after the epoch.
    fn at(&self, t: f64) -> (f64, f64) {
        let phase = (t + self.phase_secs).rem_euclid(self.period_secs);
        let (alt, progress) = if phase < self.pass_secs {
            let x = phase / self.pass_secs;
            (self.peak_deg * (PI * x).sin(), x)
        } else {
            // Below the horizon: dip and drift back toward the rise azimuth
            let x = (phase - self.pass_secs) / (self.period_secs - self.pass_secs);
            (-BELOW_HORIZON_DEPTH * (PI * x).sin(), 1.0 - x)
        };
        let az = (self.rise_az_deg + self.sweep_deg * progress).rem_euclid(360.0);
        (alt, az)
    }
}

/// Position oracle backed by a seeded, deterministic constellation.
pub struct SyntheticOracle {
    epoch: DateTime<Utc>,
    ids: Vec<ObjectId>,
    passes: Vec<Pass>,
    index: HashMap<ObjectId, usize>,
}

impl SyntheticOracle {
    /// Build a constellation whose pass phases are anchored at `epoch`.
    pub fn new(params: &SimParams, epoch: DateTime<Utc>) -> Result<Self, OracleError> {
        params.validate()?;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut ids = Vec::with_capacity(params.objects);
        let mut passes = Vec::with_capacity(params.objects);
        let mut index = HashMap::with_capacity(params.objects);
        for i in 0..params.objects {
            let id = ObjectId::new(&format!("SIM-{:04}", i + 1));
            index.insert(id.clone(), i);
            ids.push(id);
            passes.push(Pass::random(&mut rng, params));
        }
        info!("Simulated constellation: {} objects (seed {})", params.objects, params.seed);
        Ok(SyntheticOracle { epoch, ids, passes, index })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn elapsed_secs(&self, at: DateTime<Utc>) -> f64 {
        (at - self.epoch).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6
    }
}

impl PositionOracle for SyntheticOracle {
    fn snapshot(&self, at: DateTime<Utc>) -> Result<Snapshot, OracleError> {
        let t = self.elapsed_secs(at);
        let samples = self
            .ids
            .iter()
            .zip(&self.passes)
            .map(|(id, pass)| {
                let (alt, az) = pass.at(t);
                PositionSample { id: id.clone(), altitude_deg: alt, azimuth_deg: az }
            })
            .collect();
        Ok(Snapshot::new(at, samples))
    }

    fn position(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<PositionSample, OracleError> {
        let &i = self
            .index
            .get(id)
            .ok_or_else(|| OracleError::UnknownObject(id.clone()))?;
        let (alt, az) = self.passes[i].at(self.elapsed_secs(at));
        Ok(PositionSample { id: self.ids[i].clone(), altitude_deg: alt, azimuth_deg: az })
    }
}
