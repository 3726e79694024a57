// Shared constants for target selection and handoff

/// Altitude (degrees) an object must exceed to be an eligible candidate.
pub const ALTITUDE_THRESHOLD_DEG: f64 = 30.0;

/// Number of nearest peers summed when scoring a cluster center.
pub const CLUSTER_NEIGHBORS: usize = 5;

/// Forward horizon searched for the next set-time (s). 8 minutes.
pub const SET_TIME_HORIZON_SECS: f64 = 8.0 * 60.0;

/// Sampling step used to bracket a set-time crossing (s).
pub const SET_TIME_STEP_SECS: f64 = 1.0;

/// Convergence tolerance of the set-time root refinement (s).
pub const SET_TIME_TOLERANCE_SECS: f64 = 1e-3;

/// Iteration cap for the set-time root refinement.
pub const SET_TIME_MAX_ITER: usize = 64;

/// Control loop period (ms).
pub const CONTROL_TICK_MS: u64 = 100;

/// Position feed refresh period (ms).
pub const FEED_INTERVAL_MS: u64 = 250;

/// Success chime: frequency (Hz), duration (ms).
pub const SUCCESS_TONE: (u32, u64) = (750, 100);

/// Failure chime: frequency (Hz), duration (ms).
pub const FAILURE_TONE: (u32, u64) = (1000, 100);

/// Pending tones kept before new ones are dropped.
pub const TONE_QUEUE_DEPTH: usize = 8;
