// Set-time estimation
// Finds when an object's altitude next drops below the tracking threshold:
// dense sampling brackets the crossing, Brent's method refines it inside the bracket.
//
// Limitation: an object that rises and sets again within one sampling step
// produces no sign change between samples and its crossing is missed.

use chrono::{DateTime, Duration, Utc};
use roots::{find_root_brent, SimpleConvergency};
use tracing::debug;

use crate::constants::{SET_TIME_MAX_ITER, SET_TIME_TOLERANCE_SECS};

/// Find the first downward crossing of `threshold_deg` by `altitude`.
///
/// `altitude` maps an offset in seconds from the search start to degrees.
/// Samples are taken at `0, step, 2*step, ...` strictly below `horizon_secs`.
/// A crossing is bracketed where a sample is below the threshold and the
/// previous one is at or above it.
///
/// # Returns
/// The offset (seconds) of the crossing, or None when the altitude stays on
/// one side of the threshold for the whole horizon.
pub fn find_set_offset<F>(altitude: F, threshold_deg: f64, horizon_secs: f64, step_secs: f64) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    if !(step_secs > 0.0 && step_secs.is_finite()) || !(horizon_secs > 0.0 && horizon_secs.is_finite()) {
        return None;
    }
    let samples = (horizon_secs / step_secs).ceil() as usize;

    let mut prev = altitude(0.0);
    for i in 1..samples {
        let t = i as f64 * step_secs;
        let cur = altitude(t);
        if cur < threshold_deg && prev >= threshold_deg {
            return Some(refine(&altitude, threshold_deg, t - step_secs, t, prev, cur));
        }
        prev = cur;
    }
    None
}

/// Root-find `altitude - threshold` inside a bracket known to contain a sign change.
fn refine<F>(altitude: &F, threshold_deg: f64, lo: f64, hi: f64, alt_lo: f64, alt_hi: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let g = |t: f64| altitude(t) - threshold_deg;
    let mut convergency = SimpleConvergency {
        eps: SET_TIME_TOLERANCE_SECS,
        max_iter: SET_TIME_MAX_ITER,
    };
    match find_root_brent(lo, hi, &g, &mut convergency) {
        Ok(root) => root,
        Err(e) => {
            // Fall back to the secant through the bracketing samples
            debug!(lo, hi, "Set-time refinement failed: {:?}", e);
            let span = alt_lo - alt_hi;
            if span > 0.0 {
                lo + (hi - lo) * (alt_lo - threshold_deg) / span
            } else {
                hi
            }
        }
    }
}

/// Wall-clock variant of [`find_set_offset`] searching forward from `now`.
pub fn estimate_set_time<F>(
    now: DateTime<Utc>,
    altitude_at: F,
    threshold_deg: f64,
    horizon_secs: f64,
    step_secs: f64,
) -> Option<DateTime<Utc>>
where
    F: Fn(DateTime<Utc>) -> f64,
{
    let offset = find_set_offset(
        |secs| altitude_at(now + seconds(secs)),
        threshold_deg,
        horizon_secs,
        step_secs,
    )?;
    Some(now + seconds(offset))
}

/// Fractional seconds as a chrono duration (microsecond resolution).
pub fn seconds(secs: f64) -> Duration {
    Duration::microseconds((secs * 1e6).round() as i64)
}
