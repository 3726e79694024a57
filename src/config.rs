use clap::Parser;

use crate::constants::{
    ALTITUDE_THRESHOLD_DEG, CLUSTER_NEIGHBORS, CONTROL_TICK_MS, FEED_INTERVAL_MS,
    SET_TIME_HORIZON_SECS, SET_TIME_STEP_SECS,
};
use crate::sim::SimParams;

/// Satellite handoff tracker configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Altitude in degrees an object must exceed to be eligible.
    #[arg(long, default_value_t = ALTITUDE_THRESHOLD_DEG)]
    pub threshold: f64,

    /// Number of nearest peers scored when picking a cluster center.
    #[arg(long, default_value_t = CLUSTER_NEIGHBORS)]
    pub neighbors: usize,

    /// How far ahead (seconds) to look for the tracked object's set-time.
    #[arg(long, default_value_t = SET_TIME_HORIZON_SECS, value_parser = positive_secs)]
    pub horizon_secs: f64,

    /// Sampling step (seconds) used to bracket the set-time crossing.
    #[arg(long, default_value_t = SET_TIME_STEP_SECS, value_parser = positive_secs)]
    pub step_secs: f64,

    /// Control loop period in milliseconds.
    #[arg(long, default_value_t = CONTROL_TICK_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Position feed refresh period in milliseconds.
    #[arg(long, default_value_t = FEED_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub feed_interval_ms: u64,

    /// Number of objects in the simulated constellation.
    #[arg(long, default_value_t = 1500)]
    pub objects: usize,

    /// Seed for the simulated constellation.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Append acquisition/handoff/hold events as JSON lines to a file.
    #[arg(long, value_name = "FILE")]
    pub write_json: Option<String>,

    /// Do not ring the terminal bell on handoffs.
    #[arg(long, default_value_t = false)]
    pub no_tones: bool,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

/// A finite, strictly positive number of seconds.
fn positive_secs(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("expected a finite number of seconds above zero, got {}", s))
    }
}

impl Config {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            threshold_deg: self.threshold,
            cluster_neighbors: self.neighbors,
            horizon_secs: self.horizon_secs,
            step_secs: self.step_secs,
        }
    }

    pub fn sim_params(&self) -> SimParams {
        SimParams {
            objects: self.objects,
            seed: self.seed,
            ..SimParams::default()
        }
    }
}

/// Tunables consumed by the selection and state machine core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub threshold_deg: f64,
    pub cluster_neighbors: usize,
    pub horizon_secs: f64,
    pub step_secs: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            threshold_deg: ALTITUDE_THRESHOLD_DEG,
            cluster_neighbors: CLUSTER_NEIGHBORS,
            horizon_secs: SET_TIME_HORIZON_SECS,
            step_secs: SET_TIME_STEP_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["sat-handoff"]);
        assert_eq!(config.tracker_config(), TrackerConfig::default());
        assert_eq!(config.tick_ms, CONTROL_TICK_MS);
        assert!(config.write_json.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse_from([
            "sat-handoff",
            "--threshold",
            "25",
            "--neighbors",
            "3",
            "--objects",
            "10",
        ]);
        let tc = config.tracker_config();
        assert_eq!(tc.threshold_deg, 25.0);
        assert_eq!(tc.cluster_neighbors, 3);
        assert_eq!(config.sim_params().objects, 10);
    }

    #[test]
    fn test_zero_periods_rejected() {
        assert!(Config::try_parse_from(["sat-handoff", "--tick-ms", "0"]).is_err());
        assert!(Config::try_parse_from(["sat-handoff", "--feed-interval-ms", "0"]).is_err());
        let config = Config::try_parse_from(["sat-handoff", "--tick-ms", "1", "--feed-interval-ms", "1"]).unwrap();
        assert_eq!((config.tick_ms, config.feed_interval_ms), (1, 1));
    }

    #[test]
    fn test_bad_search_window_rejected() {
        for (flag, value) in [
            ("--horizon-secs", "inf"),
            ("--horizon-secs", "NaN"),
            ("--horizon-secs", "0"),
            ("--horizon-secs", "-5"),
            ("--step-secs", "0"),
            ("--step-secs", "inf"),
            ("--step-secs", "abc"),
        ] {
            assert!(
                Config::try_parse_from(["sat-handoff", flag, value]).is_err(),
                "{} {} should be rejected",
                flag,
                value
            );
        }
        let config = Config::try_parse_from(["sat-handoff", "--horizon-secs", "120", "--step-secs", "0.5"]).unwrap();
        assert_eq!(config.tracker_config().horizon_secs, 120.0);
        assert_eq!(config.tracker_config().step_secs, 0.5);
    }
}
