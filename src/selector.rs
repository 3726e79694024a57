// Target selection
// Cluster-center selection for a cold start and nearest-neighbor selection for handoffs.
//
// Positions are compared as points in a flat (altitude, azimuth) plane measured in degrees.
// Ranking uses raw azimuth differences; only the reported azimuth delta is wrapped, so two
// objects either side of the 0/360 seam rank as far apart.

use crate::eligibility::TrackedHistory;
use crate::position::PositionSample;

/// Wrap an azimuth difference into (-180, 180].
pub fn normalize_angle_difference(diff: f64) -> f64 {
    if diff <= -180.0 {
        diff + 360.0
    } else if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Flat angular distance between two samples, unwrapped azimuth.
#[inline]
pub fn angular_distance(a: &PositionSample, b: &PositionSample) -> f64 {
    let d_alt = a.altitude_deg - b.altitude_deg;
    let d_az = a.azimuth_deg - b.azimuth_deg;
    (d_alt * d_alt + d_az * d_az).sqrt()
}

/// Sum of distances from `pool[index]` to its `k` nearest other members.
fn neighbor_distance_sum(pool: &[PositionSample], index: usize, k: usize, scratch: &mut Vec<f64>) -> f64 {
    let center = &pool[index];
    scratch.clear();
    scratch.extend(
        pool.iter()
            .enumerate()
            .filter(|&(j, _)| j != index)
            .map(|(_, other)| angular_distance(center, other)),
    );
    let k = k.min(scratch.len());
    if k == 0 {
        return 0.0;
    }
    if k < scratch.len() {
        scratch.select_nth_unstable_by(k - 1, f64::total_cmp);
    }
    scratch[..k].iter().sum()
}

/// Pick the member of `pool` whose `neighbors` nearest peers are closest in total.
///
/// A point with fewer peers than `neighbors` sums over all of them. Ties keep the
/// earliest member in pool order. Returns None for an empty pool.
///
/// O(n^2) in the pool size.
pub fn cluster_center(pool: &[PositionSample], neighbors: usize) -> Option<&PositionSample> {
    let mut scratch = Vec::with_capacity(pool.len());
    let mut best: Option<(usize, f64)> = None;
    for i in 0..pool.len() {
        let sum = neighbor_distance_sum(pool, i, neighbors, &mut scratch);
        match best {
            Some((_, best_sum)) if sum >= best_sum => {}
            _ => best = Some((i, sum)),
        }
    }
    best.map(|(i, _)| &pool[i])
}

/// A handoff candidate together with its offset from the current target.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub sample: PositionSample,
    /// Ranking distance (unwrapped azimuth)
    pub distance: f64,
    /// Candidate altitude minus current altitude
    pub delta_altitude: f64,
    /// Candidate azimuth minus current azimuth, wrapped into (-180, 180]
    pub delta_azimuth: f64,
}

/// Nearest member of `pool` to `current`, skipping every id in `exclude`.
///
/// Ties keep the earliest member in pool order.
pub fn nearest_neighbor(
    current: &PositionSample,
    pool: &[PositionSample],
    exclude: &TrackedHistory,
) -> Option<Neighbor> {
    let mut best: Option<(&PositionSample, f64)> = None;
    for candidate in pool {
        if exclude.contains(&candidate.id) {
            continue;
        }
        let distance = angular_distance(current, candidate);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.map(|(sample, distance)| Neighbor {
        sample: sample.clone(),
        distance,
        delta_altitude: sample.altitude_deg - current.altitude_deg,
        delta_azimuth: normalize_angle_difference(sample.azimuth_deg - current.azimuth_deg),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ObjectId;

    fn s(id: &str, alt: f64, az: f64) -> PositionSample {
        PositionSample::new(id, alt, az)
    }

    #[test]
    fn test_normalize_angle_difference() {
        assert_eq!(normalize_angle_difference(270.0), -90.0);
        assert_eq!(normalize_angle_difference(-270.0), 90.0);
        assert_eq!(normalize_angle_difference(10.0), 10.0);
        assert_eq!(normalize_angle_difference(180.0), 180.0);
        assert_eq!(normalize_angle_difference(-180.0), 180.0);
    }

    #[test]
    fn test_cluster_center_picks_tightest_point() {
        // "M" sits in the middle of a ring of five; "far" is off on its own
        let pool = vec![
            s("n1", 50.0, 101.0),
            s("n2", 51.0, 100.0),
            s("M", 50.0, 100.0),
            s("n3", 49.0, 100.0),
            s("n4", 50.0, 99.0),
            s("n5", 50.5, 100.5),
            s("far", 80.0, 300.0),
        ];
        let center = cluster_center(&pool, 5).unwrap();
        assert_eq!(center.id, ObjectId::new("M"));
    }

    #[test]
    fn test_cluster_center_tie_keeps_first() {
        let pool = vec![s("A", 40.0, 10.0), s("B", 35.0, 12.0)];
        assert_eq!(cluster_center(&pool, 1).unwrap().id, ObjectId::new("A"));
        let swapped = vec![s("B", 35.0, 12.0), s("A", 40.0, 10.0)];
        assert_eq!(cluster_center(&swapped, 1).unwrap().id, ObjectId::new("B"));
    }

    #[test]
    fn test_cluster_center_small_pools() {
        assert!(cluster_center(&[], 5).is_none());
        let single = vec![s("A", 40.0, 10.0)];
        assert_eq!(cluster_center(&single, 5).unwrap().id, ObjectId::new("A"));
    }

    #[test]
    fn test_neighbor_sum_uses_only_k_nearest() {
        let pool = vec![s("A", 0.0, 0.0), s("B", 1.0, 0.0), s("C", 3.0, 0.0), s("D", 10.0, 0.0)];
        let mut scratch = Vec::new();
        assert_eq!(neighbor_distance_sum(&pool, 0, 2, &mut scratch), 4.0);
        assert_eq!(neighbor_distance_sum(&pool, 0, 5, &mut scratch), 14.0);
    }

    #[test]
    fn test_nearest_neighbor() {
        let current = s("cur", 25.0, 14.0);
        let pool = vec![s("far", 60.0, 200.0), s("D", 32.0, 15.0), s("E", 40.0, 30.0)];
        let n = nearest_neighbor(&current, &pool, &TrackedHistory::new()).unwrap();
        assert_eq!(n.sample.id, ObjectId::new("D"));
        assert_eq!(n.delta_altitude, 7.0);
        assert_eq!(n.delta_azimuth, 1.0);
        assert!((n.distance - 50f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_neighbor_skips_excluded() {
        let current = s("cur", 25.0, 14.0);
        let pool = vec![s("D", 32.0, 15.0), s("E", 40.0, 30.0)];
        let mut history = TrackedHistory::new();
        history.insert(ObjectId::new("D"));
        let n = nearest_neighbor(&current, &pool, &history).unwrap();
        assert_eq!(n.sample.id, ObjectId::new("E"));

        history.insert(ObjectId::new("E"));
        assert!(nearest_neighbor(&current, &pool, &history).is_none());
        assert!(nearest_neighbor(&current, &[], &TrackedHistory::new()).is_none());
    }

    #[test]
    fn test_nearest_neighbor_never_returns_excluded_id() {
        let current = s("cur", 45.0, 180.0);
        let pool: Vec<_> = (0..40)
            .map(|i| s(&format!("S{}", i), 31.0 + i as f64, (i * 37 % 360) as f64))
            .collect();
        let mut history = TrackedHistory::new();
        for i in (0..40).step_by(3) {
            history.insert(ObjectId::new(&format!("S{}", i)));
        }
        while let Some(n) = nearest_neighbor(&current, &pool, &history) {
            assert!(!history.contains(&n.sample.id));
            history.insert(n.sample.id);
        }
        assert_eq!(history.len(), 40);
    }

    #[test]
    fn test_seam_ranks_by_raw_azimuth() {
        // 359 and 1 are visually adjacent but rank 358 degrees apart
        let current = s("cur", 45.0, 359.0);
        let pool = vec![s("across", 45.0, 1.0), s("near_raw", 45.0, 300.0)];
        let n = nearest_neighbor(&current, &pool, &TrackedHistory::new()).unwrap();
        assert_eq!(n.sample.id, ObjectId::new("near_raw"));
        assert_eq!(n.delta_azimuth, -59.0);
    }
}
