//! Spatial zone partitioner.
//!
//! Groups piles into `num_zones` zones by proximity using seeded k-means
//! on plan-view coordinates. The partition feeds the zone-transition
//! penalty in the constraint model; nothing else depends on the exact
//! clustering, but it must be deterministic so that identical requests
//! produce identical schedules.

use pileplan_core::{Pile, ZoneId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const MAX_ITERATIONS: usize = 100;

/// Partitions `piles` into at most `num_zones` non-empty zones.
///
/// Deterministic for identical input. Degenerate inputs degrade rather
/// than fail: `num_zones == 0` is treated as one zone, and when there are
/// at least as many zones as piles each pile gets its own zone.
pub fn partition_zones(piles: &[Pile], num_zones: usize, seed: u64) -> Vec<ZoneId> {
    let n = piles.len();
    if n == 0 {
        return Vec::new();
    }
    let k = num_zones.max(1);
    if k >= n {
        return (0..n).collect();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids: Vec<(f64, f64)> = rand::seq::index::sample(&mut rng, n, k)
        .into_iter()
        .map(|i| (piles[i].x, piles[i].y))
        .collect();

    let mut assignment = vec![0usize; n];
    for _ in 0..MAX_ITERATIONS {
        let next = assign_nearest(piles, &centroids);
        let next = repair_empty_zones(piles, &centroids, next, k);
        if next == assignment {
            break;
        }
        assignment = next;
        for (z, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Pile> = piles
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == z)
                .map(|(p, _)| p)
                .collect();
            if !members.is_empty() {
                let count = members.len() as f64;
                centroid.0 = members.iter().map(|p| p.x).sum::<f64>() / count;
                centroid.1 = members.iter().map(|p| p.y).sum::<f64>() / count;
            }
        }
    }

    tracing::debug!(piles = n, zones = k, "partitioned piles into zones");
    assignment
}

/// Nearest-centroid assignment; ties break toward the lower zone index,
/// which keeps boundary piles stable across runs.
fn assign_nearest(piles: &[Pile], centroids: &[(f64, f64)]) -> Vec<usize> {
    piles
        .iter()
        .map(|pile| {
            let mut best = 0usize;
            let mut best_dist = f64::INFINITY;
            for (z, &(cx, cy)) in centroids.iter().enumerate() {
                let dx = pile.x - cx;
                let dy = pile.y - cy;
                let dist = dx * dx + dy * dy;
                if dist < best_dist {
                    best_dist = dist;
                    best = z;
                }
            }
            best
        })
        .collect()
}

/// Reassigns the pile farthest from its centroid into each empty zone so
/// every zone stays non-empty.
fn repair_empty_zones(
    piles: &[Pile],
    centroids: &[(f64, f64)],
    mut assignment: Vec<usize>,
    k: usize,
) -> Vec<usize> {
    for z in 0..k {
        if assignment.iter().any(|a| *a == z) {
            continue;
        }
        let mut farthest = 0usize;
        let mut farthest_dist = -1.0f64;
        for (i, pile) in piles.iter().enumerate() {
            let zone = assignment[i];
            // Don't steal the sole member of another zone.
            if assignment.iter().filter(|a| **a == zone).count() <= 1 {
                continue;
            }
            let (cx, cy) = centroids[zone];
            let dx = pile.x - cx;
            let dy = pile.y - cy;
            let dist = dx * dx + dy * dy;
            if dist > farthest_dist {
                farthest_dist = dist;
                farthest = i;
            }
        }
        assignment[farthest] = z;
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pile(id: u64, x: f64, y: f64) -> Pile {
        Pile {
            id,
            x,
            y,
            pile_type: 1,
            diameter: 1.0,
        }
    }

    fn two_clusters() -> Vec<Pile> {
        vec![
            pile(1, 0.0, 0.0),
            pile(2, 1.0, 0.5),
            pile(3, 0.5, 1.0),
            pile(4, 100.0, 100.0),
            pile(5, 101.0, 100.5),
            pile(6, 100.5, 101.0),
        ]
    }

    #[test]
    fn every_pile_gets_exactly_one_zone() {
        let piles = two_clusters();
        let zones = partition_zones(&piles, 2, 42);
        assert_eq!(zones.len(), piles.len());
        assert!(zones.iter().all(|&z| z < 2));
    }

    #[test]
    fn separated_groups_land_in_separate_zones() {
        let piles = two_clusters();
        let zones = partition_zones(&piles, 2, 42);
        assert_eq!(zones[0], zones[1]);
        assert_eq!(zones[1], zones[2]);
        assert_eq!(zones[3], zones[4]);
        assert_eq!(zones[4], zones[5]);
        assert_ne!(zones[0], zones[3]);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let piles = two_clusters();
        assert_eq!(partition_zones(&piles, 2, 7), partition_zones(&piles, 2, 7));
    }

    #[test]
    fn more_zones_than_piles_gives_one_each() {
        let piles = two_clusters();
        let zones = partition_zones(&piles, 10, 42);
        assert_eq!(zones, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn zero_zones_degrades_to_single_zone() {
        let piles = two_clusters();
        let zones = partition_zones(&piles, 0, 42);
        assert!(zones.iter().all(|&z| z == 0));
    }

    #[test]
    fn all_zones_non_empty() {
        let piles = two_clusters();
        let zones = partition_zones(&piles, 3, 42);
        for z in 0..3 {
            assert!(zones.contains(&z), "zone {z} is empty");
        }
    }
}
