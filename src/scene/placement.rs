//! Best-effort declutter heuristic for objects created without a location.
//!
//! Random XY positions are drawn until one lies more than
//! [`EXCLUSION_RADIUS`] from every occupied position. After
//! [`MAX_ATTEMPTS`] rejected samples the last one is accepted anyway.

use super::Vec3;

pub const EXCLUSION_RADIUS: f32 = 2.0;
pub const MAX_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub location: Vec3,
    /// Samples drawn, including the accepted one
    pub attempts: usize,
    /// False when every attempt collided and an overlapping spot was kept
    pub clear: bool,
}

fn collides(candidate: [f32; 2], occupied: &[Vec3]) -> bool {
    occupied.iter().any(|o| {
        let dx = candidate[0] - o[0];
        let dy = candidate[1] - o[1];
        (dx * dx + dy * dy).sqrt() <= EXCLUSION_RADIUS
    })
}

/// Draw XY samples from `sample` until one is clear of `occupied`.
pub fn find_free_position<F>(occupied: &[Vec3], mut sample: F) -> Placement
where
    F: FnMut() -> [f32; 2],
{
    let mut last = sample();
    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            last = sample();
        }
        if !collides(last, occupied) {
            return Placement {
                location: [last[0], last[1], 0.0],
                attempts: attempt,
                clear: true,
            };
        }
    }

    Placement {
        location: [last[0], last[1], 0.0],
        attempts: MAX_ATTEMPTS,
        clear: false,
    }
}

/// Uniform samples from the square `[-extent, extent]²`.
pub fn random_position(occupied: &[Vec3], extent: f32) -> Placement {
    let extent = extent.abs().max(f32::EPSILON);
    find_free_position(occupied, || {
        let x = (rand::random::<f32>() * 2.0 - 1.0) * extent;
        let y = (rand::random::<f32>() * 2.0 - 1.0) * extent;
        [x, y]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_distance(a: Vec3, b: Vec3) -> f32 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
    }

    #[test]
    fn empty_scene_accepts_first_sample() {
        let placement = find_free_position(&[], || [3.0, -4.0]);
        assert_eq!(placement.location, [3.0, -4.0, 0.0]);
        assert_eq!(placement.attempts, 1);
        assert!(placement.clear);
    }

    #[test]
    fn rejects_samples_within_radius() {
        let occupied = [[0.0, 0.0, 0.0]];
        let mut samples = vec![[1.0, 1.0], [2.0, 0.0], [2.5, 0.0]].into_iter();
        let placement = find_free_position(&occupied, || samples.next().unwrap());

        // Exactly 2 units away is still inside the exclusion zone
        assert_eq!(placement.location, [2.5, 0.0, 0.0]);
        assert_eq!(placement.attempts, 3);
        assert!(placement.clear);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let occupied = [[0.0, 0.0, 0.0]];
        let mut calls = 0;
        let placement = find_free_position(&occupied, || {
            calls += 1;
            [0.5, 0.5]
        });

        assert_eq!(calls, MAX_ATTEMPTS);
        assert!(!placement.clear);
        assert_eq!(placement.location, [0.5, 0.5, 0.0]);
    }

    #[test]
    fn ignores_z_when_measuring() {
        let occupied = [[0.0, 0.0, 50.0]];
        let placement = find_free_position(&occupied, || [1.0, 0.0]);
        assert!(!placement.clear);
    }

    #[test]
    fn random_positions_stay_clear_when_possible() {
        let mut occupied: Vec<Vec3> = Vec::new();
        for _ in 0..8 {
            let placement = random_position(&occupied, 10.0);
            if placement.clear {
                for o in &occupied {
                    assert!(xy_distance(placement.location, *o) > EXCLUSION_RADIUS);
                }
            } else {
                assert_eq!(placement.attempts, MAX_ATTEMPTS);
            }
            assert!(placement.location[0].abs() <= 10.0);
            assert!(placement.location[1].abs() <= 10.0);
            occupied.push(placement.location);
        }
    }
}
