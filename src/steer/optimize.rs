//! Direction optimizer
//!
//! Rotates the straight-line direction towards the target until it keeps the
//! desired clearance from the tightest obstacle on each side. Runs a fixed
//! number of iterations so the cost per tick is predictable.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;

use super::edges::{Corridor, EdgeBuckets, EdgeBuffer, Segment, classify_edges};
use super::geometry::{Axis, clip_segment_by_half_plane, most_extreme, rotate_into};
use crate::consts::{
    DISTANCE_EPSILON, LOOKAHEAD_GROWTH, MAX_FRACTION_OF_REMAINING_DISTANCE, MIN_DESIRED_RADIUS,
    OPTIMIZATION_ITERATIONS, STEP_DAMPING,
};

/// The tightest obstacle on one side during one iteration
#[derive(Debug, Clone, Copy)]
struct Constraint {
    /// Rotation (radians) the direction needs to clear the obstacle.
    /// Negative for left-side obstacles, positive for right-side ones.
    angle: f32,
    /// Distance to the closest intruding obstacle point
    distance: f32,
}

/// Direction from `start` towards `end` that keeps `desired_radius` of
/// clearance from `edges`
///
/// Returns the unit direction, or `Vec2::ZERO` if `start == end`. Without
/// any obstacle in the corridor the result is the straight direction.
pub fn optimize_direction(
    start: Vec2,
    end: Vec2,
    desired_radius: f32,
    remaining_distance: f32,
    pointiness: f32,
    edges: &[Segment],
) -> Vec2 {
    let offset = end - start;
    let length = offset.length();
    let straight = offset.normalize_or_zero();
    if straight == Vec2::ZERO || !(desired_radius > MIN_DESIRED_RADIUS) || !(pointiness > 0.0) {
        return straight;
    }

    let max_lookahead = MAX_FRACTION_OF_REMAINING_DISTANCE * remaining_distance.max(0.0);
    let corridor = Corridor {
        length: length.max(max_lookahead),
        radius: desired_radius,
        pointiness,
    };
    let buckets = classify_edges(start, straight, &corridor, edges);
    if buckets.is_empty() {
        return straight;
    }

    let rotation =
        optimize_in_corridor(&buckets, desired_radius, length, max_lookahead, pointiness);
    let direction = straight.rotate(rotation);
    if direction.is_finite() {
        direction
    } else {
        log::debug!("Optimized direction is not finite, using the straight line");
        straight
    }
}

/// Iterate in the corridor frame; returns the rotation to apply on top of
/// the straight direction
fn optimize_in_corridor(
    buckets: &EdgeBuckets,
    radius: f32,
    length: f32,
    max_lookahead: f32,
    pointiness: f32,
) -> Vec2 {
    // Rotation by the wedge half-angle atan(1 / pointiness)
    let wedge = Vec2::new(pointiness, 1.0).normalize();
    let mut direction = Vec2::X;
    let mut lookahead = length.max(DISTANCE_EPSILON);

    for _ in 0..OPTIMIZATION_ITERATIONS {
        let probe = Probe {
            direction,
            lookahead,
            radius,
            wedge,
        };
        let left = probe.constraint(&buckets.far_left, &buckets.near_left, 1.0);
        let right = probe.constraint(&buckets.far_right, &buckets.near_right, -1.0);

        let (delta, closest) = match (left, right) {
            (None, None) => {
                // Nothing in range: look a little further so a corner just
                // out of reach can show up next iteration
                lookahead = lookahead.max((lookahead * LOOKAHEAD_GROWTH).min(max_lookahead));
                continue;
            }
            (Some(c), None) | (None, Some(c)) => (c.angle, c.distance),
            (Some(l), Some(r)) => {
                // Closer obstacles dominate
                let wl = 1.0 / l.distance.max(DISTANCE_EPSILON);
                let wr = 1.0 / r.distance.max(DISTANCE_EPSILON);
                ((l.angle * wl + r.angle * wr) / (wl + wr), l.distance.min(r.distance))
            }
        };

        let step = delta.clamp(-FRAC_PI_2, FRAC_PI_2) * STEP_DAMPING;
        let rotated = Vec2::from_angle(step).rotate(direction).normalize_or_zero();
        if rotated != Vec2::ZERO {
            direction = rotated;
        }

        let target = 2.0 * closest;
        if target < lookahead {
            lookahead = (lookahead + (target - lookahead) * 0.5).max(DISTANCE_EPSILON);
        }
    }
    direction
}

/// Current iterate of the optimizer, in the corridor frame
#[derive(Debug, Clone, Copy)]
struct Probe {
    direction: Vec2,
    lookahead: f32,
    radius: f32,
    /// Rotation by the wedge half-angle
    wedge: Vec2,
}

impl Probe {
    /// Tightest constraint from one side's far and near pieces
    ///
    /// `side` is +1 for the left side and -1 for the right side.
    fn constraint(&self, far: &EdgeBuffer, near: &EdgeBuffer, side: f32) -> Option<Constraint> {
        // Left obstacles push the direction clockwise, right ones counter-clockwise
        let clockwise = side > 0.0;
        let intrudes = |v: Vec2| side * v.y < 0.0;

        let mut extreme = Vec2::X;
        let mut closest = f32::INFINITY;
        let mut consider = |a: Vec2, b: Vec2, va: Vec2, vb: Vec2| {
            extreme = most_extreme(extreme, va, vb, clockwise);
            for (p, v) in [(a, va), (b, vb)] {
                if intrudes(v) {
                    closest = closest.min(p.length());
                }
            }
        };

        // Lanes: measured from the reference point one radius to the side
        let reference = Vec2::new(0.0, side * self.radius);
        for piece in far.iter() {
            if let Some((a, b)) = self.clip(piece) {
                consider(a, b, a - reference, b - reference);
            }
        }

        // Wedge: the diagonal wedge edge is the reference line, so turn each
        // point towards the centerline by the wedge half-angle
        let to_centerline = Vec2::new(self.wedge.x, -side * self.wedge.y);
        for piece in near.iter() {
            if let Some((a, b)) = self.clip(piece) {
                consider(a, b, to_centerline.rotate(a), to_centerline.rotate(b));
            }
        }

        if !intrudes(extreme) || !closest.is_finite() {
            return None;
        }
        Some(Constraint {
            angle: extreme.y.atan2(extreme.x),
            distance: closest,
        })
    }

    /// Piece rotated into the frame of the current direction and clipped to
    /// `0..=lookahead`
    fn clip(&self, piece: &Segment) -> Option<(Vec2, Vec2)> {
        let a = rotate_into(piece.a, self.direction);
        let b = rotate_into(piece.b, self.direction);
        let (a, b) = clip_segment_by_half_plane(a, b, Axis::X, 0.0, 1.0)?;
        clip_segment_by_half_plane(a, b, Axis::X, self.lookahead, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DEFAULT_POINTINESS;

    fn optimize(edges: &[Segment]) -> Vec2 {
        optimize_direction(Vec2::ZERO, Vec2::new(10.0, 0.0), 1.0, 10.0, DEFAULT_POINTINESS, edges)
    }

    #[test]
    fn test_no_obstacles_returns_straight_line() {
        let dir = optimize_direction(
            Vec2::new(1.0, 1.0),
            Vec2::new(4.0, 5.0),
            0.5,
            20.0,
            DEFAULT_POINTINESS,
            &[],
        );
        assert!((dir - Vec2::new(0.6, 0.8)).length() < 1e-6);
    }

    #[test]
    fn test_zero_radius_skips_optimization() {
        let wall = [Segment::new(Vec2::new(5.0, -0.5), Vec2::new(5.0, -3.0))];
        let dir = optimize_direction(Vec2::ZERO, Vec2::new(10.0, 0.0), 0.0, 10.0, 2.0, &wall);
        assert_eq!(dir, Vec2::X);
    }

    #[test]
    fn test_coincident_start_and_end() {
        let dir = optimize_direction(Vec2::ONE, Vec2::ONE, 1.0, 10.0, 2.0, &[]);
        assert_eq!(dir, Vec2::ZERO);
    }

    #[test]
    fn test_right_obstacle_pushes_left() {
        let dir = optimize(&[Segment::new(Vec2::new(5.0, -0.5), Vec2::new(5.0, -3.0))]);
        let angle = dir.y.atan2(dir.x);
        assert!(angle > 0.0, "angle = {angle}");
        assert!((dir.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_left_obstacle_pushes_right() {
        let dir = optimize(&[Segment::new(Vec2::new(5.0, 3.0), Vec2::new(5.0, 0.5))]);
        assert!(dir.y < 0.0);
    }

    #[test]
    fn test_symmetric_obstacles_cancel() {
        let dir = optimize(&[
            Segment::new(Vec2::new(5.0, 0.5), Vec2::new(5.0, 3.0)),
            Segment::new(Vec2::new(5.0, -0.5), Vec2::new(5.0, -3.0)),
        ]);
        assert!((dir - Vec2::X).length() < 1e-3, "dir = {dir:?}");
    }

    #[test]
    fn test_near_obstacle_inside_wedge_pushes_away() {
        // Right side, inside the wedge at x = 1 (half-width 0.5)
        let dir = optimize(&[Segment::new(Vec2::new(1.0, -0.2), Vec2::new(1.5, -0.3))]);
        assert!(dir.y > 0.0);
    }

    #[test]
    fn test_frame_independence() {
        // Same scenario as the repulsion test, rotated a quarter turn
        let wall = [Segment::new(Vec2::new(0.5, 5.0), Vec2::new(3.0, 5.0))];
        let dir = optimize_direction(Vec2::ZERO, Vec2::new(0.0, 10.0), 1.0, 10.0, 2.0, &wall);
        // Right of +y is +x, so the obstacle pushes towards -x
        assert!(dir.x < 0.0);
        assert!(dir.y > 0.9);
    }
}
