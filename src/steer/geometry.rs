//! Planar geometry kernel
//!
//! Small allocation-free helpers shared by the classifier, the optimizer and
//! the approach planner. Degenerate input (zero-length segments, parallel
//! lines) yields a sentinel such as `None`, never NaN.
//!
//! Rotations are complex multiplications: a unit `Vec2` is a rotation, and
//! `dir.rotate(v)` turns `v` by the angle of `dir`.

use glam::Vec2;

/// Cross products smaller than this (relative to the operand lengths) count as parallel
pub const PARALLEL_EPSILON: f32 = 1e-6;

/// Squared lengths below this count as zero-length segments
const DEGENERATE_LENGTH_SQ: f32 = 1e-12;

/// Coordinate axis used by the half-plane clippers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    #[inline]
    pub fn of(self, p: Vec2) -> f32 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }
}

/// Shrink `a..b` so both endpoints satisfy `(coord - boundary) * side >= 0`
///
/// Returns `None` if no part of the segment is on the kept side.
pub fn clip_segment_by_half_plane(
    a: Vec2,
    b: Vec2,
    axis: Axis,
    boundary: f32,
    side: f32,
) -> Option<(Vec2, Vec2)> {
    let da = (axis.of(a) - boundary) * side;
    let db = (axis.of(b) - boundary) * side;
    let wrong_a = da < 0.0;
    let wrong_b = db < 0.0;

    match (wrong_a, wrong_b) {
        (true, true) => None,
        (false, false) => Some((a, b)),
        _ => {
            // Opposite signs, so the denominator is non-zero
            let hit = a.lerp(b, da / (da - db));
            if wrong_a { Some((hit, b)) } else { Some((a, hit)) }
        }
    }
}

/// Shrink the parametric range `[t_min, t_max]` along `a..b` to the part
/// where `(coord - boundary) * side >= 0`
///
/// Several constraints can be intersected by calling this repeatedly with
/// the same range. Returns whether the range is still non-empty.
pub fn clip_range_by_half_plane(
    a: Vec2,
    b: Vec2,
    axis: Axis,
    boundary: f32,
    side: f32,
    t_min: &mut f32,
    t_max: &mut f32,
) -> bool {
    let da = (axis.of(a) - boundary) * side;
    let db = (axis.of(b) - boundary) * side;

    if da < 0.0 && db < 0.0 {
        *t_min = 1.0;
        *t_max = 0.0;
        return false;
    }
    if da < 0.0 {
        *t_min = t_min.max(da / (da - db));
    } else if db < 0.0 {
        *t_max = t_max.min(da / (da - db));
    }
    *t_min <= *t_max
}

/// Parametric factors where the line through `a..b` crosses a circle of
/// squared radius `radius_sq` centered on the origin
///
/// Factors are unclamped and ordered (`t1 <= t2`); `None` for a miss or a
/// zero-length segment.
pub fn segment_circle_intersection(a: Vec2, b: Vec2, radius_sq: f32) -> Option<(f32, f32)> {
    let d = b - a;
    let qa = d.length_squared();
    if qa < DEGENERATE_LENGTH_SQ {
        return None;
    }
    let qb = a.dot(d);
    let qc = a.length_squared() - radius_sq;
    let discriminant = qb * qb - qa * qc;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    Some(((-qb - root) / qa, (-qb + root) / qa))
}

/// The more clockwise of two directions
#[inline]
pub fn most_clockwise(a: Vec2, b: Vec2) -> Vec2 {
    if a.perp_dot(b) >= 0.0 { a } else { b }
}

/// The more counter-clockwise of two directions
#[inline]
pub fn most_counter_clockwise(a: Vec2, b: Vec2) -> Vec2 {
    if a.perp_dot(b) >= 0.0 { b } else { a }
}

/// The most clockwise (or counter-clockwise) of three directions
///
/// Directions are compared pairwise by the sign of their determinant, so
/// they must lie within half a turn of each other.
#[inline]
pub fn most_extreme(a: Vec2, b: Vec2, c: Vec2, clockwise: bool) -> Vec2 {
    if clockwise {
        most_clockwise(most_clockwise(a, b), c)
    } else {
        most_counter_clockwise(most_counter_clockwise(a, b), c)
    }
}

/// Intersection of the infinite lines `p1-p2` and `p3-p4`
///
/// `None` if the lines are parallel or either is degenerate.
pub fn line_intersection(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> Option<Vec2> {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    let denom = d1.perp_dot(d2);
    if denom.abs() <= PARALLEL_EPSILON * d1.length() * d2.length() || denom == 0.0 {
        return None;
    }
    let t = (p3 - p1).perp_dot(d2) / denom;
    Some(p1 + d1 * t)
}

/// Factor along `p1-p2` where it crosses the segment `p3-p4`
///
/// `None` if the segments don't cross or are parallel.
pub fn segment_intersection_factor(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> Option<f32> {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    let denom = d1.perp_dot(d2);
    if denom.abs() <= PARALLEL_EPSILON * d1.length() * d2.length() || denom == 0.0 {
        return None;
    }
    let offset = p3 - p1;
    let t = offset.perp_dot(d2) / denom;
    let u = offset.perp_dot(d1) / denom;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then_some(t)
}

/// Express `v` in the frame whose +x axis is the unit vector `frame_dir`
#[inline]
pub fn rotate_into(v: Vec2, frame_dir: Vec2) -> Vec2 {
    Vec2::new(frame_dir.x, -frame_dir.y).rotate(v)
}

/// Inverse of [`rotate_into`]
#[inline]
pub fn rotate_out(v: Vec2, frame_dir: Vec2) -> Vec2 {
    frame_dir.rotate(v)
}

/// Signed angle (radians, counter-clockwise positive) from `from` to `to`
///
/// Zero if either vector is zero.
#[inline]
pub fn signed_angle(from: Vec2, to: Vec2) -> f32 {
    from.perp_dot(to).atan2(from.dot(to))
}

/// Closest point to `p` on the segment `a..b`
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let line = b - a;
    let len_sq = line.length_squared();
    if len_sq < DEGENERATE_LENGTH_SQ {
        return a;
    }
    let t = ((p - a).dot(line) / len_sq).clamp(0.0, 1.0);
    a + line * t
}
