//! Obstacle edges
//!
//! Edges arrive from the navigation layer as point pairs in the movement
//! plane. This module sorts them into the four buckets the direction
//! optimizer consumes, and provides the clearance and visibility probes used
//! by the rest of the controller.
//!
//! The classifier works in a corridor frame: the agent sits at the origin and
//! the corridor runs along +x. Near the agent the safety region is a wedge
//! (`|y| <= x / pointiness`); from `x = pointiness * radius` onward it becomes
//! two straight lanes of half-width `radius`. Together they form a chisel.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::{
    Axis, clip_range_by_half_plane, clip_segment_by_half_plane, closest_point_on_segment,
    rotate_into, segment_circle_intersection, segment_intersection_factor, signed_angle,
};
use crate::consts::{
    ALLOWED_OVERLAP_FACTOR, DEAD_ZONE_FACTOR, EDGE_BUFFER_CAPACITY, EDGE_REJECT_FACTOR,
    MAX_SPLIT_DEPTH, MIN_WEDGE_ANGLE, SIDE_BIAS,
};

/// An obstacle boundary segment in the movement plane
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub const ZERO: Self = Self {
        a: Vec2::ZERO,
        b: Vec2::ZERO,
    };

    #[inline]
    pub const fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.a.distance(self.b)
    }

    /// Reinterpret a flat `[ax, ay, bx, by, ...]` buffer as segments without copying
    ///
    /// `None` if the length is not a multiple of four.
    pub fn cast_flat(flat: &[f32]) -> Option<&[Segment]> {
        bytemuck::try_cast_slice(flat).ok()
    }

    /// Distance from `p` to the closest point of the segment
    #[inline]
    pub fn distance_to(&self, p: Vec2) -> f32 {
        closest_point_on_segment(p, self.a, self.b).distance(p)
    }

    /// The segment expressed in the frame at `origin` whose +x axis is `dir`
    #[inline]
    pub fn to_local(&self, origin: Vec2, dir: Vec2) -> Self {
        Self {
            a: rotate_into(self.a - origin, dir),
            b: rotate_into(self.b - origin, dir),
        }
    }
}

/// Fixed-capacity segment list
///
/// Pushing past capacity silently drops the segment, which keeps the
/// per-tick cost bounded.
#[derive(Debug, Clone, Copy)]
pub struct EdgeBuffer {
    items: [Segment; EDGE_BUFFER_CAPACITY],
    len: usize,
}

impl Default for EdgeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeBuffer {
    pub const fn new() -> Self {
        Self {
            items: [Segment::ZERO; EDGE_BUFFER_CAPACITY],
            len: 0,
        }
    }

    /// Append a segment; returns `false` if the buffer was full
    pub fn push(&mut self, segment: Segment) -> bool {
        if self.len == EDGE_BUFFER_CAPACITY {
            log::trace!("Edge buffer full, dropping segment {segment:?}");
            return false;
        }
        self.items[self.len] = segment;
        self.len += 1;
        true
    }

    #[inline]
    pub fn as_slice(&self) -> &[Segment] {
        &self.items[..self.len]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.as_slice().iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// The four classifier outputs, all in the corridor frame
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeBuckets {
    /// Inside the wedge, left of the centerline
    pub near_left: EdgeBuffer,
    /// Inside the wedge, right of the centerline
    pub near_right: EdgeBuffer,
    /// Inside the left lane
    pub far_left: EdgeBuffer,
    /// Inside the right lane
    pub far_right: EdgeBuffer,
}

impl EdgeBuckets {
    pub fn is_empty(&self) -> bool {
        self.near_left.is_empty()
            && self.near_right.is_empty()
            && self.far_left.is_empty()
            && self.far_right.is_empty()
    }

    /// Total classified pieces
    pub fn len(&self) -> usize {
        self.near_left.len() + self.near_right.len() + self.far_left.len() + self.far_right.len()
    }
}

/// Shape of the travel corridor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    /// How far ahead obstacles matter
    pub length: f32,
    /// Clearance radius
    pub radius: f32,
    /// Wedge half-angle is atan(1 / pointiness)
    pub pointiness: f32,
}

impl Corridor {
    /// Distance along the corridor where the wedge becomes two lanes
    #[inline]
    pub fn transition(&self) -> f32 {
        self.pointiness * self.radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    NearLeft,
    NearRight,
    FarLeft,
    FarRight,
}

impl Region {
    const ALL: [Region; 4] = [
        Region::NearLeft,
        Region::NearRight,
        Region::FarLeft,
        Region::FarRight,
    ];

    #[inline]
    fn side(self) -> f32 {
        match self {
            Region::NearLeft | Region::FarLeft => 1.0,
            Region::NearRight | Region::FarRight => -1.0,
        }
    }

    #[inline]
    fn is_near(self) -> bool {
        matches!(self, Region::NearLeft | Region::NearRight)
    }
}

/// Sort `edges` into near/far, left/right buckets for the corridor that
/// starts at `start` and runs along the unit direction `dir`
pub fn classify_edges(
    start: Vec2,
    dir: Vec2,
    corridor: &Corridor,
    edges: &[Segment],
) -> EdgeBuckets {
    let mut buckets = EdgeBuckets::default();
    if !(corridor.radius > 0.0 && corridor.length > 0.0 && corridor.pointiness > 0.0) {
        return buckets;
    }

    for edge in edges {
        if !(edge.a.is_finite() && edge.b.is_finite()) {
            continue;
        }
        let local = edge.to_local(start, dir);
        // Orientation breaks ties: forward-pointing edges lean right
        let bias = if local.b.x >= local.a.x { -SIDE_BIAS } else { SIDE_BIAS };
        split_segment(local.a, local.b, bias, 0, false, corridor, &mut buckets);
    }
    buckets
}

fn split_segment(
    a: Vec2,
    b: Vec2,
    bias: f32,
    depth: u32,
    was_split: bool,
    corridor: &Corridor,
    buckets: &mut EdgeBuckets,
) {
    let reject = EDGE_REJECT_FACTOR * corridor.radius;
    if (a.y > reject && b.y > reject) || (a.y < -reject && b.y < -reject) {
        return;
    }

    // Only what is in front of the agent and within reach matters
    let Some((a, b)) = clip_segment_by_half_plane(a, b, Axis::X, 0.0, 1.0) else {
        return;
    };
    let Some((a, b)) = clip_segment_by_half_plane(a, b, Axis::X, corridor.length, -1.0) else {
        return;
    };

    let dead_zone = DEAD_ZONE_FACTOR * corridor.radius;
    if depth < MAX_SPLIT_DEPTH {
        if let Some((t1, t2)) = segment_circle_intersection(a, b, dead_zone * dead_zone) {
            if t1 < 1.0 && t2 > 0.0 {
                if t1 > 0.0 {
                    split_segment(a, a.lerp(b, t1), bias, depth + 1, true, corridor, buckets);
                }
                if t2 < 1.0 {
                    split_segment(a.lerp(b, t2), b, bias, depth + 1, true, corridor, buckets);
                }
                return;
            }
        }
    }

    classify_piece(a, b, bias, was_split, corridor, buckets);
}

fn classify_piece(
    a: Vec2,
    b: Vec2,
    bias: f32,
    was_split: bool,
    corridor: &Corridor,
    buckets: &mut EdgeBuckets,
) {
    let transition = corridor.transition();
    let biased_a = a + Vec2::new(0.0, bias);
    let biased_b = b + Vec2::new(0.0, bias);
    let min_piece = ALLOWED_OVERLAP_FACTOR * corridor.radius;

    for region in Region::ALL {
        let side = region.side();
        // Mirror so the region's side is always +y
        let (ma, mb) = (Vec2::new(a.x, a.y * side), Vec2::new(b.x, b.y * side));
        let (mut t0, mut t1) = (0.0f32, 1.0f32);

        let mut inside =
            clip_range_by_half_plane(biased_a, biased_b, Axis::Y, 0.0, side, &mut t0, &mut t1);
        if region.is_near() {
            inside = inside
                && clip_range_by_half_plane(a, b, Axis::X, transition, -1.0, &mut t0, &mut t1);
            // Wedge: y <= x / pointiness, sheared so it becomes y' <= 0
            let (wa, wb) = (
                Vec2::new(ma.x, ma.y - ma.x / corridor.pointiness),
                Vec2::new(mb.x, mb.y - mb.x / corridor.pointiness),
            );
            inside =
                inside && clip_range_by_half_plane(wa, wb, Axis::Y, 0.0, -1.0, &mut t0, &mut t1);
        } else {
            inside = inside
                && clip_range_by_half_plane(a, b, Axis::X, transition, 1.0, &mut t0, &mut t1);
            inside = inside
                && clip_range_by_half_plane(
                    ma,
                    mb,
                    Axis::Y,
                    corridor.radius,
                    -1.0,
                    &mut t0,
                    &mut t1,
                );
        }
        if !inside || t1 - t0 <= f32::EPSILON {
            continue;
        }

        let piece = Segment::new(a.lerp(b, t0), a.lerp(b, t1));
        let cut = was_split || t0 > 0.0 || t1 < 1.0;
        if cut && piece.length() < min_piece {
            continue;
        }

        let bucket = match region {
            Region::NearLeft => &mut buckets.near_left,
            Region::NearRight => &mut buckets.near_right,
            Region::FarLeft => &mut buckets.far_left,
            Region::FarRight => &mut buckets.far_right,
        };
        bucket.push(piece);
    }
}

/// Distance from `origin` to the closest edge point inside the wedge swept
/// counter-clockwise from `from_dir` to `to_dir`
///
/// Returns `f32::INFINITY` when nothing is inside, or when the wedge is
/// narrower than [`MIN_WEDGE_ANGLE`] or wider than half a turn.
pub fn distance_in_wedge(origin: Vec2, from_dir: Vec2, to_dir: Vec2, edges: &[Segment]) -> f32 {
    let from_dir = from_dir.normalize_or_zero();
    let span = signed_angle(from_dir, to_dir);
    if from_dir == Vec2::ZERO || span < MIN_WEDGE_ANGLE {
        return f32::INFINITY;
    }
    // In the local frame the wedge starts along +x; `far_edge` is its other ray
    let far_edge = Vec2::from_angle(span);

    let mut closest = f32::INFINITY;
    for edge in edges {
        let local = edge.to_local(origin, from_dir);
        let (mut t0, mut t1) = (0.0f32, 1.0f32);
        if !clip_range_by_half_plane(local.a, local.b, Axis::Y, 0.0, 1.0, &mut t0, &mut t1) {
            continue;
        }
        // Clockwise of the far ray: far_edge × p <= 0
        let ca = Vec2::new(0.0, far_edge.perp_dot(local.a));
        let cb = Vec2::new(0.0, far_edge.perp_dot(local.b));
        if !clip_range_by_half_plane(ca, cb, Axis::Y, 0.0, -1.0, &mut t0, &mut t1) {
            continue;
        }
        let pa = local.a.lerp(local.b, t0);
        let pb = local.a.lerp(local.b, t1);
        let distance = closest_point_on_segment(Vec2::ZERO, pa, pb).length();
        closest = closest.min(distance);
    }
    closest
}

/// Factor along `from..to` of the first edge crossing, if any
pub fn first_hit(from: Vec2, to: Vec2, edges: &[Segment]) -> Option<f32> {
    edges
        .iter()
        .filter_map(|edge| segment_intersection_factor(from, to, edge.a, edge.b))
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

/// Whether the segment `from..to` crosses no edge
#[inline]
pub fn line_of_sight(from: Vec2, to: Vec2, edges: &[Segment]) -> bool {
    first_hit(from, to, edges).is_none()
}

/// Distance from `point` to the nearest edge, or `f32::INFINITY` without edges
pub fn nearest_edge_distance(point: Vec2, edges: &[Segment]) -> f32 {
    edges
        .iter()
        .map(|edge| edge.distance_to(point))
        .fold(f32::INFINITY, f32::min)
}
