//! Approach-curve planner
//!
//! When the last corner is the destination and a final facing is requested,
//! the agent should arrive already turned the right way instead of stopping
//! and spinning on the spot. The planner moves the aim point back along the
//! facing direction and describes the arc that leads into it.

use std::f32::consts::FRAC_PI_4;

use glam::Vec2;

use super::edges::{Segment, distance_in_wedge, line_of_sight};
use super::geometry::line_intersection;
use crate::consts::{
    APPROACH_CLEARANCE_FRACTION, APPROACH_PROBE_BACKOFF, DISTANCE_EPSILON,
    MAX_APPROACH_REVERSAL_COS, MAX_PULL_BACK_FRACTION,
};

/// Where to steer on the way into the destination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachCurve {
    /// Point to aim at instead of the destination
    pub aim: Vec2,
    /// Unit tangent of the lead-in arc at the agent's position
    pub tangent: Vec2,
    /// Signed curvature of the lead-in arc (positive turns left)
    pub curvature: f32,
}

/// Circle through `from` that touches `facing` at `to`
#[derive(Debug, Clone, Copy)]
struct LeadInCircle {
    center: Vec2,
    radius: f32,
    /// +1 if the circle lies left of `facing`, -1 if right
    side: f32,
}

impl LeadInCircle {
    /// `None` if `from` lies on the facing line (the arc is straight)
    fn through(from: Vec2, to: Vec2, facing: Vec2) -> Option<Self> {
        let chord = to - from;
        let mid = (from + to) * 0.5;
        let center = line_intersection(to, to + facing.perp(), mid, mid + chord.perp())?;
        let offset = center - to;
        let radius = offset.length();
        if !radius.is_finite() || radius <= DISTANCE_EPSILON {
            return None;
        }
        Some(Self {
            center,
            radius,
            side: facing.perp_dot(offset).signum(),
        })
    }

    /// Unit tangent at `point` in the direction of travel
    fn tangent_at(&self, point: Vec2) -> Vec2 {
        ((point - self.center).perp() * self.side).normalize_or_zero()
    }

    fn curvature(&self) -> f32 {
        self.side / self.radius
    }
}

/// Plan the lead-in towards `destination` so the agent ends up facing `facing`
///
/// `None` means the caller should head straight at the destination: the turn
/// would be a near reversal, there is no room for an arc, or the aim point
/// is hidden behind an edge.
pub fn plan_approach(
    position: Vec2,
    destination: Vec2,
    facing: Vec2,
    lead_in_radius: f32,
    agent_radius: f32,
    edges: &[Segment],
) -> Option<ApproachCurve> {
    let facing = facing.normalize_or_zero();
    let to_target = destination - position;
    let distance = to_target.length();
    let dir = to_target.normalize_or_zero();
    if facing == Vec2::ZERO || dir == Vec2::ZERO {
        return None;
    }
    if dir.dot(facing) < MAX_APPROACH_REVERSAL_COS {
        return None;
    }

    let circle = LeadInCircle::through(position, destination, facing);
    let behind = -facing;
    // Quarter wedge on the side the arc sweeps through; straight approaches
    // probe symmetrically around the way back
    let (from_dir, to_dir) = match circle {
        Some(c) if c.side > 0.0 => (facing.perp(), behind),
        Some(_) => (behind, -facing.perp()),
        None => (
            Vec2::from_angle(-FRAC_PI_4).rotate(behind),
            Vec2::from_angle(FRAC_PI_4).rotate(behind),
        ),
    };
    let probe_origin = destination - facing * (APPROACH_PROBE_BACKOFF * agent_radius.max(0.0));
    let room = distance_in_wedge(probe_origin, from_dir, to_dir, edges);

    let circle_radius = circle.map_or(f32::INFINITY, |c| c.radius);
    let radius = (APPROACH_CLEARANCE_FRACTION * room)
        .min(lead_in_radius)
        .min(circle_radius);
    if !(radius > DISTANCE_EPSILON) {
        log::trace!("No room for a lead-in arc (room={room}, circle={circle_radius})");
        return None;
    }

    // Saturates at `radius` far away and goes to zero close to the destination.
    // Bounded by the distance left along the facing so the aim point never
    // collapses onto the agent: |aim - position| >= (1 - fraction) * distance
    let along = to_target.dot(facing).max(0.0);
    let pull_back = (radius * (distance / radius).tanh()).min(MAX_PULL_BACK_FRACTION * along);
    let aim = destination - facing * pull_back;
    if !line_of_sight(position, aim, edges) {
        log::trace!("Lead-in aim point is occluded");
        return None;
    }

    // Arc into the aim point, which is reached already facing the right way
    let curve = match LeadInCircle::through(position, aim, facing) {
        Some(arc) => ApproachCurve {
            aim,
            tangent: arc.tangent_at(position),
            curvature: arc.curvature(),
        },
        None => ApproachCurve {
            aim,
            tangent: (aim - position).normalize_or_zero(),
            curvature: 0.0,
        },
    };
    (curve.aim.is_finite() && curve.tangent.is_finite() && curve.curvature.is_finite())
        .then_some(curve)
}
