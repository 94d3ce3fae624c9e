//! Per-tick entry point
//!
//! `control` wires the pieces together for one agent and one tick: project
//! into the movement plane, pick a safe direction, let the feedback
//! controller turn it into rotation and speed, and emit the motion delta.
//! It is a pure function; the only state carried between ticks is
//! [`PersistentState`].

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::approach::plan_approach;
use super::edges::{Segment, distance_in_wedge, first_hit, nearest_edge_distance};
use super::geometry::signed_angle;
use super::optimize::optimize_direction;
use super::pid::{SteeringMode, SteeringTarget, steer};
use crate::consts::{
    ARRIVAL_RADIUS_FACTOR, CORNER_IS_DESTINATION_DISTANCE, DEAD_ZONE_FACTOR, DEFAULT_POINTINESS,
    DESTINATION_CLEARANCE_FACTOR, DISTANCE_EPSILON, MIN_WEDGE_ANGLE,
};
use crate::normalize_angle;
use crate::plane::MovementPlane;
use crate::settings::{MovementSettings, PersistentState};

/// One agent's view of the world for one tick
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// Agent position (world)
    pub position: Vec3,
    /// Current linear speed (m/s)
    pub speed: f32,
    /// Current heading in the movement plane (radians)
    pub rotation: f32,
    /// Distance left along the path
    pub remaining_distance: f32,
    /// Next corner of the path (world)
    pub next_corner: Vec3,
    /// Last point of the path (world)
    pub end_of_path: Vec3,
    /// Direction to face once the end is reached (world)
    pub facing_direction_at_end_of_path: Option<Vec3>,
    pub agent_radius: f32,
    /// Nearby obstacle edges, in movement-plane coordinates
    pub edges: &'a [Segment],
    pub plane: MovementPlane,
    /// Tick length (seconds); zero or negative means paused
    pub dt: f32,
}

/// What to apply to the agent this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickOutput {
    /// Heading change (radians)
    pub rotation_delta: f32,
    /// Heading the agent is converging on (radians)
    pub target_rotation: f32,
    /// Translation in the movement plane
    pub position_delta: Vec2,
    pub mode: SteeringMode,
}

impl TickOutput {
    /// Translation lifted back into the world
    pub fn world_delta(&self, plane: &MovementPlane) -> Vec3 {
        plane.direction_to_world(self.position_delta)
    }

    /// Zero out anything that is not finite
    fn sanitized(mut self) -> Self {
        if !self.rotation_delta.is_finite() {
            self.rotation_delta = 0.0;
        }
        if !self.target_rotation.is_finite() {
            self.target_rotation = 0.0;
        }
        if !self.position_delta.is_finite() {
            self.position_delta = Vec2::ZERO;
        }
        self
    }
}

/// Run one tick for one agent
///
/// Returns the motion to apply and the state to pass into the next tick. A
/// paused tick (`dt <= 0`) returns a zero output and leaves the state alone.
pub fn control(
    settings: &MovementSettings,
    input: &TickInput<'_>,
    state: PersistentState,
) -> (TickOutput, PersistentState) {
    let dt = input.dt;
    if !(dt > 0.0) || !dt.is_finite() {
        return (TickOutput::default(), state);
    }

    let plane = &input.plane;
    let position = plane.to_plane(input.position);
    let end = plane.to_plane(input.end_of_path);
    let facing = input
        .facing_direction_at_end_of_path
        .map(|f| plane.direction_to_plane(f).normalize_or_zero())
        .filter(|f| *f != Vec2::ZERO);
    let edges = input.edges;
    let radius = input.agent_radius.max(0.0);
    let remaining = input.remaining_distance.max(0.0);
    let heading_dir = Vec2::from_angle(input.rotation);

    // Head for the visible part of the way to the corner
    let raw_corner = plane.to_plane(input.next_corner);
    let corner = match first_hit(position, raw_corner, edges) {
        Some(t) if (raw_corner - position).length() * t > DEAD_ZONE_FACTOR * radius => {
            position.lerp(raw_corner, t)
        }
        _ => raw_corner,
    };

    let nearest = nearest_edge_distance(position, edges);
    let wall_distance = settings
        .desired_wall_distance
        .min(state.max_desired_wall_distance.max(0.0).min(nearest))
        .min(remaining / DESTINATION_CLEARANCE_FACTOR);

    let arriving = remaining < ARRIVAL_RADIUS_FACTOR * radius;
    let approach = match facing {
        Some(facing)
            if !arriving
                && settings.lead_in_radius_when_approaching_destination > 0.0
                && corner.distance(end) < CORNER_IS_DESTINATION_DISTANCE =>
        {
            plan_approach(
                position,
                end,
                facing,
                settings.lead_in_radius_when_approaching_destination,
                radius,
                edges,
            )
        }
        _ => None,
    };
    let aim = approach.map_or(corner, |curve| curve.aim);

    let mut safe_direction = optimize_direction(
        position,
        aim,
        wall_distance,
        remaining,
        DEFAULT_POINTINESS,
        edges,
    );
    if safe_direction == Vec2::ZERO {
        safe_direction = heading_dir;
    }

    let min_rotation_speed =
        corner_rotation_speed(settings, input, position, heading_dir, safe_direction);

    let target = SteeringTarget {
        heading: input.rotation,
        speed: input.speed,
        avoidance_direction: safe_direction,
        curve_tangent: approach.map_or(safe_direction, |curve| curve.tangent),
        curvature: approach.map_or(0.0, |curve| curve.curvature),
        remaining_distance: remaining,
        agent_radius: radius,
        facing,
        min_rotation_speed,
    };
    let command = steer(settings, &target, dt);

    let position_delta = if command.mode == SteeringMode::ArrivalSlowdown {
        let to_end = end - position;
        to_end.normalize_or_zero() * (command.speed * dt).min(to_end.length())
    } else {
        Vec2::from_angle(command.travel_heading) * (command.speed * dt)
    };

    let output = TickOutput {
        rotation_delta: command.rotation_delta,
        target_rotation: normalize_angle(command.target_rotation),
        position_delta,
        mode: command.mode,
    }
    .sanitized();
    let next_state = state.advanced(settings, nearest, dt);

    log::trace!(
        "control: mode={:?} speed={:.3} wall_distance={:.3} approach={}",
        output.mode,
        command.speed,
        wall_distance,
        approach.is_some()
    );
    (output, next_state)
}

/// Rotation speed (rad/s) needed to turn onto `safe_direction` before the
/// walls inside the turn get within one agent radius
///
/// Zero when the turn is negligible or nothing is in the way.
fn corner_rotation_speed(
    settings: &MovementSettings,
    input: &TickInput<'_>,
    position: Vec2,
    heading_dir: Vec2,
    safe_direction: Vec2,
) -> f32 {
    let turn = signed_angle(heading_dir, safe_direction);
    if turn.abs() <= MIN_WEDGE_ANGLE {
        return 0.0;
    }
    let (from, to) = if turn > 0.0 {
        (heading_dir, safe_direction)
    } else {
        (safe_direction, heading_dir)
    };
    let room = distance_in_wedge(position, from, to, input.edges);
    if !room.is_finite() {
        return 0.0;
    }
    let clearance = (room - input.agent_radius.max(0.0)).max(DISTANCE_EPSILON);
    let needed = turn.abs() * input.speed.max(0.0) / clearance;
    needed.min(settings.max_rotation_speed_rad().max(0.0))
}
