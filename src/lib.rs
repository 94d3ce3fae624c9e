//! Pathsteer - per-tick path-following steering controller
//!
//! Converts "where to go next" plus "which obstacle edges are nearby" into a
//! smooth, wall-aware motion delta for a single agent and a single tick.
//!
//! Core modules:
//! - `steer`: Geometry kernel, edge classifier, direction optimizer, approach
//!   curve, angle feedback controller and the `control` tick entry point
//! - `settings`: Per-agent movement tuning and the persistent wall distance
//! - `plane`: Projection between the 3D world and the 2D movement plane
//! - `error`: Configuration errors

pub mod error;
pub mod plane;
pub mod settings;
pub mod steer;

pub use error::SettingsError;
pub use plane::MovementPlane;
pub use settings::{MovementSettings, PersistentState};
pub use steer::{Segment, SteeringMode, TickInput, TickOutput, control, control_batch};

/// Controller tuning constants
///
/// Empirically tuned. Changing them changes how agents hug walls and cut
/// corners, so treat them as defaults to preserve.
pub mod consts {
    use std::f32::consts::FRAC_PI_3;

    /// Direction optimizer iterations per tick (no early exit)
    pub const OPTIMIZATION_ITERATIONS: usize = 8;
    /// Default corridor "pointiness": wedge half-angle is atan(1 / pointiness)
    pub const DEFAULT_POINTINESS: f32 = 2.0;
    /// Pieces produced by a split that are shorter than this times the
    /// clearance radius are dropped
    pub const ALLOWED_OVERLAP_FACTOR: f32 = 0.1;
    /// Edges within this fraction of the clearance radius of the agent are ignored
    pub const DEAD_ZONE_FACTOR: f32 = 0.01;
    /// Perpendicular tie-break offset applied before side classification
    pub const SIDE_BIAS: f32 = 0.01;
    /// Edges farther than this times the clearance radius from the centerline are skipped
    pub const EDGE_REJECT_FACTOR: f32 = 2.0;
    /// Recursion limit for dead zone splitting
    pub const MAX_SPLIT_DEPTH: u32 = 2;
    /// Capacity of each classified edge bucket
    pub const EDGE_BUFFER_CAPACITY: usize = 32;

    /// Lookahead never grows past this fraction of the remaining path
    pub const MAX_FRACTION_OF_REMAINING_DISTANCE: f32 = 0.9;
    /// Per-iteration lookahead growth when no obstacle constrains the direction
    pub const LOOKAHEAD_GROWTH: f32 = 1.2;
    /// Fraction of the weighted correction applied per optimizer iteration
    pub const STEP_DAMPING: f32 = 0.5;
    /// Clearance radii below this disable the optimizer
    pub const MIN_DESIRED_RADIUS: f32 = 1e-4;
    /// Wedges narrower than this (radians) never constrain anything
    pub const MIN_WEDGE_ANGLE: f32 = 1e-3;

    /// Clearance is divided by this factor close to the end of the path
    pub const DESTINATION_CLEARANCE_FACTOR: f32 = 4.0;
    /// Arrival slowdown starts when remaining distance < factor * agent radius
    pub const ARRIVAL_RADIUS_FACTOR: f32 = 0.1;
    /// Next corner counts as the destination when closer than this
    pub const CORNER_IS_DESTINATION_DISTANCE: f32 = 0.1;
    /// Approach curves are skipped when cos(turn onto facing) is below this
    pub const MAX_APPROACH_REVERSAL_COS: f32 = -0.2;
    /// Usable fraction of the probed clearance for an approach arc
    pub const APPROACH_CLEARANCE_FRACTION: f32 = 0.9;
    /// Clearance probe is backed off this many agent radii along the facing
    pub const APPROACH_PROBE_BACKOFF: f32 = 0.1;
    /// Aim point pull-back never exceeds this fraction of the distance left
    /// along the facing, so the aim stays ahead of the agent
    pub const MAX_PULL_BACK_FRACTION: f32 = 0.5;
    /// Persistent wall distance grows by speed * factor per second
    pub const WALL_DISTANCE_GROWTH: f32 = 0.1;

    /// Remaining angle (radians) above which the agent starts rotating in place
    pub const ROTATE_ON_SPOT_ENTER_ANGLE: f32 = 2.0 * FRAC_PI_3;
    /// Remaining angle (radians) below which a stopped agent resumes cruising
    pub const ROTATE_ON_SPOT_EXIT_ANGLE: f32 = 0.1;
    /// Speeds at or below this count as standing still
    pub const STOPPED_SPEED: f32 = 1e-3;

    /// Floor for speeds used as denominators
    pub const MIN_SPEED: f32 = 1e-5;
    /// Time constants at or below this mean "instantaneous"
    pub const MIN_TIME_CONSTANT: f32 = 1e-3;
    /// Floor for distances used as denominators
    pub const DISTANCE_EPSILON: f32 = 1e-4;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid may round up to exactly TAU
    if wrapped >= PI { wrapped - TAU } else { wrapped }
}

/// Heading angle of a planar direction
#[inline]
pub fn heading_of(dir: glam::Vec2) -> f32 {
    dir.y.atan2(dir.x)
}
