//! Angle feedback controller
//!
//! A critically damped law on the heading error `theta` and the lateral
//! offset `y` from the ideal line, per unit of travelled distance:
//!
//! ```text
//! dphi/ds = kappa - alpha * y - 2 * sqrt(alpha) * theta
//! ```
//!
//! `alpha` is the following strength. It is derived from the configured
//! rotation speed so that the agent turns at roughly that rate whatever its
//! speed. Large turns switch to rotating in place; the last stretch of the
//! path switches to a straight arrival.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::signed_angle;
use crate::consts::{
    ARRIVAL_RADIUS_FACTOR, DISTANCE_EPSILON, MIN_SPEED, ROTATE_ON_SPOT_ENTER_ANGLE,
    ROTATE_ON_SPOT_EXIT_ANGLE, STOPPED_SPEED,
};
use crate::heading_of;
use crate::settings::MovementSettings;

/// Which branch of the controller produced a command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SteeringMode {
    /// Following the path while moving
    #[default]
    Cruising,
    /// Braking or stopped to turn on the spot
    RotatingInPlace,
    /// Close enough to the end to move straight at it
    ArrivalSlowdown,
}

/// Everything the controller needs to know about one agent for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringTarget {
    /// Current heading (radians)
    pub heading: f32,
    /// Current speed (m/s)
    pub speed: f32,
    /// Direction that keeps clearance from the walls
    pub avoidance_direction: Vec2,
    /// Tangent of the curve being followed; the avoidance direction if there is none
    pub curve_tangent: Vec2,
    /// Signed curvature of that curve (1/m, positive turns left)
    pub curvature: f32,
    pub remaining_distance: f32,
    pub agent_radius: f32,
    /// Heading to end up with at the destination
    pub facing: Option<Vec2>,
    /// Lower bound on the rotation speed used to derive the following strength (rad/s)
    pub min_rotation_speed: f32,
}

/// What the agent does this tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringCommand {
    /// Heading change this tick (radians)
    pub rotation_delta: f32,
    /// Heading the controller is converging on (radians)
    pub target_rotation: f32,
    /// Speed for this tick (m/s)
    pub speed: f32,
    /// Heading to translate along this tick (radians)
    pub travel_heading: f32,
    pub mode: SteeringMode,
}

/// Following strength that turns at `rotation_speed` (rad/s) when moving at `speed`
#[inline]
pub fn rotation_speed_to_following_strength(speed: f32, rotation_speed: f32) -> f32 {
    let speed = speed.max(MIN_SPEED);
    rotation_speed * rotation_speed / (4.0 * speed * speed)
}

/// Inverse of [`rotation_speed_to_following_strength`]
#[inline]
pub fn following_strength_to_rotation_speed(following_strength: f32, speed: f32) -> f32 {
    2.0 * following_strength.max(0.0).sqrt() * speed
}

/// Total rotation (radians) of the critically damped response starting at
/// heading error `theta0` and lateral offset `y0`, including its overshoot
pub fn remaining_angle_to_steady_state(theta0: f32, y0: f32, following_strength: f32) -> f32 {
    let k = following_strength.max(0.0).sqrt();
    // theta(s) = (theta0 - k c s) e^(-k s)
    let c = theta0 + k * y0;
    if c.abs() < 1e-6 || k <= 0.0 {
        return theta0.abs();
    }
    let s_extreme = (2.0 * theta0 + k * y0) / (k * c);
    if !(s_extreme > 0.0) || !s_extreme.is_finite() {
        // Decays monotonically
        return theta0.abs();
    }
    let extreme = -c * (-k * s_extreme).exp();
    (theta0 - extreme).abs() + extreme.abs()
}

/// Run the controller for one tick
pub fn steer(settings: &MovementSettings, target: &SteeringTarget, dt: f32) -> SteeringCommand {
    let heading = target.heading;
    if !(dt > 0.0) || !dt.is_finite() {
        return SteeringCommand {
            target_rotation: heading,
            travel_heading: heading,
            ..Default::default()
        };
    }

    let speed_limit = settings.speed_at(target.remaining_distance);
    if target.remaining_distance < ARRIVAL_RADIUS_FACTOR * target.agent_radius {
        return arrive(settings, target, speed_limit, dt);
    }

    let heading_dir = Vec2::from_angle(heading);
    let avoid_error = error_towards(heading_dir, target.avoidance_direction);
    let curve_error = if target.curve_tangent == Vec2::ZERO {
        avoid_error
    } else {
        error_towards(heading_dir, target.curve_tangent)
    };
    let rotation_speed = settings.rotation_speed_rad().max(target.min_rotation_speed);
    let target_rotation = if target.avoidance_direction == Vec2::ZERO {
        heading
    } else {
        heading_of(target.avoidance_direction)
    };

    let accelerated =
        speed_limit.min(settings.accelerate(target.speed, settings.slowdown_time, dt));
    let cruise = Cruise {
        settings,
        avoid_error,
        curve_error,
        curvature: target.curvature,
        rotation_speed,
        dt,
    };

    // Heading error is measured from the goal to the agent
    let theta0 = -avoid_error;
    let strength = rotation_speed_to_following_strength(accelerated, rotation_speed);
    let k = strength.sqrt();
    let offset = theta0.sin() / k.max(MIN_SPEED);
    let remaining = remaining_angle_to_steady_state(theta0, offset, strength);
    // A stopped agent keeps turning until it is nearly aligned
    let stopped = target.speed <= STOPPED_SPEED;
    let rotate_in_place = settings.allow_rotating_on_spot
        && (remaining > ROTATE_ON_SPOT_ENTER_ANGLE
            || (stopped && remaining > ROTATE_ON_SPOT_EXIT_ANGLE));

    let (rotation, speed, mode) = if rotate_in_place {
        let braked = settings.decelerate(
            target.speed,
            settings.slowdown_time_when_turning_on_spot,
            dt,
        );
        if braked > STOPPED_SPEED {
            // Keep turning while braking, within both rotation caps
            let cap = settings
                .max_rotation_speed_rad()
                .min(settings.max_on_spot_rotation_speed_rad());
            let (rotation, speed) = cruise.step_capped(braked.min(speed_limit), cap * dt);
            (rotation, speed, SteeringMode::RotatingInPlace)
        } else {
            let (rotation, speed) = rotate_on_spot(settings, avoid_error, speed_limit, dt);
            (rotation, speed, SteeringMode::RotatingInPlace)
        }
    } else {
        let (rotation, speed) = cruise.step(accelerated);
        (rotation, speed, SteeringMode::Cruising)
    };

    log::trace!(
        "steer: mode={mode:?} error={avoid_error:.3} remaining={remaining:.3} speed={speed:.3}"
    );
    SteeringCommand {
        rotation_delta: rotation,
        target_rotation,
        speed,
        // Chord of the arc turned this tick
        travel_heading: heading + rotation * 0.5,
        mode,
    }
}

/// Signed angle from the heading to `desired`, zero without a desired direction
#[inline]
fn error_towards(heading_dir: Vec2, desired: Vec2) -> f32 {
    if desired == Vec2::ZERO {
        0.0
    } else {
        signed_angle(heading_dir, desired)
    }
}

/// The moving branch of the controller
struct Cruise<'a> {
    settings: &'a MovementSettings,
    avoid_error: f32,
    curve_error: f32,
    curvature: f32,
    rotation_speed: f32,
    dt: f32,
}

impl Cruise<'_> {
    /// Rotation and speed for one tick at `speed`
    fn step(&self, speed: f32) -> (f32, f32) {
        self.step_capped(speed, self.settings.max_rotation_speed_rad() * self.dt)
    }

    /// Like [`Self::step`] with the rotation limited to `cap` radians
    fn step_capped(&self, speed: f32, cap: f32) -> (f32, f32) {
        let speed = speed.max(0.0);
        let ds = speed * self.dt;
        let strength = rotation_speed_to_following_strength(speed, self.rotation_speed);
        let k = strength.sqrt();

        // Pull towards the avoidance direction, proportional to the lateral
        // offset one response length ahead
        let mut avoid_weight = if self.avoid_error.abs() > 1e-6 {
            let offset = self.avoid_error.sin() / k;
            (strength * offset.abs() * ds / self.avoid_error.abs()).min(1.0)
        } else {
            (k * ds).min(1.0)
        };
        let mut curve_weight = (2.0 * k * ds).min(1.0);
        let total = avoid_weight + curve_weight;
        if total > 1.0 {
            avoid_weight /= total;
            curve_weight /= total;
        }

        let rotation =
            avoid_weight * self.avoid_error + curve_weight * self.curve_error + self.curvature * ds;
        let cap = cap.max(0.0);
        if rotation.abs() > cap {
            // Slow down with the rotation so the arc stays consistent
            let factor = if rotation.abs() > DISTANCE_EPSILON {
                cap / rotation.abs()
            } else {
                0.0
            };
            (rotation.signum() * cap, speed * factor)
        } else {
            (rotation, speed)
        }
    }
}

/// Turn towards the avoidance direction while stopped
///
/// If the turn completes within this tick, the leftover time is spent
/// accelerating.
fn rotate_on_spot(
    settings: &MovementSettings,
    error: f32,
    speed_limit: f32,
    dt: f32,
) -> (f32, f32) {
    let max_speed = settings.max_on_spot_rotation_speed_rad().max(0.0);
    let max_turn = max_speed * dt;
    if error.abs() > max_turn {
        return (error.signum() * max_turn, 0.0);
    }
    let leftover = if max_speed > 0.0 {
        (dt - error.abs() / max_speed).max(0.0)
    } else {
        0.0
    };
    let speed = speed_limit.min(settings.accelerate(0.0, settings.slowdown_time, leftover));
    (error, speed)
}

/// Final stretch: move straight at the target and turn to the final facing
fn arrive(
    settings: &MovementSettings,
    target: &SteeringTarget,
    speed_limit: f32,
    dt: f32,
) -> SteeringCommand {
    let heading = target.heading;
    let speed = speed_limit.min(settings.accelerate(target.speed, settings.slowdown_time, dt));
    let (rotation_delta, target_rotation) = match target.facing {
        Some(facing) if facing != Vec2::ZERO => {
            let error = signed_angle(Vec2::from_angle(heading), facing);
            let cap = settings.max_rotation_speed_rad().max(0.0) * dt;
            (error.clamp(-cap, cap), heading_of(facing))
        }
        _ => (0.0, heading),
    };
    let travel_heading = if target.avoidance_direction == Vec2::ZERO {
        heading
    } else {
        heading_of(target.avoidance_direction)
    };
    SteeringCommand {
        rotation_delta,
        target_rotation,
        speed,
        travel_heading,
        mode: SteeringMode::ArrivalSlowdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const DT: f32 = 1.0 / 60.0;

    fn target(heading: f32, speed: f32, direction: Vec2) -> SteeringTarget {
        SteeringTarget {
            heading,
            speed,
            avoidance_direction: direction,
            curve_tangent: direction,
            curvature: 0.0,
            remaining_distance: 20.0,
            agent_radius: 0.5,
            facing: None,
            min_rotation_speed: 0.0,
        }
    }

    #[test]
    fn test_following_strength_round_trip() {
        let alpha = rotation_speed_to_following_strength(4.0, 10.0);
        assert!((alpha - 100.0 / 64.0).abs() < 1e-6);
        assert!((following_strength_to_rotation_speed(alpha, 4.0) - 10.0).abs() < 1e-5);
        // Speed is floored, so standing still never divides by zero
        assert!(rotation_speed_to_following_strength(0.0, 1.0).is_finite());
    }

    #[test]
    fn test_remaining_angle_includes_overshoot() {
        // Pointing backwards with no offset: theta(s) = pi (1 - k s) e^(-k s),
        // extreme at k s = 2 of -pi e^-2
        let overshoot = PI * (-2.0f32).exp();
        let remaining = remaining_angle_to_steady_state(PI, 0.0, 4.0);
        assert!((remaining - (PI + 2.0 * overshoot)).abs() < 1e-4);
    }

    #[test]
    fn test_remaining_angle_without_overshoot() {
        // Offset already cancels the heading error: plain decay
        assert_eq!(remaining_angle_to_steady_state(0.5, -1.0, 1.0), 0.5);
        assert_eq!(remaining_angle_to_steady_state(0.3, 0.0, 0.0), 0.3);
    }

    #[test]
    fn test_paused_tick_does_nothing() {
        let settings = MovementSettings::default();
        let cmd = steer(&settings, &target(1.0, 3.0, Vec2::Y), 0.0);
        assert_eq!(cmd.rotation_delta, 0.0);
        assert_eq!(cmd.speed, 0.0);
        assert_eq!(cmd.target_rotation, 1.0);
    }

    #[test]
    fn test_aligned_cruise_accelerates() {
        let settings = MovementSettings::default();
        let cmd = steer(&settings, &target(0.0, 1.0, Vec2::X), DT);
        assert_eq!(cmd.mode, SteeringMode::Cruising);
        assert!(cmd.rotation_delta.abs() < 1e-6);
        // 5 m/s reached in 0.5 s
        assert!((cmd.speed - (1.0 + 10.0 * DT)).abs() < 1e-4);
    }

    #[test]
    fn test_cruise_turns_towards_avoidance_direction() {
        let settings = MovementSettings::default();
        let direction = Vec2::from_angle(0.3);
        let cmd = steer(&settings, &target(0.0, 5.0, direction), DT);
        assert_eq!(cmd.mode, SteeringMode::Cruising);
        assert!(cmd.rotation_delta > 0.0);
        assert!(cmd.rotation_delta <= 0.3);
        assert!((cmd.target_rotation - 0.3).abs() < 1e-5);
        assert!((cmd.travel_heading - cmd.rotation_delta * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_cap_slows_down() {
        let settings = MovementSettings {
            max_rotation_speed: 10.0,
            ..Default::default()
        };
        let cmd = steer(&settings, &target(0.0, 5.0, Vec2::from_angle(0.8)), DT);
        let cap = 10f32.to_radians() * DT;
        assert!((cmd.rotation_delta - cap).abs() < 1e-6);
        assert!(cmd.speed < 5.0);
    }

    #[test]
    fn test_large_turn_rotates_in_place() {
        let settings = MovementSettings::default();
        let cmd = steer(&settings, &target(0.0, 5.0, -Vec2::X), DT);
        assert_eq!(cmd.mode, SteeringMode::RotatingInPlace);
        assert!(cmd.speed < 5.0);
    }

    #[test]
    fn test_braking_turn_respects_on_spot_cap() {
        let settings = MovementSettings {
            max_on_spot_rotation_speed: 60.0,
            ..Default::default()
        };
        let cmd = steer(&settings, &target(0.0, 5.0, -Vec2::X), DT);
        assert_eq!(cmd.mode, SteeringMode::RotatingInPlace);
        assert!(cmd.speed > 0.0);
        let cap = 60f32.to_radians() * DT;
        assert!(cmd.rotation_delta.abs() <= cap + 1e-6, "rotated {}", cmd.rotation_delta);
    }

    #[test]
    fn test_rotate_in_place_disabled() {
        let settings = MovementSettings {
            allow_rotating_on_spot: false,
            ..Default::default()
        };
        let cmd = steer(&settings, &target(0.0, 5.0, -Vec2::X), DT);
        assert_eq!(cmd.mode, SteeringMode::Cruising);
    }

    #[test]
    fn test_stopped_agent_turns_then_goes() {
        let settings = MovementSettings::default();
        // Far turn: rotate at the on-spot cap without moving
        let cmd = steer(&settings, &target(0.0, 0.0, Vec2::Y), DT);
        assert_eq!(cmd.mode, SteeringMode::RotatingInPlace);
        let cap = 720f32.to_radians() * DT;
        assert!((cmd.rotation_delta - cap).abs() < 1e-5);
        assert_eq!(cmd.speed, 0.0);

        // Small turn that fits this tick: finish it and start moving
        let cmd = steer(&settings, &target(FRAC_PI_2 - 0.1, 0.0, Vec2::Y), DT);
        assert_eq!(cmd.mode, SteeringMode::RotatingInPlace);
        assert!((cmd.rotation_delta - 0.1).abs() < 1e-5);
        assert!(cmd.speed > 0.0);
    }

    #[test]
    fn test_min_rotation_speed_turns_harder() {
        let settings = MovementSettings {
            rotation_speed: 30.0,
            ..Default::default()
        };
        let mut t = target(0.0, 5.0, Vec2::from_angle(0.2));
        let relaxed = steer(&settings, &t, DT);
        t.min_rotation_speed = 6.0;
        let urgent = steer(&settings, &t, DT);
        assert!(urgent.rotation_delta > relaxed.rotation_delta);
    }

    #[test]
    fn test_arrival_without_facing_keeps_heading() {
        let settings = MovementSettings::default();
        let mut t = target(0.4, 0.1, Vec2::Y);
        t.remaining_distance = 0.01;
        t.agent_radius = 1.0;
        let cmd = steer(&settings, &t, DT);
        assert_eq!(cmd.mode, SteeringMode::ArrivalSlowdown);
        assert_eq!(cmd.rotation_delta, 0.0);
        assert_eq!(cmd.target_rotation, 0.4);
        assert!((cmd.travel_heading - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_arrival_turns_to_facing() {
        let settings = MovementSettings::default();
        let mut t = target(0.0, 0.1, Vec2::X);
        t.remaining_distance = 0.01;
        t.agent_radius = 1.0;
        t.facing = Some(Vec2::Y);
        let cmd = steer(&settings, &t, DT);
        let cap = 720f32.to_radians() * DT;
        assert!((cmd.rotation_delta - cap).abs() < 1e-5);
        assert!((cmd.target_rotation - FRAC_PI_2).abs() < 1e-6);
    }
}
