//! Movement settings and per-agent persistent state
//!
//! Settings are configured once per agent and read every tick. They can be
//! loaded from JSON; missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::consts::{MIN_TIME_CONSTANT, WALL_DISTANCE_GROWTH};
use crate::error::{Result, SettingsError};

/// Per-agent movement tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    // === Rotation (degrees per second) ===
    /// How quickly the agent turns to follow its path
    pub rotation_speed: f32,
    /// Hard cap on rotation speed while moving
    pub max_rotation_speed: f32,
    /// Hard cap on rotation speed while rotating in place
    pub max_on_spot_rotation_speed: f32,

    // === Speed ===
    /// Desired cruise speed (m/s)
    pub speed: f32,
    /// Seconds to decelerate from cruise speed to zero (and to accelerate back)
    pub slowdown_time: f32,
    /// Seconds to stop before rotating in place
    pub slowdown_time_when_turning_on_spot: f32,

    // === Clearance ===
    /// Distance the agent tries to keep from walls (m)
    pub desired_wall_distance: f32,
    /// Radius of the arc used to turn onto the final facing direction (m)
    pub lead_in_radius_when_approaching_destination: f32,

    /// Stop and rotate in place when the required turn is too large
    pub allow_rotating_on_spot: bool,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            rotation_speed: 600.0,
            max_rotation_speed: 720.0,
            max_on_spot_rotation_speed: 720.0,

            speed: 5.0,
            slowdown_time: 0.5,
            slowdown_time_when_turning_on_spot: 0.1,

            desired_wall_distance: 0.5,
            lead_in_radius_when_approaching_destination: 1.0,

            allow_rotating_on_spot: true,
        }
    }
}

impl MovementSettings {
    /// Parse settings from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        log::debug!("Loaded movement settings: speed={} m/s", settings.speed);
        Ok(settings)
    }

    /// Serialize settings to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every numeric field is finite and non-negative
    ///
    /// `control` does not call this; validating once at load time is the
    /// caller's job.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("rotation_speed", self.rotation_speed),
            ("max_rotation_speed", self.max_rotation_speed),
            ("max_on_spot_rotation_speed", self.max_on_spot_rotation_speed),
            ("speed", self.speed),
            ("slowdown_time", self.slowdown_time),
            (
                "slowdown_time_when_turning_on_spot",
                self.slowdown_time_when_turning_on_spot,
            ),
            ("desired_wall_distance", self.desired_wall_distance),
            (
                "lead_in_radius_when_approaching_destination",
                self.lead_in_radius_when_approaching_destination,
            ),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                log::warn!("Rejecting movement setting {field} = {value}");
                return Err(SettingsError::Invalid { field, value });
            }
        }
        Ok(())
    }

    /// Scale distances and speeds for an agent scaled by `scale`
    ///
    /// Rotation speeds and times are scale independent.
    pub fn scale_by_agent_scale(&mut self, scale: f32) {
        self.speed *= scale;
        self.desired_wall_distance *= scale;
        self.lead_in_radius_when_approaching_destination *= scale;
    }

    /// Rotation speed in radians per second
    #[inline]
    pub fn rotation_speed_rad(&self) -> f32 {
        self.rotation_speed.to_radians()
    }

    /// Maximum rotation speed while moving, in radians per second
    #[inline]
    pub fn max_rotation_speed_rad(&self) -> f32 {
        self.max_rotation_speed.to_radians()
    }

    /// Maximum rotation speed while rotating in place, in radians per second
    #[inline]
    pub fn max_on_spot_rotation_speed_rad(&self) -> f32 {
        self.max_on_spot_rotation_speed.to_radians()
    }

    /// Target speed with `remaining_distance` left to travel
    ///
    /// Constant deceleration profile reaching zero exactly at the destination.
    pub fn speed_at(&self, remaining_distance: f32) -> f32 {
        if self.speed <= 0.0 {
            return 0.0;
        }
        let remaining = remaining_distance.max(0.0);
        if self.slowdown_time <= 0.0 {
            return if remaining > 0.0 { self.speed } else { 0.0 };
        }
        self.speed * (2.0 * remaining / (self.speed * self.slowdown_time)).sqrt().min(1.0)
    }

    /// Speed after accelerating from `current` for `dt` seconds
    ///
    /// Reaches cruise speed from rest in `time_to_max_speed` seconds. Not
    /// clamped; callers combine it with [`Self::speed_at`].
    pub fn accelerate(&self, current: f32, time_to_max_speed: f32, dt: f32) -> f32 {
        if time_to_max_speed > MIN_TIME_CONSTANT {
            current.max(0.0) + dt.max(0.0) / time_to_max_speed * self.speed.max(0.0)
        } else {
            self.speed.max(0.0)
        }
    }

    /// Speed after braking from `current` for `dt` seconds
    ///
    /// Stops from cruise speed in `time_to_stop` seconds.
    pub fn decelerate(&self, current: f32, time_to_stop: f32, dt: f32) -> f32 {
        if time_to_stop > MIN_TIME_CONSTANT {
            (current - dt.max(0.0) / time_to_stop * self.speed.max(0.0)).max(0.0)
        } else {
            0.0
        }
    }
}

/// State an agent carries from one tick to the next
///
/// Threaded through [`crate::control`] by value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistentState {
    /// Upper bound on the clearance the controller currently tries to keep.
    /// Grows slowly so an agent pressed against a wall works its way out
    /// instead of jumping away.
    pub max_desired_wall_distance: f32,
}

impl PersistentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State after one tick of `dt` seconds
    ///
    /// Clamps the bubble to the distance of the nearest wall, then grows it
    /// by `speed * 0.1 * dt`, never beyond the desired wall distance.
    pub fn advanced(self, settings: &MovementSettings, nearest_wall: f32, dt: f32) -> Self {
        let clamped = self.max_desired_wall_distance.max(0.0).min(nearest_wall);
        let grown = clamped + settings.speed.max(0.0) * WALL_DISTANCE_GROWTH * dt;
        Self {
            max_desired_wall_distance: grown.min(settings.desired_wall_distance.max(0.0)),
        }
    }
}
