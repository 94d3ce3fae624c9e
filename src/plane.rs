//! Movement plane
//!
//! All steering geometry happens in 2D. The plane maps world positions onto
//! that 2D frame and maps planar results back out.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// A 2D frame embedded in the 3D world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementPlane {
    /// World position of the planar origin
    pub origin: Vec3,
    /// World direction of the planar +x axis (unit length)
    pub right: Vec3,
    /// World direction of the planar +y axis (unit length, orthogonal to `right`)
    pub forward: Vec3,
}

impl Default for MovementPlane {
    fn default() -> Self {
        Self::XY
    }
}

impl MovementPlane {
    /// The world XY plane (z is discarded)
    pub const XY: Self = Self {
        origin: Vec3::ZERO,
        right: Vec3::X,
        forward: Vec3::Y,
    };

    /// The world XZ plane, for y-up worlds (y is discarded)
    pub const XZ: Self = Self {
        origin: Vec3::ZERO,
        right: Vec3::X,
        forward: Vec3::Z,
    };

    /// Build a plane from possibly non-orthonormal axes
    ///
    /// `forward` is made orthogonal to `right`. Degenerate axes fall back to
    /// the XY plane.
    pub fn new(origin: Vec3, right: Vec3, forward: Vec3) -> Self {
        let right = right.normalize_or_zero();
        let forward = (forward - right * forward.dot(right)).normalize_or_zero();
        if right == Vec3::ZERO || forward == Vec3::ZERO {
            return Self {
                origin,
                ..Self::XY
            };
        }
        Self {
            origin,
            right,
            forward,
        }
    }

    /// Plane normal (right × forward)
    pub fn normal(&self) -> Vec3 {
        self.right.cross(self.forward)
    }

    /// Project a world position onto the plane
    #[inline]
    pub fn to_plane(&self, point: Vec3) -> Vec2 {
        self.direction_to_plane(point - self.origin)
    }

    /// Project a world direction onto the plane (not normalized)
    #[inline]
    pub fn direction_to_plane(&self, dir: Vec3) -> Vec2 {
        Vec2::new(dir.dot(self.right), dir.dot(self.forward))
    }

    /// Lift a planar position back into the world
    #[inline]
    pub fn to_world(&self, point: Vec2) -> Vec3 {
        self.origin + self.direction_to_world(point)
    }

    /// Lift a planar direction back into the world
    #[inline]
    pub fn direction_to_world(&self, dir: Vec2) -> Vec3 {
        self.right * dir.x + self.forward * dir.y
    }
}
