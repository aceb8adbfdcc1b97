//! Infinite plane shape
//!
//! The plane surface is z = 0 in local space, facing +Z. World
//! orientation comes entirely from the owning body's quaternion.

use glam::{Quat, Vec3};

use crate::collision::aabb::Aabb;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Plane;

impl Plane {
    pub fn new() -> Self {
        Self
    }

    /// Local-space normal, +Z by convention.
    pub fn normal(&self) -> Vec3 {
        Vec3::Z
    }

    pub fn world_normal(&self, quaternion: Quat) -> Vec3 {
        quaternion * Vec3::Z
    }

    pub fn volume(&self) -> f32 {
        // Half space
        f32::MAX
    }

    pub fn calculate_local_inertia(&self, _mass: f32) -> Vec3 {
        Vec3::ZERO
    }

    pub fn calculate_world_aabb(&self, position: Vec3, quaternion: Quat) -> Aabb {
        // The plane AABB is infinite except along an axis-aligned normal
        let normal = self.world_normal(quaternion);
        let mut lower = Vec3::splat(-f32::MAX);
        let mut upper = Vec3::splat(f32::MAX);

        if normal.x == 1.0 {
            upper.x = position.x;
        } else if normal.x == -1.0 {
            lower.x = position.x;
        }
        if normal.y == 1.0 {
            upper.y = position.y;
        } else if normal.y == -1.0 {
            lower.y = position.y;
        }
        if normal.z == 1.0 {
            upper.z = position.z;
        } else if normal.z == -1.0 {
            lower.z = position.z;
        }
        Aabb::new(lower, upper)
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        f32::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_aabb_clamps_along_normal() {
        let p = Plane::new();
        let aabb = p.calculate_world_aabb(Vec3::new(0.0, 0.0, 3.0), Quat::IDENTITY);
        assert_eq!(aabb.upper_bound.z, 3.0);
        assert_eq!(aabb.lower_bound.z, -f32::MAX);
        assert_eq!(aabb.upper_bound.x, f32::MAX);
    }
}
