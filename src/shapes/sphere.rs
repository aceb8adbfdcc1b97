//! Sphere shape

use glam::{Quat, Vec3};

use super::ShapeError;
use crate::collision::aabb::Aabb;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub radius: f32,
}

impl Sphere {
    pub fn new(radius: f32) -> Result<Self, ShapeError> {
        if radius < 0.0 {
            return Err(ShapeError::InvalidRadius(radius));
        }
        Ok(Self { radius })
    }

    pub fn volume(&self) -> f32 {
        4.0 / 3.0 * std::f32::consts::PI * self.radius.powi(3)
    }

    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        let i = 2.0 * mass * self.radius * self.radius / 5.0;
        Vec3::splat(i)
    }

    pub fn calculate_world_aabb(&self, position: Vec3, _quaternion: Quat) -> Aabb {
        // Rotation invariant
        Aabb::from_center_half_extents(position, Vec3::splat(self.radius))
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        self.radius
    }
}
