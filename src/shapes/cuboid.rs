//! Box shape backed by a cached convex representation

use glam::{Quat, Vec3};

use super::convex::{box_hull, ConvexPolyhedron};
use crate::collision::aabb::Aabb;

/// Axis-aligned box described by its half extents. All convex-family
/// narrowphase tests run against the cached hull representation.
#[derive(Debug, Clone)]
pub struct Cuboid {
    pub half_extents: Vec3,
    /// 8 vertices, 6 quad faces, 3 unique axes
    pub convex: ConvexPolyhedron,
}

impl Cuboid {
    pub fn new(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            convex: box_hull(half_extents),
        }
    }

    pub fn volume(&self) -> f32 {
        8.0 * self.half_extents.x * self.half_extents.y * self.half_extents.z
    }

    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        let x = 2.0 * self.half_extents.x;
        let y = 2.0 * self.half_extents.y;
        let z = 2.0 * self.half_extents.z;
        let factor = mass / 12.0;
        Vec3::new(
            factor * (y * y + z * z),
            factor * (x * x + z * z),
            factor * (x * x + y * y),
        )
    }

    /// The eight transformed corners.
    pub fn world_corners(&self, position: Vec3, quaternion: Quat) -> [Vec3; 8] {
        let h = self.half_extents;
        let mut corners = [Vec3::ZERO; 8];
        let signs = [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
        ];
        for (corner, sign) in corners.iter_mut().zip(signs) {
            *corner = quaternion * (h * sign) + position;
        }
        corners
    }

    pub fn calculate_world_aabb(&self, position: Vec3, quaternion: Quat) -> Aabb {
        let mut aabb = Aabb::inverted();
        for corner in self.world_corners(position, quaternion) {
            aabb.expand_to_include(corner);
        }
        aabb
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        self.half_extents.length()
    }
}
