//! Axis-aligned bounding boxes for the broadphase and spatial queries

use glam::{Quat, Vec3};

use crate::math::Transform;

/// Axis-aligned bounding box described by its two extreme corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub lower_bound: Vec3,
    pub upper_bound: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            lower_bound: Vec3::ZERO,
            upper_bound: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(lower_bound: Vec3, upper_bound: Vec3) -> Self {
        Self { lower_bound, upper_bound }
    }

    /// An inverted box that any `extend` call will snap onto.
    pub fn inverted() -> Self {
        Self {
            lower_bound: Vec3::splat(f32::MAX),
            upper_bound: Vec3::splat(-f32::MAX),
        }
    }

    /// Tight box around a transformed point cloud, padded by `skin_size`.
    pub fn from_points(points: &[Vec3], position: Vec3, quaternion: Quat, skin_size: f32) -> Self {
        let mut aabb = Self::inverted();
        for &p in points {
            aabb.expand_to_include(quaternion * p + position);
        }
        if skin_size != 0.0 {
            aabb.lower_bound -= Vec3::splat(skin_size);
            aabb.upper_bound += Vec3::splat(skin_size);
        }
        aabb
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            lower_bound: center - half_extents,
            upper_bound: center + half_extents,
        }
    }

    pub fn expand_to_include(&mut self, point: Vec3) {
        self.lower_bound = self.lower_bound.min(point);
        self.upper_bound = self.upper_bound.max(point);
    }

    /// Grow to cover `other` as well.
    pub fn extend(&mut self, other: &Aabb) {
        self.lower_bound = self.lower_bound.min(other.lower_bound);
        self.upper_bound = self.upper_bound.max(other.upper_bound);
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.lower_bound.x <= other.upper_bound.x
            && self.upper_bound.x >= other.lower_bound.x
            && self.lower_bound.y <= other.upper_bound.y
            && self.upper_bound.y >= other.lower_bound.y
            && self.lower_bound.z <= other.upper_bound.z
            && self.upper_bound.z >= other.lower_bound.z
    }

    /// True when `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower_bound.x <= other.lower_bound.x
            && self.upper_bound.x >= other.upper_bound.x
            && self.lower_bound.y <= other.lower_bound.y
            && self.upper_bound.y >= other.upper_bound.y
            && self.lower_bound.z <= other.lower_bound.z
            && self.upper_bound.z >= other.upper_bound.z
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.lower_bound.x <= point.x
            && point.x <= self.upper_bound.x
            && self.lower_bound.y <= point.y
            && point.y <= self.upper_bound.y
            && self.lower_bound.z <= point.z
            && point.z <= self.upper_bound.z
    }

    pub fn center(&self) -> Vec3 {
        (self.lower_bound + self.upper_bound) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.upper_bound - self.lower_bound) * 0.5
    }

    pub fn volume(&self) -> f32 {
        let d = self.upper_bound - self.lower_bound;
        d.x * d.y * d.z
    }

    /// The eight corners, lower corner first.
    pub fn get_corners(&self) -> [Vec3; 8] {
        let l = self.lower_bound;
        let u = self.upper_bound;
        [
            Vec3::new(l.x, l.y, l.z),
            Vec3::new(u.x, l.y, l.z),
            Vec3::new(u.x, u.y, l.z),
            Vec3::new(l.x, u.y, l.z),
            Vec3::new(l.x, l.y, u.z),
            Vec3::new(u.x, l.y, u.z),
            Vec3::new(u.x, u.y, u.z),
            Vec3::new(l.x, u.y, u.z),
        ]
    }

    /// Express this box in the local frame of `transform`. The result is
    /// axis aligned in the target frame, so it grows under rotation.
    pub fn to_local_frame(&self, transform: &Transform) -> Aabb {
        let mut result = Aabb::inverted();
        for corner in self.get_corners() {
            result.expand_to_include(transform.point_to_local(corner));
        }
        result
    }

    /// Express this box in the world frame of `transform`.
    pub fn to_world_frame(&self, transform: &Transform) -> Aabb {
        let mut result = Aabb::inverted();
        for corner in self.get_corners() {
            result.expand_to_include(transform.point_to_world(corner));
        }
        result
    }

    /// Slab test against a ray segment described by its origin and
    /// (non-zero) direction.
    pub fn overlaps_ray(&self, from: Vec3, direction: Vec3) -> bool {
        let dir_fraction = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);

        let t1 = (self.lower_bound - from) * dir_fraction;
        let t2 = (self.upper_bound - from) * dir_fraction;

        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let enter = t_min.x.max(t_min.y).max(t_min.z);
        let exit = t_max.x.min(t_max.y).min(t_max.z);

        // Box behind the ray, or no slab overlap
        !(exit < 0.0 || enter > exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlaps() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_contains() {
        let outer = Aabb::new(Vec3::splat(-2.0), Vec3::splat(2.0));
        let inner = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_from_points_with_rotation() {
        let points = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)];
        let q = Quat::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_2);
        let aabb = Aabb::from_points(&points, Vec3::ZERO, q, 0.0);
        assert!((aabb.upper_bound.y - 1.0).abs() < 1e-5);
        assert!((aabb.lower_bound.y + 1.0).abs() < 1e-5);
        assert!(aabb.upper_bound.x.abs() < 1e-5);
    }

    #[test]
    fn test_overlaps_ray() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(aabb.overlaps_ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::X));
        assert!(!aabb.overlaps_ray(Vec3::new(-5.0, 3.0, 0.0), Vec3::X));
        // Pointing away
        assert!(!aabb.overlaps_ray(Vec3::new(-5.0, 0.0, 0.0), -Vec3::X));
    }

    #[test]
    fn test_corners_distinct() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let corners = aabb.get_corners();
        for i in 0..8 {
            for j in (i + 1)..8 {
                assert!((corners[i] - corners[j]).length() > 1e-5);
            }
        }
    }
}
