//! Rigid transform between body-local and world frames

use glam::{Quat, Vec3};

/// Position plus orientation of a rigid frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub quaternion: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, quaternion: Quat) -> Self {
        Self { position, quaternion }
    }

    /// World point expressed in this frame.
    pub fn point_to_local(&self, world_point: Vec3) -> Vec3 {
        Self::point_to_local_frame(self.position, self.quaternion, world_point)
    }

    /// Local point expressed in world coordinates.
    pub fn point_to_world(&self, local_point: Vec3) -> Vec3 {
        Self::point_to_world_frame(self.position, self.quaternion, local_point)
    }

    pub fn vector_to_local(&self, world_vector: Vec3) -> Vec3 {
        Self::vector_to_local_frame(self.quaternion, world_vector)
    }

    pub fn vector_to_world(&self, local_vector: Vec3) -> Vec3 {
        Self::vector_to_world_frame(self.quaternion, local_vector)
    }

    pub fn point_to_local_frame(position: Vec3, quaternion: Quat, world_point: Vec3) -> Vec3 {
        quaternion.conjugate() * (world_point - position)
    }

    pub fn point_to_world_frame(position: Vec3, quaternion: Quat, local_point: Vec3) -> Vec3 {
        quaternion * local_point + position
    }

    pub fn vector_to_local_frame(quaternion: Quat, world_vector: Vec3) -> Vec3 {
        quaternion.conjugate() * world_vector
    }

    pub fn vector_to_world_frame(quaternion: Quat, local_vector: Vec3) -> Vec3 {
        quaternion * local_vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_point_round_trip() {
        let t = Transform::new(
            Vec3::new(1.0, -2.0, 3.0),
            Quat::from_axis_angle(Vec3::new(0.2, 1.0, -0.4).normalize(), 0.9),
        );
        let p = Vec3::new(4.0, 5.0, -6.0);
        let round = t.point_to_world(t.point_to_local(p));
        assert_abs_diff_eq!((round - p).length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_vector_ignores_translation() {
        let t = Transform::new(Vec3::new(100.0, 0.0, 0.0), Quat::from_axis_angle(Vec3::Z, 0.5));
        let v = Vec3::Y;
        let w = t.vector_to_world(v);
        assert_abs_diff_eq!(w.length(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!((t.vector_to_local(w) - v).length(), 0.0, epsilon = 1e-6);
    }
}
