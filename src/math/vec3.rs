//! Vector helpers for contact and friction basis construction

use glam::{Mat3, Vec3};

/// Extension operations on [`glam::Vec3`] used by the collision pipeline
/// and the solver.
pub trait Vec3Ext {
    /// Compute two vectors that are orthogonal to this vector and to each
    /// other. The zero vector yields the canonical X/Y axes.
    fn tangents(&self) -> (Vec3, Vec3);

    /// Componentwise near-equality at the given precision.
    fn almost_equals(&self, other: Vec3, precision: f32) -> bool;

    /// True when every component is within `precision` of zero.
    fn almost_zero(&self, precision: f32) -> bool;

    /// True when this vector points in the opposite direction of `other`,
    /// within `precision`.
    fn is_antiparallel_to(&self, other: Vec3, precision: f32) -> bool;

    /// The skew-symmetric matrix `K` such that `K * v == self.cross(v)`.
    fn cross_mat(&self) -> Mat3;

    /// Unit vector pointing from this point towards `target`. Falls back
    /// to `+X` when the points coincide.
    fn unit_to(&self, target: Vec3) -> Vec3;
}

impl Vec3Ext for Vec3 {
    fn tangents(&self) -> (Vec3, Vec3) {
        let norm = self.length();
        if norm > 0.0 {
            let n = *self / norm;
            // Pick a helper axis that is guaranteed non-parallel
            let rand_vec = if n.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
            let t1 = n.cross(rand_vec).normalize();
            let t2 = n.cross(t1);
            (t1, t2)
        } else {
            (Vec3::X, Vec3::Y)
        }
    }

    fn almost_equals(&self, other: Vec3, precision: f32) -> bool {
        (self.x - other.x).abs() < precision
            && (self.y - other.y).abs() < precision
            && (self.z - other.z).abs() < precision
    }

    fn almost_zero(&self, precision: f32) -> bool {
        self.x.abs() < precision && self.y.abs() < precision && self.z.abs() < precision
    }

    fn is_antiparallel_to(&self, other: Vec3, precision: f32) -> bool {
        (-*self).almost_equals(other, precision)
    }

    fn cross_mat(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(0.0, self.z, -self.y),
            Vec3::new(-self.z, 0.0, self.x),
            Vec3::new(self.y, -self.x, 0.0),
        )
    }

    fn unit_to(&self, target: Vec3) -> Vec3 {
        let diff = target - *self;
        let len = diff.length();
        if len > 0.0 {
            diff / len
        } else {
            Vec3::X
        }
    }
}
