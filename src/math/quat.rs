//! Quaternion construction, decomposition and integration

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{MathError, Vec3Ext};

/// Axis application order for euler-angle conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EulerOrder {
    Xyz,
    Yxz,
    Zxy,
    Zyx,
    Yzx,
    Xzy,
}

/// Extension operations on [`glam::Quat`].
pub trait QuatExt {
    /// Rotation carrying `u` onto `v`. Anti-parallel input builds a half
    /// turn around a tangent of `u`.
    fn from_vectors(u: Vec3, v: Vec3) -> Quat;

    /// Build from intrinsic euler angles in the given order.
    fn from_euler_angles(x: f32, y: f32, z: f32, order: EulerOrder) -> Quat;

    /// Decompose into euler angles. Only [`EulerOrder::Yzx`] is
    /// implemented; other orders fail with
    /// [`MathError::UnsupportedEulerOrder`].
    fn to_euler_angles(&self, order: EulerOrder) -> Result<Vec3, MathError>;

    /// Axis and angle of this rotation.
    fn to_axis_angle_pair(&self) -> (Vec3, f32);

    /// Advance the orientation by an angular velocity over `dt`,
    /// `q += ½·dt·(ω⊗q)`, gating each axis by `angular_factor`.
    fn integrate_angular_velocity(&self, omega: Vec3, dt: f32, angular_factor: Vec3) -> Quat;

    /// Approximate normalization using a single Newton step. Good enough
    /// when the quaternion is already close to unit length. The zero
    /// quaternion maps to zero.
    fn normalize_fast(&self) -> Quat;

    /// Normalization that maps the zero quaternion to zero instead of
    /// producing NaNs.
    fn normalize_safe(&self) -> Quat;

    /// Spherical interpolation with sign adjustment; falls back to linear
    /// blending when the arc is too small to be numerically stable.
    fn slerp_to(&self, target: Quat, t: f32) -> Quat;
}

impl QuatExt for Quat {
    fn from_vectors(u: Vec3, v: Vec3) -> Quat {
        if u.is_antiparallel_to(v, 1e-6) {
            let (t1, _) = u.tangents();
            Quat::from_axis_angle(t1, std::f32::consts::PI)
        } else {
            let a = u.cross(v);
            let w = (u.length_squared() * v.length_squared()).sqrt() + u.dot(v);
            Quat::from_xyzw(a.x, a.y, a.z, w).normalize_safe()
        }
    }

    fn from_euler_angles(x: f32, y: f32, z: f32, order: EulerOrder) -> Quat {
        let c1 = (x / 2.0).cos();
        let c2 = (y / 2.0).cos();
        let c3 = (z / 2.0).cos();
        let s1 = (x / 2.0).sin();
        let s2 = (y / 2.0).sin();
        let s3 = (z / 2.0).sin();

        let (qx, qy, qz, qw) = match order {
            EulerOrder::Xyz => (
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
                c1 * c2 * c3 - s1 * s2 * s3,
            ),
            EulerOrder::Yxz => (
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
                c1 * c2 * c3 + s1 * s2 * s3,
            ),
            EulerOrder::Zxy => (
                s1 * c2 * c3 - c1 * s2 * s3,
                c1 * s2 * c3 + s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
                c1 * c2 * c3 - s1 * s2 * s3,
            ),
            EulerOrder::Zyx => (
                s1 * c2 * c3 - c1 * s2 * s3,
                c1 * s2 * c3 + s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
                c1 * c2 * c3 + s1 * s2 * s3,
            ),
            EulerOrder::Yzx => (
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 + s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
                c1 * c2 * c3 - s1 * s2 * s3,
            ),
            EulerOrder::Xzy => (
                s1 * c2 * c3 - c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
                c1 * c2 * c3 + s1 * s2 * s3,
            ),
        };
        Quat::from_xyzw(qx, qy, qz, qw)
    }

    fn to_euler_angles(&self, order: EulerOrder) -> Result<Vec3, MathError> {
        if order != EulerOrder::Yzx {
            return Err(MathError::UnsupportedEulerOrder(order));
        }
        let (x, y, z, w) = (self.x, self.y, self.z, self.w);
        let test = x * y + z * w;
        let (heading, attitude, bank);
        if test > 0.499 {
            // Singularity at north pole
            heading = 2.0 * x.atan2(w);
            attitude = std::f32::consts::FRAC_PI_2;
            bank = 0.0;
        } else if test < -0.499 {
            // Singularity at south pole
            heading = -2.0 * x.atan2(w);
            attitude = -std::f32::consts::FRAC_PI_2;
            bank = 0.0;
        } else {
            let sqx = x * x;
            let sqy = y * y;
            let sqz = z * z;
            heading = (2.0 * y * w - 2.0 * x * z).atan2(1.0 - 2.0 * sqy - 2.0 * sqz);
            attitude = (2.0 * test).asin();
            bank = (2.0 * x * w - 2.0 * y * z).atan2(1.0 - 2.0 * sqx - 2.0 * sqz);
        }
        Ok(Vec3::new(bank, heading, attitude))
    }

    fn to_axis_angle_pair(&self) -> (Vec3, f32) {
        let q = self.normalize_safe();
        let angle = 2.0 * q.w.clamp(-1.0, 1.0).acos();
        let s = (1.0 - q.w * q.w).sqrt();
        if s < 0.001 {
            // Close to identity, axis direction does not matter
            (Vec3::new(q.x, q.y, q.z), angle)
        } else {
            (Vec3::new(q.x / s, q.y / s, q.z / s), angle)
        }
    }

    fn integrate_angular_velocity(&self, omega: Vec3, dt: f32, angular_factor: Vec3) -> Quat {
        let ax = omega.x * angular_factor.x;
        let ay = omega.y * angular_factor.y;
        let az = omega.z * angular_factor.z;
        let (bx, by, bz, bw) = (self.x, self.y, self.z, self.w);
        let half_dt = dt * 0.5;
        Quat::from_xyzw(
            bx + half_dt * (ax * bw + ay * bz - az * by),
            by + half_dt * (ay * bw + az * bx - ax * bz),
            bz + half_dt * (az * bw + ax * by - ay * bx),
            bw + half_dt * (-ax * bx - ay * by - az * bz),
        )
    }

    fn normalize_fast(&self) -> Quat {
        let len_sq = self.length_squared();
        if len_sq == 0.0 {
            return Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);
        }
        let f = (3.0 - len_sq) / 2.0;
        Quat::from_xyzw(self.x * f, self.y * f, self.z * f, self.w * f)
    }

    fn normalize_safe(&self) -> Quat {
        let len = self.length();
        if len == 0.0 {
            Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)
        } else {
            let inv = 1.0 / len;
            Quat::from_xyzw(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        }
    }

    fn slerp_to(&self, target: Quat, t: f32) -> Quat {
        let (ax, ay, az, aw) = (self.x, self.y, self.z, self.w);
        let (mut bx, mut by, mut bz, mut bw) = (target.x, target.y, target.z, target.w);

        let mut cos_half_theta = aw * bw + ax * bx + ay * by + az * bz;
        if cos_half_theta < 0.0 {
            // Take the short way around
            bx = -bx;
            by = -by;
            bz = -bz;
            bw = -bw;
            cos_half_theta = -cos_half_theta;
        }
        if 1.0 - cos_half_theta < 1e-6 {
            // Arc too small for the sine ratio, blend linearly
            return Quat::from_xyzw(
                ax + t * (bx - ax),
                ay + t * (by - ay),
                az + t * (bz - az),
                aw + t * (bw - aw),
            );
        }
        let half_theta = cos_half_theta.acos();
        let sin_half_theta = (1.0 - cos_half_theta * cos_half_theta).sqrt();
        let ratio_a = ((1.0 - t) * half_theta).sin() / sin_half_theta;
        let ratio_b = (t * half_theta).sin() / sin_half_theta;
        Quat::from_xyzw(
            ax * ratio_a + bx * ratio_b,
            ay * ratio_a + by * ratio_b,
            az * ratio_a + bz * ratio_b,
            aw * ratio_a + bw * ratio_b,
        )
    }
}
