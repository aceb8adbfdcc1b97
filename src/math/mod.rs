//! Math extensions on top of glam
//!
//! The simulation uses `glam` types (`Vec3`, `Mat3`, `Quat`) everywhere.
//! This module adds the operations the solver and narrowphase need that
//! glam does not ship: orthonormal tangent construction, fallible
//! Gauss-elimination solves, quaternion integration and euler conversion,
//! rigid transforms and constraint jacobian rows.

pub mod jacobian;
pub mod mat3;
pub mod quat;
pub mod transform;
pub mod vec3;

pub use jacobian::JacobianElement;
pub use mat3::Mat3Ext;
pub use quat::{EulerOrder, QuatExt};
pub use transform::Transform;
pub use vec3::Vec3Ext;

/// Errors produced by the numeric primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("matrix is singular, no non-zero pivot found")]
    SingularMatrix,

    #[error("euler order {0:?} is not supported for quaternion decomposition")]
    UnsupportedEulerOrder(EulerOrder),
}
