//! Deterministic 3D rigid-body physics core
//!
//! This crate steps a population of rigid bodies through time under
//! forces, gravity and constraints: broadphase pair generation,
//! per-shape-pair narrowphase contacts, a SPOOK-parameterized projected
//! Gauss-Seidel solver, raycasting and collision/trigger event
//! reporting. Everything runs single-threaded on the caller's thread
//! with fixed-timestep semantics, so identical inputs give identical
//! results.

pub mod body;
pub mod collision;
pub mod constraints;
pub mod equations;
pub mod material;
pub mod math;
pub mod shapes;
pub mod solver;
pub mod utils;
pub mod world;

mod ids;

// Re-export commonly used types
pub mod prelude {
    // Math types
    pub use glam::{Mat3, Quat, Vec3};

    pub use crate::math::{
        EulerOrder, JacobianElement, Mat3Ext, MathError, QuatExt, Transform, Vec3Ext,
    };

    // Bodies and shapes
    pub use crate::body::{Body, BodyOptions, BodyType, SleepState};
    pub use crate::material::{ContactMaterial, Material};
    pub use crate::shapes::{Shape, ShapeError, ShapeKind, ShapeType};

    // Collision pipeline
    pub use crate::collision::{
        Aabb, Broadphase, NaiveBroadphase, Narrowphase, Ray, RayMode, RayOptions, RaycastResult,
    };

    // Solver and constraints
    pub use crate::constraints::{Constraint, ConstraintKind};
    pub use crate::equations::{Equation, EquationKind};
    pub use crate::solver::{GsSolver, Solver};

    // World
    pub use crate::world::{ContactInfo, World, WorldEvent, WorldOptions};
}
