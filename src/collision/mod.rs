//! Collision detection subsystem: bounds, pair generation, contact
//! generation and raycasts

pub mod aabb;
pub mod broad_phase;
pub mod narrow_phase;
pub mod ray;

pub use aabb::Aabb;
pub use broad_phase::{Broadphase, NaiveBroadphase};
pub use narrow_phase::Narrowphase;
pub use ray::{Ray, RayMode, RayOptions, RaycastResult};
