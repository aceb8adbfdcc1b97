//! Simulation events
//!
//! Events are collected into a per-world queue during each step and
//! drained by the caller. Queue order is deterministic: body lifecycle
//! first, then collide/contact/trigger transitions, then sleep state
//! changes.

use glam::Vec3;

/// Snapshot of a contact used in [`WorldEvent::Collide`].
#[derive(Debug, Clone)]
pub struct ContactInfo {
    pub body_a: u32,
    pub body_b: u32,
    pub shape_a: u32,
    pub shape_b: u32,
    /// Contact normal, pointing out of `body_a`
    pub normal: Vec3,
    /// Contact offset from `body_a`'s center of mass, world oriented
    pub ri: Vec3,
    /// Contact offset from `body_b`'s center of mass
    pub rj: Vec3,
    /// Relative approach speed along the normal at impact time
    pub impact_velocity: f32,
}

/// Everything the world reports to its caller.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    AddBody { body: u32 },
    RemoveBody { body: u32 },
    /// A pair started touching; emitted once per body of the pair
    Collide {
        body: u32,
        other: u32,
        contact: ContactInfo,
    },
    BeginContact { body_a: u32, body_b: u32 },
    EndContact { body_a: u32, body_b: u32 },
    BeginTrigger {
        body_a: u32,
        body_b: u32,
        shape_a: u32,
        shape_b: u32,
    },
    EndTrigger {
        body_a: u32,
        body_b: u32,
        shape_a: u32,
        shape_b: u32,
    },
    Wakeup { body: u32 },
    Sleepy { body: u32 },
    Sleep { body: u32 },
}
