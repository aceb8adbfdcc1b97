//! Surface materials and per-pair contact parameters

use serde::{Deserialize, Serialize};

use crate::ids;

/// Friction and restitution properties shared by shapes and bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Unique material id, assigned at construction
    pub id: u32,
    pub name: String,
    /// Friction coefficient; negative means "defer to the contact pair"
    pub friction: f32,
    /// Restitution coefficient; negative means "defer to the contact pair"
    pub restitution: f32,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ids::next_material_id(),
            name: name.into(),
            friction: -1.0,
            restitution: -1.0,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

/// How two specific materials interact when their shapes touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMaterial {
    /// Ids of the participating materials
    pub materials: (u32, u32),
    pub friction: f32,
    pub restitution: f32,
    /// Stiffness of the normal contact equation
    pub contact_equation_stiffness: f32,
    /// Relaxation time of the normal contact equation
    pub contact_equation_relaxation: f32,
    pub friction_equation_stiffness: f32,
    pub friction_equation_relaxation: f32,
}

impl ContactMaterial {
    pub fn new(a: &Material, b: &Material) -> Self {
        Self {
            materials: (a.id, b.id),
            ..Self::default_pair()
        }
    }

    /// The parameter set used when no registered pair matches.
    pub fn default_pair() -> Self {
        Self {
            materials: (u32::MAX, u32::MAX),
            friction: 0.3,
            restitution: 0.3,
            contact_equation_stiffness: 1e7,
            contact_equation_relaxation: 3.0,
            friction_equation_stiffness: 1e7,
            friction_equation_relaxation: 3.0,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }
}
