//! Collision shape variants
//!
//! Shapes are a tagged variant: common bookkeeping (id, filters, material,
//! trigger flag) lives on [`Shape`], geometry lives in the [`ShapeKind`]
//! variants. Every variant answers the same capability set: volume, local
//! inertia, world AABB and bounding sphere radius.

pub mod convex;
pub mod cuboid;
pub mod heightfield;
pub mod plane;
pub mod sphere;
pub mod trimesh;

pub use convex::ConvexPolyhedron;
pub use cuboid::Cuboid;
pub use heightfield::Heightfield;
pub use plane::Plane;
pub use sphere::Sphere;
pub use trimesh::Trimesh;

use glam::{Quat, Vec3};

use crate::collision::aabb::Aabb;
use crate::ids;
use crate::material::Material;

/// Errors surfaced at shape construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("sphere radius must be non-negative, got {0}")]
    InvalidRadius(f32),

    #[error("face {face} references vertex {index} but only {vertex_count} vertices exist")]
    FaceVertexOutOfBounds {
        face: usize,
        index: usize,
        vertex_count: usize,
    },

    #[error("face {face} needs at least 3 vertices, got {len}")]
    FaceTooSmall { face: usize, len: usize },

    #[error("heightfield needs at least a 2x2 grid of samples")]
    EmptyHeightfield,

    #[error("heightfield rows must all have the same length")]
    RaggedHeightfield,

    #[error("triangle {triangle} references vertex {index} but only {vertex_count} vertices exist")]
    InvalidTriangleIndex {
        triangle: usize,
        index: usize,
        vertex_count: usize,
    },
}

/// Public shape type codes. The narrowphase dispatch table is keyed on
/// the bitwise OR of two codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum ShapeType {
    Sphere = 1,
    Plane = 2,
    Box = 4,
    Compound = 8,
    Convex = 16,
    Heightfield = 32,
    Particle = 64,
    Cylinder = 128,
    Trimesh = 256,
}

impl ShapeType {
    pub fn bit(self) -> u16 {
        self as u16
    }
}

/// Shape geometry variants.
#[derive(Debug, Clone)]
pub enum ShapeKind {
    Sphere(Sphere),
    Plane(Plane),
    Box(Cuboid),
    Convex(ConvexPolyhedron),
    Heightfield(Heightfield),
    Particle,
    Trimesh(Trimesh),
}

impl ShapeKind {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeKind::Sphere(_) => ShapeType::Sphere,
            ShapeKind::Plane(_) => ShapeType::Plane,
            ShapeKind::Box(_) => ShapeType::Box,
            ShapeKind::Convex(_) => ShapeType::Convex,
            ShapeKind::Heightfield(_) => ShapeType::Heightfield,
            ShapeKind::Particle => ShapeType::Particle,
            ShapeKind::Trimesh(_) => ShapeType::Trimesh,
        }
    }
}

/// A collision shape attached to a body at some offset and orientation.
#[derive(Debug, Clone)]
pub struct Shape {
    /// Unique shape id, assigned at construction
    pub id: u32,
    pub kind: ShapeKind,
    /// Radius of the sphere centered on the shape origin that encloses it
    pub bounding_sphere_radius: f32,
    /// When false the shape only reports overlaps, it never responds
    pub collision_response: bool,
    pub collision_filter_group: i32,
    pub collision_filter_mask: i32,
    pub material: Option<Material>,
    /// Trigger shapes fire enter/exit events instead of contacts
    pub is_trigger: bool,
    /// Owning body, set by `Body::add_shape`
    pub(crate) body_id: Option<u32>,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        let mut shape = Self {
            id: ids::next_shape_id(),
            kind,
            bounding_sphere_radius: 0.0,
            collision_response: true,
            collision_filter_group: 1,
            collision_filter_mask: -1,
            material: None,
            is_trigger: false,
            body_id: None,
        };
        shape.update_bounding_sphere_radius();
        shape
    }

    pub fn sphere(radius: f32) -> Result<Self, ShapeError> {
        Ok(Self::new(ShapeKind::Sphere(Sphere::new(radius)?)))
    }

    pub fn plane() -> Self {
        Self::new(ShapeKind::Plane(Plane::new()))
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ShapeKind::Box(Cuboid::new(half_extents)))
    }

    pub fn convex(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Result<Self, ShapeError> {
        Ok(Self::new(ShapeKind::Convex(ConvexPolyhedron::new(vertices, faces)?)))
    }

    pub fn heightfield(data: Vec<Vec<f32>>, element_size: f32) -> Result<Self, ShapeError> {
        Ok(Self::new(ShapeKind::Heightfield(Heightfield::new(data, element_size)?)))
    }

    pub fn trimesh(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self, ShapeError> {
        Ok(Self::new(ShapeKind::Trimesh(Trimesh::new(vertices, indices)?)))
    }

    pub fn particle() -> Self {
        Self::new(ShapeKind::Particle)
    }

    /// Mark this shape as a trigger.
    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    pub fn shape_type(&self) -> ShapeType {
        self.kind.shape_type()
    }

    /// Id of the body this shape is attached to, if any.
    pub fn body_id(&self) -> Option<u32> {
        self.body_id
    }

    pub fn volume(&self) -> f32 {
        match &self.kind {
            ShapeKind::Sphere(s) => s.volume(),
            ShapeKind::Plane(p) => p.volume(),
            ShapeKind::Box(b) => b.volume(),
            ShapeKind::Convex(c) => c.volume(),
            ShapeKind::Heightfield(h) => h.volume(),
            ShapeKind::Particle => 0.0,
            ShapeKind::Trimesh(t) => t.volume(),
        }
    }

    /// Principal-axis inertia diagonal for the given mass.
    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        match &self.kind {
            ShapeKind::Sphere(s) => s.calculate_local_inertia(mass),
            ShapeKind::Plane(p) => p.calculate_local_inertia(mass),
            ShapeKind::Box(b) => b.calculate_local_inertia(mass),
            ShapeKind::Convex(c) => c.calculate_local_inertia(mass),
            ShapeKind::Heightfield(h) => h.calculate_local_inertia(mass),
            ShapeKind::Particle => Vec3::ZERO,
            ShapeKind::Trimesh(t) => t.calculate_local_inertia(mass),
        }
    }

    pub fn calculate_world_aabb(&self, position: Vec3, quaternion: Quat) -> Aabb {
        match &self.kind {
            ShapeKind::Sphere(s) => s.calculate_world_aabb(position, quaternion),
            ShapeKind::Plane(p) => p.calculate_world_aabb(position, quaternion),
            ShapeKind::Box(b) => b.calculate_world_aabb(position, quaternion),
            ShapeKind::Convex(c) => c.calculate_world_aabb(position, quaternion),
            ShapeKind::Heightfield(h) => h.calculate_world_aabb(position, quaternion),
            ShapeKind::Particle => Aabb::new(position, position),
            ShapeKind::Trimesh(t) => t.calculate_world_aabb(position, quaternion),
        }
    }

    pub fn update_bounding_sphere_radius(&mut self) {
        self.bounding_sphere_radius = match &self.kind {
            ShapeKind::Sphere(s) => s.bounding_sphere_radius(),
            ShapeKind::Plane(p) => p.bounding_sphere_radius(),
            ShapeKind::Box(b) => b.bounding_sphere_radius(),
            ShapeKind::Convex(c) => c.bounding_sphere_radius(),
            ShapeKind::Heightfield(h) => h.bounding_sphere_radius(),
            ShapeKind::Particle => 0.0,
            ShapeKind::Trimesh(t) => t.bounding_sphere_radius(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_ids_monotonic() {
        let a = Shape::sphere(1.0).unwrap();
        let b = Shape::plane();
        assert!(a.id < b.id);
    }

    #[test]
    fn test_negative_radius_rejected() {
        assert!(matches!(Shape::sphere(-1.0), Err(ShapeError::InvalidRadius(_))));
    }

    #[test]
    fn test_type_bits() {
        assert_eq!(ShapeType::Sphere.bit() | ShapeType::Plane.bit(), 3);
        assert_eq!(ShapeType::Trimesh.bit(), 256);
    }
}
