//! Triangle mesh shape with an octree over its triangles

use glam::{Quat, Vec3};

use super::ShapeError;
use crate::collision::aabb::Aabb;
use crate::math::Transform;
use crate::utils::Octree;

const TREE_MAX_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub struct Trimesh {
    /// Unscaled vertex positions
    base_vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    /// Per-triangle unit normals (scaled space)
    pub normals: Vec<Vec3>,
    /// Unique vertex index pairs
    pub edges: Vec<[u32; 2]>,
    scale: Vec3,
    local_aabb: Aabb,
    tree: Octree,
}

impl Trimesh {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self, ShapeError> {
        for (ti, tri) in indices.iter().enumerate() {
            for &index in tri {
                if index as usize >= vertices.len() {
                    return Err(ShapeError::InvalidTriangleIndex {
                        triangle: ti,
                        index: index as usize,
                        vertex_count: vertices.len(),
                    });
                }
            }
        }

        let mut mesh = Self {
            base_vertices: vertices,
            indices,
            normals: Vec::new(),
            edges: Vec::new(),
            scale: Vec3::ONE,
            local_aabb: Aabb::default(),
            tree: Octree::new(Aabb::default(), TREE_MAX_DEPTH),
        };
        mesh.update_edges();
        mesh.rebuild();
        Ok(mesh)
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Apply a new scale and rebuild normals, bounds and the tree.
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.update_local_aabb();
        self.update_normals();
        self.update_tree();
    }

    fn update_local_aabb(&mut self) {
        let mut aabb = Aabb::inverted();
        for i in 0..self.base_vertices.len() {
            aabb.expand_to_include(self.get_vertex(i));
        }
        self.local_aabb = aabb;
    }

    fn update_normals(&mut self) {
        self.normals.clear();
        for tri in 0..self.indices.len() {
            let (a, b, c) = self.get_triangle_vertices(tri);
            let mut n = (b - a).cross(c - a);
            let len = n.length();
            if len > 0.0 {
                n /= len;
            }
            self.normals.push(n);
        }
    }

    fn update_edges(&mut self) {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        self.edges.clear();
        for tri in &self.indices {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = (a.min(b), a.max(b));
                if seen.insert(key) {
                    self.edges.push([key.0, key.1]);
                }
            }
        }
    }

    fn update_tree(&mut self) {
        self.tree = Octree::new(self.local_aabb, TREE_MAX_DEPTH);
        for tri in 0..self.indices.len() {
            let (a, b, c) = self.get_triangle_vertices(tri);
            let mut aabb = Aabb::inverted();
            aabb.expand_to_include(a);
            aabb.expand_to_include(b);
            aabb.expand_to_include(c);
            self.tree.insert(&aabb, tri as u32);
        }
        self.tree.remove_empty_nodes();
    }

    /// Scaled vertex position.
    pub fn get_vertex(&self, index: usize) -> Vec3 {
        self.base_vertices[index] * self.scale
    }

    pub fn vertex_count(&self) -> usize {
        self.base_vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn get_triangle_vertices(&self, triangle: usize) -> (Vec3, Vec3, Vec3) {
        let [ia, ib, ic] = self.indices[triangle];
        (
            self.get_vertex(ia as usize),
            self.get_vertex(ib as usize),
            self.get_vertex(ic as usize),
        )
    }

    pub fn get_normal(&self, triangle: usize) -> Vec3 {
        self.normals[triangle]
    }

    pub fn get_edge_vertices(&self, edge: usize) -> (Vec3, Vec3) {
        let [ia, ib] = self.edges[edge];
        (self.get_vertex(ia as usize), self.get_vertex(ib as usize))
    }

    /// Triangle indices whose bounds overlap a local-space AABB.
    pub fn get_triangles_in_aabb(&self, aabb: &Aabb, result: &mut Vec<u32>) {
        result.clear();
        self.tree.aabb_query(aabb, result);
    }

    /// Triangle indices near a world-space ray segment.
    pub fn get_triangles_near_ray(
        &self,
        from: Vec3,
        to: Vec3,
        transform: &Transform,
        result: &mut Vec<u32>,
    ) {
        result.clear();
        self.tree.ray_query(from, to, transform, result);
    }

    pub fn local_aabb(&self) -> &Aabb {
        &self.local_aabb
    }

    /// Signed tetrahedron sum; exact for closed meshes.
    pub fn volume(&self) -> f32 {
        let mut six_volume = 0.0;
        for tri in 0..self.indices.len() {
            let (a, b, c) = self.get_triangle_vertices(tri);
            six_volume += a.dot(b.cross(c));
        }
        (six_volume / 6.0).abs()
    }

    /// Box approximation from the local bounds.
    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        let d = self.local_aabb.upper_bound - self.local_aabb.lower_bound;
        let factor = mass / 12.0;
        Vec3::new(
            factor * (d.y * d.y + d.z * d.z),
            factor * (d.x * d.x + d.z * d.z),
            factor * (d.x * d.x + d.y * d.y),
        )
    }

    pub fn calculate_world_aabb(&self, position: Vec3, quaternion: Quat) -> Aabb {
        Aabb::from_points(&self.local_aabb.get_corners(), position, quaternion, 0.0)
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        (0..self.base_vertices.len())
            .map(|i| self.get_vertex(i).length_squared())
            .fold(0.0f32, f32::max)
            .sqrt()
    }
}
