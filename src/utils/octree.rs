//! Octree over triangle indices for mesh queries

use glam::Vec3;

use crate::collision::aabb::Aabb;
use crate::math::Transform;

const CHILDREN_PER_NODE: usize = 8;

/// One cell of the tree. Data that does not fit entirely inside a child
/// stays at this level.
#[derive(Debug, Clone)]
struct OctreeNode {
    aabb: Aabb,
    data: Vec<u32>,
    children: Vec<OctreeNode>,
}

impl OctreeNode {
    fn new(aabb: Aabb) -> Self {
        Self {
            aabb,
            data: Vec::new(),
            children: Vec::new(),
        }
    }

    fn subdivide(&mut self) {
        let l = self.aabb.lower_bound;
        let half = self.aabb.half_extents();
        self.children.reserve(CHILDREN_PER_NODE);
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    let offset = Vec3::new(i as f32, j as f32, k as f32) * half;
                    let lower = l + offset;
                    self.children.push(OctreeNode::new(Aabb::new(lower, lower + half)));
                }
            }
        }
    }

    fn insert(&mut self, aabb: &Aabb, element: u32, level: usize, max_depth: usize) -> bool {
        if !self.aabb.contains(aabb) {
            return false;
        }
        if level < max_depth {
            if self.children.is_empty() {
                self.subdivide();
            }
            for child in &mut self.children {
                if child.insert(aabb, element, level + 1, max_depth) {
                    return true;
                }
            }
        }
        self.data.push(element);
        true
    }

    fn aabb_query(&self, aabb: &Aabb, result: &mut Vec<u32>) {
        if !self.aabb.overlaps(aabb) {
            return;
        }
        result.extend_from_slice(&self.data);
        for child in &self.children {
            child.aabb_query(aabb, result);
        }
    }

    fn remove_empty_nodes(&mut self) {
        for child in &mut self.children {
            child.remove_empty_nodes();
        }
        self.children.retain(|c| !c.children.is_empty() || !c.data.is_empty());
    }
}

/// Spatial index over element indices (triangles), queried by AABB or
/// ray. Elements that straddle child boundaries are stored at the
/// deepest node that fully contains them.
#[derive(Debug, Clone)]
pub struct Octree {
    root: OctreeNode,
    max_depth: usize,
}

impl Octree {
    pub fn new(aabb: Aabb, max_depth: usize) -> Self {
        Self {
            root: OctreeNode::new(aabb),
            max_depth,
        }
    }

    pub fn aabb(&self) -> &Aabb {
        &self.root.aabb
    }

    /// Insert an element covering `aabb`. Elements outside the root box
    /// are clamped into the root.
    pub fn insert(&mut self, aabb: &Aabb, element: u32) {
        if !self.root.insert(aabb, element, 0, self.max_depth) {
            self.root.data.push(element);
        }
    }

    /// Collect every element whose node overlaps `aabb`. Results may
    /// contain false positives; the caller refines per element.
    pub fn aabb_query(&self, aabb: &Aabb, result: &mut Vec<u32>) {
        self.root.aabb_query(aabb, result);
    }

    /// Query with a world-space ray segment; the tree lives in the local
    /// frame of `transform`.
    pub fn ray_query(&self, from: Vec3, to: Vec3, transform: &Transform, result: &mut Vec<u32>) {
        let local_from = transform.point_to_local(from);
        let local_to = transform.point_to_local(to);
        let mut aabb = Aabb::inverted();
        aabb.expand_to_include(local_from);
        aabb.expand_to_include(local_to);
        self.aabb_query(&aabb, result);
    }

    /// Prune childless empty nodes after construction.
    pub fn remove_empty_nodes(&mut self) {
        self.root.remove_empty_nodes();
    }
}
