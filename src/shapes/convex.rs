//! Convex polyhedron with separating-axis tests and polygon clipping
//!
//! Faces are index polygons with counter-clockwise winding seen from
//! outside. Face normals are computed at construction and re-oriented
//! away from the hull centroid if the winding disagrees.

use glam::{Quat, Vec3};
use tracing::debug;

use super::ShapeError;
use crate::collision::aabb::Aabb;
use crate::math::Vec3Ext;

/// A point produced by clipping one hull against another.
#[derive(Debug, Clone, Copy)]
pub struct ClipPoint {
    /// World-space contact point on the clipped hull
    pub point: Vec3,
    /// World-space normal of the reference face
    pub normal: Vec3,
    /// Signed distance to the reference plane; negative means penetration
    pub depth: f32,
}

#[derive(Debug, Clone)]
pub struct ConvexPolyhedron {
    pub vertices: Vec<Vec3>,
    /// Index polygons, CCW from outside
    pub faces: Vec<Vec<usize>>,
    pub face_normals: Vec<Vec3>,
    /// Deduplicated edge directions for SAT cross-product axes
    pub unique_edges: Vec<Vec3>,
    /// When set, face-normal SAT candidates collapse to this list
    /// (boxes supply their three principal axes)
    pub unique_axes: Option<Vec<Vec3>>,
}

impl ConvexPolyhedron {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Result<Self, ShapeError> {
        for (fi, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(ShapeError::FaceTooSmall { face: fi, len: face.len() });
            }
            for &index in face {
                if index >= vertices.len() {
                    return Err(ShapeError::FaceVertexOutOfBounds {
                        face: fi,
                        index,
                        vertex_count: vertices.len(),
                    });
                }
            }
        }

        let mut hull = Self {
            vertices,
            faces,
            face_normals: Vec::new(),
            unique_edges: Vec::new(),
            unique_axes: None,
        };
        hull.compute_normals();
        hull.compute_edges();
        Ok(hull)
    }

    pub fn with_unique_axes(mut self, axes: Vec<Vec3>) -> Self {
        self.unique_axes = Some(axes);
        self
    }

    fn compute_normals(&mut self) {
        let centroid = self.get_average_point_local();
        self.face_normals.clear();
        for face in &self.faces {
            let va = self.vertices[face[0]];
            let vb = self.vertices[face[1]];
            let vc = self.vertices[face[2]];
            let mut n = (vb - va).cross(vc - va);
            let len = n.length();
            if len > 0.0 {
                n /= len;
            }
            if n.dot(va - centroid) < 0.0 {
                debug!("convex face winding disagrees with outward normal, flipping");
                n = -n;
            }
            self.face_normals.push(n);
        }
    }

    fn compute_edges(&mut self) {
        self.unique_edges.clear();
        for face in &self.faces {
            let n = face.len();
            for i in 0..n {
                let a = self.vertices[face[i]];
                let b = self.vertices[face[(i + 1) % n]];
                let mut edge = b - a;
                let len = edge.length();
                if len == 0.0 {
                    continue;
                }
                edge /= len;
                let known = self
                    .unique_edges
                    .iter()
                    .any(|e| e.almost_equals(edge, 1e-6) || e.almost_equals(-edge, 1e-6));
                if !known {
                    self.unique_edges.push(edge);
                }
            }
        }
    }

    /// Mean of the local vertices.
    pub fn get_average_point_local(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        self.vertices.iter().sum::<Vec3>() / self.vertices.len() as f32
    }

    /// World-space vertices appended to `out`.
    pub fn compute_world_vertices(&self, position: Vec3, quaternion: Quat, out: &mut Vec<Vec3>) {
        out.clear();
        out.extend(self.vertices.iter().map(|&v| quaternion * v + position));
    }

    pub fn world_face_normal(&self, face: usize, quaternion: Quat) -> Vec3 {
        quaternion * self.face_normals[face]
    }

    /// `-n · v0` for the face plane `n · x + constant = 0` in local space.
    pub fn plane_constant(&self, face: usize) -> f32 {
        -self.face_normals[face].dot(self.vertices[self.faces[face][0]])
    }

    /// Interval of the hull projected onto a world axis.
    pub fn project(&self, axis: Vec3, position: Vec3, quaternion: Quat) -> (f32, f32) {
        // (q·v + p)·axis == v·(q⁻¹ axis) + p·axis
        let local_axis = quaternion.conjugate() * axis;
        let offset = position.dot(axis);
        let mut min = f32::MAX;
        let mut max = -f32::MAX;
        for v in &self.vertices {
            let d = v.dot(local_axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min + offset, max + offset)
    }

    /// Penetration depth along `axis`, or `None` when the projections
    /// are separated.
    pub fn test_sep_axis(
        &self,
        axis: Vec3,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
    ) -> Option<f32> {
        let (min_a, max_a) = self.project(axis, pos_a, quat_a);
        let (min_b, max_b) = other.project(axis, pos_b, quat_b);
        if max_a < min_b || max_b < min_a {
            return None;
        }
        let d0 = max_a - min_b;
        let d1 = max_b - min_a;
        Some(d0.min(d1))
    }

    /// Find the minimal-penetration separating axis between two hulls.
    /// Returns `None` when the hulls do not overlap. The returned axis
    /// points from `other` towards `self`.
    pub fn find_separating_axis(
        &self,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
    ) -> Option<Vec3> {
        let mut dmin = f32::MAX;
        let mut target: Option<Vec3> = None;

        let consider = |axis: Vec3, dmin: &mut f32, target: &mut Option<Vec3>| -> bool {
            match self.test_sep_axis(axis, other, pos_a, quat_a, pos_b, quat_b) {
                None => false,
                Some(d) => {
                    if d < *dmin {
                        *dmin = d;
                        *target = Some(axis);
                    }
                    true
                }
            }
        };

        // Face normals of A
        match &self.unique_axes {
            None => {
                for n in &self.face_normals {
                    if !consider(quat_a * *n, &mut dmin, &mut target) {
                        return None;
                    }
                }
            }
            Some(axes) => {
                for axis in axes {
                    if !consider(quat_a * *axis, &mut dmin, &mut target) {
                        return None;
                    }
                }
            }
        }

        // Face normals of B
        match &other.unique_axes {
            None => {
                for n in &other.face_normals {
                    if !consider(quat_b * *n, &mut dmin, &mut target) {
                        return None;
                    }
                }
            }
            Some(axes) => {
                for axis in axes {
                    if !consider(quat_b * *axis, &mut dmin, &mut target) {
                        return None;
                    }
                }
            }
        }

        // Edge-edge cross products
        for ea in &self.unique_edges {
            let world_edge_a = quat_a * *ea;
            for eb in &other.unique_edges {
                let world_edge_b = quat_b * *eb;
                let cross = world_edge_a.cross(world_edge_b);
                if cross.almost_zero(1e-6) {
                    continue;
                }
                if !consider(cross.normalize(), &mut dmin, &mut target) {
                    return None;
                }
            }
        }

        let mut axis = target?;
        if (pos_b - pos_a).dot(axis) > 0.0 {
            axis = -axis;
        }
        Some(axis)
    }

    /// Clip the incident face of `other` against the side planes of this
    /// hull's reference face. Contacts behind the reference plane and
    /// within `[min_dist, max_dist]` are returned.
    pub fn clip_against_hull(
        &self,
        pos_a: Vec3,
        quat_a: Quat,
        other: &ConvexPolyhedron,
        pos_b: Vec3,
        quat_b: Quat,
        separating_normal: Vec3,
        min_dist: f32,
        max_dist: f32,
    ) -> Vec<ClipPoint> {
        // Incident face: the face of B most aligned with the axis
        let mut closest_face_b = None;
        let mut dmax = -f32::MAX;
        for (i, n) in other.face_normals.iter().enumerate() {
            let d = (quat_b * *n).dot(separating_normal);
            if d > dmax {
                dmax = d;
                closest_face_b = Some(i);
            }
        }
        let Some(face_b) = closest_face_b else {
            return Vec::new();
        };

        let world_verts_b: Vec<Vec3> = other.faces[face_b]
            .iter()
            .map(|&vi| quat_b * other.vertices[vi] + pos_b)
            .collect();

        self.clip_face_against_hull(separating_normal, pos_a, quat_a, world_verts_b, min_dist, max_dist)
    }

    /// Clip a world-space polygon against the side planes of the
    /// reference face (the face of this hull most anti-parallel to the
    /// separating normal).
    pub fn clip_face_against_hull(
        &self,
        separating_normal: Vec3,
        pos_a: Vec3,
        quat_a: Quat,
        world_verts: Vec<Vec3>,
        min_dist: f32,
        max_dist: f32,
    ) -> Vec<ClipPoint> {
        let mut closest_face_a = None;
        let mut dmin = f32::MAX;
        for (i, n) in self.face_normals.iter().enumerate() {
            let d = (quat_a * *n).dot(separating_normal);
            if d < dmin {
                dmin = d;
                closest_face_a = Some(i);
            }
        }
        let Some(face_a_index) = closest_face_a else {
            return Vec::new();
        };
        let face_a = &self.faces[face_a_index];

        let mut verts_in = world_verts;
        let mut verts_out = Vec::with_capacity(verts_in.len() + 4);

        for e0 in 0..face_a.len() {
            let ia = face_a[e0];
            let ib = face_a[(e0 + 1) % face_a.len()];

            // Side plane through this edge, from the neighbouring face
            // when one exists, else built from the edge itself
            let (local_normal, local_constant) = match self.connected_face(face_a_index, ia, ib) {
                Some(other_face) => (
                    self.face_normals[other_face],
                    self.plane_constant(other_face),
                ),
                None => {
                    let a = self.vertices[ia];
                    let b = self.vertices[ib];
                    let edge = b - a;
                    let mut side = edge.cross(self.face_normals[face_a_index]);
                    let len = side.length();
                    if len == 0.0 {
                        continue;
                    }
                    side /= len;
                    // Orient outward, away from the face interior
                    let face_center: Vec3 = face_a
                        .iter()
                        .map(|&vi| self.vertices[vi])
                        .sum::<Vec3>()
                        / face_a.len() as f32;
                    if side.dot(face_center - a) > 0.0 {
                        side = -side;
                    }
                    (side, -side.dot(a))
                }
            };

            let world_normal = quat_a * local_normal;
            let world_constant = local_constant - world_normal.dot(pos_a);

            clip_face_against_plane(&verts_in, &mut verts_out, world_normal, world_constant);
            std::mem::swap(&mut verts_in, &mut verts_out);
            verts_out.clear();
        }

        // Keep points behind the reference face plane
        let world_normal = quat_a * self.face_normals[face_a_index];
        let world_constant = self.plane_constant(face_a_index) - world_normal.dot(pos_a);

        let mut result = Vec::new();
        for v in verts_in {
            let mut depth = world_normal.dot(v) + world_constant;
            if depth <= min_dist {
                depth = min_dist;
            }
            if depth <= max_dist && depth <= 0.0 {
                result.push(ClipPoint {
                    point: v,
                    normal: world_normal,
                    depth,
                });
            }
        }
        result
    }

    /// The other face sharing the edge `(va, vb)` with `face`, if any.
    fn connected_face(&self, face: usize, va: usize, vb: usize) -> Option<usize> {
        (0..self.faces.len())
            .find(|&i| i != face && self.faces[i].contains(&va) && self.faces[i].contains(&vb))
    }

    /// Exact volume by summing signed tetrahedra over triangulated faces.
    pub fn volume(&self) -> f32 {
        let mut six_volume = 0.0;
        for face in &self.faces {
            let v0 = self.vertices[face[0]];
            for k in 1..face.len() - 1 {
                let v1 = self.vertices[face[k]];
                let v2 = self.vertices[face[k + 1]];
                six_volume += v0.dot(v1.cross(v2));
            }
        }
        (six_volume / 6.0).abs()
    }

    /// Box approximation from the local AABB; exact hull inertia is not
    /// worth the cost for this pipeline.
    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        let aabb = self.compute_local_aabb();
        let d = aabb.upper_bound - aabb.lower_bound;
        let factor = mass / 12.0;
        Vec3::new(
            factor * (d.y * d.y + d.z * d.z),
            factor * (d.x * d.x + d.z * d.z),
            factor * (d.x * d.x + d.y * d.y),
        )
    }

    pub fn compute_local_aabb(&self) -> Aabb {
        let mut aabb = Aabb::inverted();
        for &v in &self.vertices {
            aabb.expand_to_include(v);
        }
        aabb
    }

    pub fn calculate_world_aabb(&self, position: Vec3, quaternion: Quat) -> Aabb {
        Aabb::from_points(&self.vertices, position, quaternion, 0.0)
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v.length_squared())
            .fold(0.0f32, f32::max)
            .sqrt()
    }
}

/// One Sutherland-Hodgman clipping step against the plane
/// `normal · x + constant = 0`; the half-space `<= 0` is kept.
pub fn clip_face_against_plane(
    verts_in: &[Vec3],
    verts_out: &mut Vec<Vec3>,
    normal: Vec3,
    constant: f32,
) {
    if verts_in.len() < 2 {
        return;
    }
    let mut first = verts_in[verts_in.len() - 1];
    let mut n_dot_first = normal.dot(first) + constant;

    for &last in verts_in {
        let n_dot_last = normal.dot(last) + constant;
        if n_dot_first < 0.0 {
            if n_dot_last < 0.0 {
                verts_out.push(last);
            } else {
                verts_out.push(first.lerp(last, n_dot_first / (n_dot_first - n_dot_last)));
            }
        } else if n_dot_last < 0.0 {
            verts_out.push(first.lerp(last, n_dot_first / (n_dot_first - n_dot_last)));
            verts_out.push(last);
        }
        first = last;
        n_dot_first = n_dot_last;
    }
}

/// Build the 8-vertex, 6-quad-face hull of an axis-aligned box, with the
/// three principal axes as unique SAT axes.
pub fn box_hull(half_extents: Vec3) -> ConvexPolyhedron {
    let h = half_extents;
    let vertices = vec![
        Vec3::new(-h.x, -h.y, -h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(-h.x, h.y, -h.z),
        Vec3::new(-h.x, -h.y, h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(h.x, h.y, h.z),
        Vec3::new(-h.x, h.y, h.z),
    ];
    let faces = vec![
        vec![3, 2, 1, 0], // -z
        vec![4, 5, 6, 7], // +z
        vec![5, 4, 0, 1], // -y
        vec![2, 3, 7, 6], // +y
        vec![0, 4, 7, 3], // -x
        vec![1, 2, 6, 5], // +x
    ];
    ConvexPolyhedron::new(vertices, faces)
        .expect("box hull indices are valid")
        .with_unique_axes(vec![Vec3::X, Vec3::Y, Vec3::Z])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_box_hull_normals_point_outward() {
        let hull = box_hull(Vec3::ONE);
        assert_eq!(hull.faces.len(), 6);
        for (i, face) in hull.faces.iter().enumerate() {
            let v0 = hull.vertices[face[0]];
            assert!(hull.face_normals[i].dot(v0) > 0.0);
        }
    }

    #[test]
    fn test_box_hull_unique_edges() {
        let hull = box_hull(Vec3::ONE);
        // Axis-aligned box collapses to three edge directions
        assert_eq!(hull.unique_edges.len(), 3);
    }

    #[test]
    fn test_volume() {
        let hull = box_hull(Vec3::new(1.0, 2.0, 3.0));
        assert_abs_diff_eq!(hull.volume(), 48.0, epsilon = 1e-3);
    }

    #[test]
    fn test_world_aabb() {
        let hull = box_hull(Vec3::ONE);
        let aabb = hull.calculate_world_aabb(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        assert_abs_diff_eq!((aabb.lower_bound - Vec3::new(0.0, -1.0, -1.0)).length(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!((aabb.upper_bound - Vec3::new(2.0, 1.0, 1.0)).length(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_separated_hulls_have_no_axis() {
        let a = box_hull(Vec3::ONE);
        let b = box_hull(Vec3::ONE);
        let axis = a.find_separating_axis(
            &b,
            Vec3::ZERO,
            Quat::IDENTITY,
            Vec3::new(5.0, 0.0, 0.0),
            Quat::IDENTITY,
        );
        assert!(axis.is_none());
    }

    #[test]
    fn test_overlapping_hulls_find_axis() {
        let a = box_hull(Vec3::ONE);
        let b = box_hull(Vec3::ONE);
        let axis = a
            .find_separating_axis(
                &b,
                Vec3::ZERO,
                Quat::IDENTITY,
                Vec3::new(1.5, 0.0, 0.0),
                Quat::IDENTITY,
            )
            .unwrap();
        // Minimal penetration along x, pointing from B towards A
        assert_abs_diff_eq!(axis.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_clip_produces_contacts() {
        let a = box_hull(Vec3::ONE);
        let b = box_hull(Vec3::ONE);
        let pos_b = Vec3::new(0.0, 0.0, 1.8);
        let sep = a
            .find_separating_axis(&b, Vec3::ZERO, Quat::IDENTITY, pos_b, Quat::IDENTITY)
            .unwrap();
        let contacts = a.clip_against_hull(
            Vec3::ZERO,
            Quat::IDENTITY,
            &b,
            pos_b,
            Quat::IDENTITY,
            sep,
            -100.0,
            100.0,
        );
        assert!(!contacts.is_empty());
        for c in &contacts {
            assert!(c.depth <= 0.0);
            assert!(c.depth >= -0.3);
        }
    }

    #[test]
    fn test_bad_face_index_rejected() {
        let verts = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let err = ConvexPolyhedron::new(verts, vec![vec![0, 1, 9]]).unwrap_err();
        assert!(matches!(err, ShapeError::FaceVertexOutOfBounds { .. }));
    }
}
