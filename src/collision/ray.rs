//! Ray casting against bodies and shapes
//!
//! Rays are segments from `from` to `to`. Shape intersectors report hits
//! through a mode-aware sink: closest keeps the nearest, any stops at
//! the first, all invokes a callback per hit.

use glam::{Quat, Vec3};

use crate::body::Body;
use crate::collision::aabb::Aabb;
use crate::math::Transform;
use crate::shapes::{ConvexPolyhedron, Heightfield, Shape, ShapeKind, Sphere, Trimesh};

/// Hit filtering/selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RayMode {
    /// Keep the hit with the smallest distance
    Closest = 1,
    /// Stop at the first hit found
    Any = 2,
    /// Report every hit to the callback
    All = 4,
}

/// Options accepted by the world raycast entry points.
#[derive(Debug, Clone, Copy)]
pub struct RayOptions {
    pub collision_filter_mask: i32,
    pub collision_filter_group: i32,
    /// Skip hits whose normal faces away from the ray
    pub skip_backfaces: bool,
    /// Honor body/shape `collision_response` flags
    pub check_collision_response: bool,
}

impl Default for RayOptions {
    fn default() -> Self {
        Self {
            collision_filter_mask: -1,
            collision_filter_group: -1,
            skip_backfaces: false,
            check_collision_response: true,
        }
    }
}

/// Result of a raycast. `distance` is `-1.0` until a hit lands.
#[derive(Debug, Clone)]
pub struct RaycastResult {
    pub ray_from_world: Vec3,
    pub ray_to_world: Vec3,
    pub hit_normal_world: Vec3,
    pub hit_point_world: Vec3,
    pub has_hit: bool,
    pub body: Option<u32>,
    pub shape: Option<u32>,
    pub distance: f32,
    /// Index of the hit face for convex/trimesh hits
    pub hit_face_index: Option<usize>,
    should_stop: bool,
}

impl Default for RaycastResult {
    fn default() -> Self {
        Self {
            ray_from_world: Vec3::ZERO,
            ray_to_world: Vec3::ZERO,
            hit_normal_world: Vec3::ZERO,
            hit_point_world: Vec3::ZERO,
            has_hit: false,
            body: None,
            shape: None,
            distance: -1.0,
            hit_face_index: None,
            should_stop: false,
        }
    }
}

impl RaycastResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Stop an `All`-mode traversal from inside the callback.
    pub fn abort(&mut self) {
        self.should_stop = true;
    }
}

/// A ray segment plus its filtering configuration.
#[derive(Debug, Clone)]
pub struct Ray {
    pub from: Vec3,
    pub to: Vec3,
    /// Unit direction, derived from `from`/`to`
    pub direction: Vec3,
    /// Parallelity tolerance for plane-facing tests
    pub precision: f32,
    pub mode: RayMode,
    pub skip_backfaces: bool,
    pub collision_filter_group: i32,
    pub collision_filter_mask: i32,
    pub check_collision_response: bool,
}

impl Ray {
    pub fn new(from: Vec3, to: Vec3) -> Self {
        let direction = (to - from).normalize_or_zero();
        Self {
            from,
            to,
            direction,
            precision: 0.0001,
            mode: RayMode::Any,
            skip_backfaces: false,
            collision_filter_group: -1,
            collision_filter_mask: -1,
            check_collision_response: true,
        }
    }

    pub fn with_options(mut self, mode: RayMode, options: &RayOptions) -> Self {
        self.mode = mode;
        self.skip_backfaces = options.skip_backfaces;
        self.collision_filter_group = options.collision_filter_group;
        self.collision_filter_mask = options.collision_filter_mask;
        self.check_collision_response = options.check_collision_response;
        self
    }

    pub fn length(&self) -> f32 {
        (self.to - self.from).length()
    }

    /// Bounding box of the segment, for broadphase queries.
    pub fn get_aabb(&self) -> Aabb {
        Aabb::new(self.from.min(self.to), self.from.max(self.to))
    }

    /// Cast against a set of bodies. Returns true when anything was hit.
    pub fn intersect_bodies<'a, 'b>(
        &'a self,
        bodies: &[Body],
        indices: &[usize],
        result: &'a mut RaycastResult,
        callback: Option<&'b mut dyn FnMut(&mut RaycastResult)>,
    ) -> bool {
        result.reset();
        result.ray_from_world = self.from;
        result.ray_to_world = self.to;

        let mut traversal = Traversal {
            ray: self,
            result,
            callback,
            hit_any: false,
        };
        for &index in indices {
            if traversal.result.should_stop {
                break;
            }
            traversal.intersect_body(&bodies[index]);
        }
        traversal.hit_any
    }
}

/// Barycentric point-in-triangle test, divisions avoided.
pub fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;
    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);
    let u = dot11 * dot02 - dot01 * dot12;
    let v = dot00 * dot12 - dot01 * dot02;
    u >= 0.0 && v >= 0.0 && u + v < dot00 * dot11 - dot01 * dot01
}

/// Mutable traversal state for one cast.
struct Traversal<'a, 'b> {
    ray: &'a Ray,
    result: &'a mut RaycastResult,
    callback: Option<&'b mut dyn FnMut(&mut RaycastResult)>,
    hit_any: bool,
}

impl Traversal<'_, '_> {
    fn intersect_body(&mut self, body: &Body) {
        let ray = self.ray;
        if ray.check_collision_response && !body.collision_response {
            return;
        }
        if (ray.collision_filter_group & body.collision_filter_mask) == 0
            || (body.collision_filter_group & ray.collision_filter_mask) == 0
        {
            return;
        }
        for index in 0..body.shapes().len() {
            if self.result.should_stop {
                return;
            }
            let shape = &body.shapes()[index];
            if ray.check_collision_response && !shape.collision_response {
                continue;
            }
            let (pos, quat) = body.shape_world_transform(index);

            // Perpendicular distance culling against the bounding sphere
            let to_center = pos - ray.from;
            let along = to_center.dot(ray.direction);
            let closest = ray.from + ray.direction * along;
            if (pos - closest).length() > shape.bounding_sphere_radius {
                continue;
            }
            self.intersect_shape(shape, pos, quat, body.id);
        }
    }

    fn intersect_shape(&mut self, shape: &Shape, position: Vec3, quaternion: Quat, body_id: u32) {
        match &shape.kind {
            ShapeKind::Sphere(sphere) => {
                self.intersect_sphere(sphere, position, body_id, shape.id)
            }
            ShapeKind::Plane(_) => self.intersect_plane(position, quaternion, body_id, shape.id),
            ShapeKind::Box(cuboid) => {
                self.intersect_convex(&cuboid.convex, position, quaternion, body_id, shape.id)
            }
            ShapeKind::Convex(convex) => {
                self.intersect_convex(convex, position, quaternion, body_id, shape.id)
            }
            ShapeKind::Heightfield(field) => {
                self.intersect_heightfield(field, position, quaternion, body_id, shape.id)
            }
            ShapeKind::Trimesh(mesh) => {
                self.intersect_trimesh(mesh, position, quaternion, body_id, shape.id)
            }
            // Points are never hit by a ray
            ShapeKind::Particle => {}
        }
    }

    fn intersect_sphere(&mut self, sphere: &Sphere, position: Vec3, body_id: u32, shape_id: u32) {
        let from = self.ray.from;
        let to = self.ray.to;
        let r = sphere.radius;

        let d = to - from;
        let a = d.dot(d);
        let b = 2.0 * d.dot(from - position);
        let c = (from - position).dot(from - position) - r * r;
        let delta = b * b - 4.0 * a * c;
        if delta < 0.0 || a == 0.0 {
            return;
        }

        let sqrt_delta = delta.sqrt();
        for t in [(-b - sqrt_delta) / (2.0 * a), (-b + sqrt_delta) / (2.0 * a)] {
            if self.result.should_stop {
                return;
            }
            if (0.0..=1.0).contains(&t) {
                let point = from.lerp(to, t);
                let normal = (point - position).normalize_or_zero();
                self.report(normal, point, body_id, shape_id, None);
            }
        }
    }

    fn intersect_plane(&mut self, position: Vec3, quaternion: Quat, body_id: u32, shape_id: u32) {
        let ray = self.ray;
        let world_normal = quaternion * Vec3::Z;

        let denominator = world_normal.dot(ray.direction);
        if denominator.abs() < ray.precision {
            // Parallel
            return;
        }
        let t = -world_normal.dot(ray.from - position) / denominator;
        if t < 0.0 || t > ray.length() {
            return;
        }
        let point = ray.from + ray.direction * t;
        self.report(world_normal, point, body_id, shape_id, None);
    }

    fn intersect_convex(
        &mut self,
        convex: &ConvexPolyhedron,
        position: Vec3,
        quaternion: Quat,
        body_id: u32,
        shape_id: u32,
    ) {
        let ray = self.ray;
        let max_distance = ray.length();

        for (face_index, face) in convex.faces.iter().enumerate() {
            if self.result.should_stop {
                return;
            }
            let normal = convex.world_face_normal(face_index, quaternion);
            let point_on_face = quaternion * convex.vertices[face[0]] + position;

            let denominator = ray.direction.dot(normal);
            if denominator.abs() < ray.precision {
                continue;
            }
            let scalar = normal.dot(point_on_face - ray.from) / denominator;
            if scalar < 0.0 || scalar > max_distance {
                continue;
            }
            let intersect_point = ray.from + ray.direction * scalar;

            // Fan triangulation of the face polygon
            let a = quaternion * convex.vertices[face[0]] + position;
            for k in 1..face.len() - 1 {
                let b = quaternion * convex.vertices[face[k]] + position;
                let c = quaternion * convex.vertices[face[k + 1]] + position;
                if point_in_triangle(intersect_point, a, b, c) {
                    self.report(normal, intersect_point, body_id, shape_id, Some(face_index));
                    break;
                }
            }
        }
    }

    fn intersect_heightfield(
        &mut self,
        field: &Heightfield,
        position: Vec3,
        quaternion: Quat,
        body_id: u32,
        shape_id: u32,
    ) {
        let transform = Transform::new(position, quaternion);
        let local_from = transform.point_to_local(self.ray.from);
        let local_to = transform.point_to_local(self.ray.to);
        let local_direction = (local_to - local_from).normalize_or_zero();

        let Some((x0, y0)) = field.get_index_of_position(
            local_from.x.min(local_to.x),
            local_from.y.min(local_to.y),
            true,
        ) else {
            return;
        };
        let Some((x1, y1)) = field.get_index_of_position(
            local_from.x.max(local_to.x),
            local_from.y.max(local_to.y),
            true,
        ) else {
            return;
        };

        for xi in x0..=x1 {
            for yi in y0..=y1 {
                if self.result.should_stop {
                    return;
                }
                let cell = field.get_aabb_at_index(xi, yi);
                if !cell.overlaps_ray(local_from, local_direction) {
                    continue;
                }
                for upper in [false, true] {
                    field.with_pillar(xi, yi, upper, |convex, offset| {
                        let pillar_position = transform.point_to_world(offset);
                        self.intersect_convex(convex, pillar_position, quaternion, body_id, shape_id);
                    });
                    if self.result.should_stop {
                        return;
                    }
                }
            }
        }
    }

    fn intersect_trimesh(
        &mut self,
        mesh: &Trimesh,
        position: Vec3,
        quaternion: Quat,
        body_id: u32,
        shape_id: u32,
    ) {
        let ray = self.ray;
        let transform = Transform::new(position, quaternion);
        let local_from = transform.point_to_local(ray.from);
        let local_direction = transform.vector_to_local(ray.direction);
        let max_distance = ray.length();

        let mut candidates = Vec::new();
        mesh.get_triangles_near_ray(ray.from, ray.to, &transform, &mut candidates);

        for &tri in &candidates {
            if self.result.should_stop {
                return;
            }
            let tri = tri as usize;
            let normal = mesh.get_normal(tri);
            let (a, b, c) = mesh.get_triangle_vertices(tri);

            let denominator = local_direction.dot(normal);
            if denominator.abs() < ray.precision {
                continue;
            }
            let scalar = normal.dot(a - local_from) / denominator;
            if scalar < 0.0 || scalar > max_distance {
                continue;
            }
            let local_point = local_from + local_direction * scalar;
            if !point_in_triangle(local_point, a, b, c) {
                continue;
            }
            let world_point = transform.point_to_world(local_point);
            let world_normal = transform.vector_to_world(normal);
            self.report(world_normal, world_point, body_id, shape_id, Some(tri));
        }
    }

    fn report(
        &mut self,
        normal: Vec3,
        hit_point: Vec3,
        body_id: u32,
        shape_id: u32,
        face_index: Option<usize>,
    ) {
        let ray = self.ray;
        if ray.skip_backfaces && normal.dot(ray.direction) >= 0.0 {
            return;
        }
        let distance = (hit_point - ray.from).length();

        let set = |result: &mut RaycastResult| {
            result.has_hit = true;
            result.hit_normal_world = normal;
            result.hit_point_world = hit_point;
            result.body = Some(body_id);
            result.shape = Some(shape_id);
            result.distance = distance;
            result.hit_face_index = face_index;
        };

        match ray.mode {
            RayMode::All => {
                set(self.result);
                self.hit_any = true;
                if let Some(callback) = self.callback.as_deref_mut() {
                    callback(self.result);
                }
            }
            RayMode::Closest => {
                if self.result.distance < 0.0 || distance < self.result.distance {
                    set(self.result);
                    self.hit_any = true;
                }
            }
            RayMode::Any => {
                set(self.result);
                self.hit_any = true;
                self.result.should_stop = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyOptions};

    fn body_with(shape: Shape, position: Vec3) -> Body {
        let mut b = Body::new(BodyOptions {
            mass: 0.0,
            position,
            ..Default::default()
        });
        b.add_shape_centered(shape);
        b
    }

    fn cast_closest(bodies: &[Body], from: Vec3, to: Vec3) -> RaycastResult {
        let ray = Ray::new(from, to).with_options(RayMode::Closest, &RayOptions::default());
        let indices: Vec<usize> = (0..bodies.len()).collect();
        let mut result = RaycastResult::new();
        ray.intersect_bodies(bodies, &indices, &mut result, None);
        result
    }

    #[test]
    fn test_sphere_closest_hit() {
        let bodies = vec![body_with(Shape::sphere(1.0).unwrap(), Vec3::ZERO)];
        let result = cast_closest(&bodies, Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -10.0));
        assert!(result.has_hit);
        assert!((result.hit_point_world - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);
        assert!((result.distance - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_plane_hit() {
        let bodies = vec![body_with(Shape::plane(), Vec3::ZERO)];
        let result = cast_closest(&bodies, Vec3::new(1.0, 2.0, 5.0), Vec3::new(1.0, 2.0, -5.0));
        assert!(result.has_hit);
        assert!((result.hit_point_world - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-4);
        assert!((result.hit_normal_world - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_box_hit_face() {
        let bodies = vec![body_with(Shape::cuboid(Vec3::ONE), Vec3::ZERO)];
        let result = cast_closest(&bodies, Vec3::new(5.0, 0.0, 0.0), Vec3::new(-5.0, 0.0, 0.0));
        assert!(result.has_hit);
        assert!((result.hit_point_world.x - 1.0).abs() < 1e-4);
        assert!((result.hit_normal_world - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn test_miss() {
        let bodies = vec![body_with(Shape::sphere(1.0).unwrap(), Vec3::ZERO)];
        let result = cast_closest(&bodies, Vec3::new(5.0, 5.0, 10.0), Vec3::new(5.0, 5.0, -10.0));
        assert!(!result.has_hit);
        assert_eq!(result.distance, -1.0);
    }

    #[test]
    fn test_any_mode_stops_early() {
        let bodies = vec![
            body_with(Shape::sphere(1.0).unwrap(), Vec3::ZERO),
            body_with(Shape::sphere(1.0).unwrap(), Vec3::new(0.0, 0.0, -4.0)),
        ];
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -10.0))
            .with_options(RayMode::Any, &RayOptions::default());
        let mut result = RaycastResult::new();
        let hit = ray.intersect_bodies(&bodies, &[0, 1], &mut result, None);
        assert!(hit);
        assert!(result.has_hit);
        // First reported hit wins, traversal stops
        assert_eq!(result.body, Some(bodies[0].id));
    }

    #[test]
    fn test_all_mode_counts_hits() {
        let bodies = vec![body_with(Shape::sphere(1.0).unwrap(), Vec3::ZERO)];
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -10.0))
            .with_options(RayMode::All, &RayOptions::default());
        let mut count = 0;
        let mut result = RaycastResult::new();
        let mut callback = |_: &mut RaycastResult| count += 1;
        ray.intersect_bodies(&bodies, &[0], &mut result, Some(&mut callback));
        // Entry and exit of the sphere
        assert_eq!(count, 2);
    }

    #[test]
    fn test_skip_backfaces() {
        let bodies = vec![body_with(Shape::plane(), Vec3::ZERO)];
        // Cast from below: the plane normal faces along the ray
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0)).with_options(
            RayMode::Closest,
            &RayOptions {
                skip_backfaces: true,
                ..Default::default()
            },
        );
        let mut result = RaycastResult::new();
        let hit = ray.intersect_bodies(&bodies, &[0], &mut result, None);
        assert!(!hit);
    }

    #[test]
    fn test_trimesh_hit() {
        let mesh = Shape::trimesh(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let bodies = vec![body_with(mesh, Vec3::ZERO)];
        let result = cast_closest(&bodies, Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -5.0));
        assert!(result.has_hit);
        assert!((result.hit_point_world.z).abs() < 1e-4);
        assert_eq!(result.hit_face_index, Some(0));
    }

    #[test]
    fn test_heightfield_hit() {
        let field = Shape::heightfield(vec![vec![0.0; 4]; 4], 1.0).unwrap();
        let bodies = vec![body_with(field, Vec3::ZERO)];
        let result = cast_closest(&bodies, Vec3::new(1.3, 1.4, 5.0), Vec3::new(1.3, 1.4, -5.0));
        assert!(result.has_hit);
        assert!(result.hit_point_world.z.abs() < 1e-3);
    }
}
