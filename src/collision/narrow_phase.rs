//! Narrowphase contact generation
//!
//! Consumes broadphase pairs and emits contact and friction equations.
//! Dispatch is keyed on the ordered shape type codes; the shape with the
//! smaller code always plays the `i` role, so each generator only
//! handles one orientation of its pair. Equations are recycled through
//! pools across steps.

use glam::{Quat, Vec3};
use tracing::trace;

use crate::body::Body;
use crate::collision::aabb::Aabb;
use crate::equations::{ContactData, Equation, EquationKind, FrictionData, DEFAULT_MAX_FORCE};
use crate::material::ContactMaterial;
use crate::math::{Transform, Vec3Ext};
use crate::shapes::{ConvexPolyhedron, Heightfield, ShapeKind, Sphere, Trimesh};
use crate::utils::{PairMap, Pool};

/// Step-scoped world data the narrowphase reads.
pub struct NarrowphaseInput<'a> {
    pub dt: f32,
    /// Magnitude of world gravity, used for friction slip forces
    pub gravity_norm: f32,
    pub default_contact_material: &'a ContactMaterial,
    /// Material id pair to index into `contact_materials`
    pub contact_material_table: &'a PairMap<usize>,
    pub contact_materials: &'a [ContactMaterial],
}

impl NarrowphaseInput<'_> {
    fn lookup(&self, a: u32, b: u32) -> Option<&ContactMaterial> {
        self.contact_material_table
            .get(a, b)
            .map(|&index| &self.contact_materials[index])
    }
}

/// A trigger overlap observed during the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerOverlap {
    pub body_a: u32,
    pub body_b: u32,
    pub shape_a: u32,
    pub shape_b: u32,
}

/// Everything a contact generator needs to know about the pair it is
/// working on. Plain data so pillar recursion can rewrite the `j` side.
#[derive(Debug, Clone, Copy)]
struct PairInfo {
    /// Arena indices
    bi: usize,
    bj: usize,
    body_pos_i: Vec3,
    body_pos_j: Vec3,
    inv_mass_i: f32,
    inv_mass_j: f32,
    /// Reported shape ids
    si: u32,
    sj: u32,
    /// World transforms of the two shapes
    xi: Vec3,
    xj: Vec3,
    qi: Quat,
    qj: Quat,
    /// Only test for overlap, produce no equations
    just_test: bool,
}

/// Generates contact and friction equations from broadphase pairs.
pub struct Narrowphase {
    pub contact_pool: Pool<Equation>,
    pub friction_pool: Pool<Equation>,
    /// Collapse multi-contact pairs to one averaged friction pair
    pub enable_friction_reduction: bool,
    result: Vec<Equation>,
    friction_result: Vec<Equation>,
    trigger_overlaps: Vec<TriggerOverlap>,
    current_contact_material: ContactMaterial,
    dt: f32,
    gravity_norm: f32,
}

impl Default for Narrowphase {
    fn default() -> Self {
        Self::new()
    }
}

impl Narrowphase {
    pub fn new() -> Self {
        Self {
            contact_pool: Pool::new(),
            friction_pool: Pool::new(),
            enable_friction_reduction: false,
            result: Vec::new(),
            friction_result: Vec::new(),
            trigger_overlaps: Vec::new(),
            current_contact_material: ContactMaterial::default_pair(),
            dt: 1.0 / 60.0,
            gravity_norm: 9.82,
        }
    }

    /// Recycle last step's equations back into the pools.
    pub fn release_equations(
        &mut self,
        contacts: impl IntoIterator<Item = Equation>,
        friction: impl IntoIterator<Item = Equation>,
    ) {
        self.contact_pool.release_all(contacts);
        self.friction_pool.release_all(friction);
    }

    /// Generate contacts for every shape pair of every body pair.
    pub fn get_contacts(
        &mut self,
        pairs_a: &[usize],
        pairs_b: &[usize],
        bodies: &[Body],
        input: &NarrowphaseInput,
    ) {
        self.result.clear();
        self.friction_result.clear();
        self.trigger_overlaps.clear();
        self.dt = input.dt;
        self.gravity_norm = input.gravity_norm;

        for (&bi, &bj) in pairs_a.iter().zip(pairs_b.iter()) {
            let body_i = &bodies[bi];
            let body_j = &bodies[bj];

            let body_contact_material = match (&body_i.material, &body_j.material) {
                (Some(a), Some(b)) => input.lookup(a.id, b.id),
                _ => None,
            };

            for shape_index_i in 0..body_i.shapes().len() {
                let si = &body_i.shapes()[shape_index_i];
                let (xi, qi) = body_i.shape_world_transform(shape_index_i);

                for shape_index_j in 0..body_j.shapes().len() {
                    let sj = &body_j.shapes()[shape_index_j];
                    let (xj, qj) = body_j.shape_world_transform(shape_index_j);

                    if (si.collision_filter_group & sj.collision_filter_mask) == 0
                        || (sj.collision_filter_group & si.collision_filter_mask) == 0
                    {
                        continue;
                    }
                    if (xi - xj).length()
                        > si.bounding_sphere_radius + sj.bounding_sphere_radius
                    {
                        continue;
                    }

                    let shape_contact_material = match (&si.material, &sj.material) {
                        (Some(a), Some(b)) => input.lookup(a.id, b.id),
                        _ => None,
                    };
                    self.current_contact_material = shape_contact_material
                        .or(body_contact_material)
                        .unwrap_or(input.default_contact_material)
                        .clone();

                    let is_trigger = si.is_trigger || sj.is_trigger;
                    let responds = si.collision_response
                        && sj.collision_response
                        && body_i.collision_response
                        && body_j.collision_response;
                    let just_test = is_trigger || !responds;

                    // The shape with the smaller type code plays role i
                    let swap = si.shape_type().bit() > sj.shape_type().bit();
                    let info = if swap {
                        PairInfo {
                            bi: bj,
                            bj: bi,
                            body_pos_i: body_j.position,
                            body_pos_j: body_i.position,
                            inv_mass_i: body_j.inv_mass,
                            inv_mass_j: body_i.inv_mass,
                            si: sj.id,
                            sj: si.id,
                            xi: xj,
                            xj: xi,
                            qi: qj,
                            qj: qi,
                            just_test,
                        }
                    } else {
                        PairInfo {
                            bi,
                            bj,
                            body_pos_i: body_i.position,
                            body_pos_j: body_j.position,
                            inv_mass_i: body_i.inv_mass,
                            inv_mass_j: body_j.inv_mass,
                            si: si.id,
                            sj: sj.id,
                            xi,
                            xj,
                            qi,
                            qj,
                            just_test,
                        }
                    };
                    let (kind_i, kind_j) = if swap {
                        (&sj.kind, &si.kind)
                    } else {
                        (&si.kind, &sj.kind)
                    };

                    let overlap = self.dispatch(kind_i, kind_j, &info);
                    if overlap && is_trigger {
                        self.trigger_overlaps.push(TriggerOverlap {
                            body_a: body_i.id,
                            body_b: body_j.id,
                            shape_a: si.id,
                            shape_b: sj.id,
                        });
                    }
                }
            }
        }
    }

    /// Move the generated equations out, leaving empty buffers.
    pub fn take_results(&mut self) -> (Vec<Equation>, Vec<Equation>) {
        (
            std::mem::take(&mut self.result),
            std::mem::take(&mut self.friction_result),
        )
    }

    pub fn trigger_overlaps(&self) -> &[TriggerOverlap] {
        &self.trigger_overlaps
    }

    fn dispatch(&mut self, kind_i: &ShapeKind, kind_j: &ShapeKind, info: &PairInfo) -> bool {
        use ShapeKind as K;
        match (kind_i, kind_j) {
            (K::Sphere(a), K::Sphere(b)) => self.sphere_sphere(a, b, info),
            (K::Sphere(a), K::Plane(_)) => self.sphere_plane(a, info),
            (K::Sphere(a), K::Box(b)) => self.sphere_box(a, b.half_extents, info),
            (K::Sphere(a), K::Convex(b)) => self.sphere_convex(a, b, info),
            (K::Sphere(a), K::Heightfield(b)) => self.sphere_heightfield(a, b, info),
            (K::Sphere(a), K::Particle) => self.sphere_particle(a, info),
            (K::Sphere(a), K::Trimesh(b)) => self.sphere_trimesh(a, b, info),
            (K::Plane(_), K::Box(b)) => self.plane_convex(&b.convex, info),
            (K::Plane(_), K::Convex(b)) => self.plane_convex(b, info),
            (K::Plane(_), K::Particle) => self.plane_particle(info),
            (K::Plane(_), K::Trimesh(b)) => self.plane_trimesh(b, info),
            (K::Box(a), K::Box(b)) => self.convex_convex(&a.convex, &b.convex, info),
            (K::Box(a), K::Convex(b)) => self.convex_convex(&a.convex, b, info),
            (K::Box(a), K::Heightfield(b)) => self.convex_heightfield(&a.convex, b, info),
            (K::Box(a), K::Particle) => self.convex_particle(&a.convex, info),
            (K::Convex(a), K::Convex(b)) => self.convex_convex(a, b, info),
            (K::Convex(a), K::Heightfield(b)) => self.convex_heightfield(a, b, info),
            (K::Convex(a), K::Particle) => self.convex_particle(a, info),
            _ => {
                trace!(
                    "no narrowphase resolver for {:?}/{:?}",
                    kind_i.shape_type(),
                    kind_j.shape_type()
                );
                false
            }
        }
    }

    /// Fetch a pooled contact equation configured for the current pair
    /// and material.
    fn create_contact_equation(&mut self, info: &PairInfo) -> Equation {
        let mut eq = self.contact_pool.acquire();
        let cm = &self.current_contact_material;
        eq.bi = info.bi;
        eq.bj = info.bj;
        eq.si = info.si;
        eq.sj = info.sj;
        eq.enabled = true;
        eq.min_force = 0.0;
        eq.max_force = DEFAULT_MAX_FORCE;
        eq.multiplier = 0.0;
        eq.kind = EquationKind::Contact(ContactData {
            ri: Vec3::ZERO,
            rj: Vec3::ZERO,
            ni: Vec3::ZERO,
            restitution: cm.restitution,
        });
        eq.set_spook_params(
            cm.contact_equation_stiffness,
            cm.contact_equation_relaxation,
            self.dt,
        );
        eq
    }

    /// Two friction rows tangent to the contact normal, slip-bounded by
    /// `μ · reduced_mass · |g|`.
    fn create_friction_equations_from_contact(&mut self, contact: &Equation, info: &PairInfo) -> bool {
        let cm = &self.current_contact_material;
        if cm.friction <= 0.0 {
            return false;
        }
        let mug = cm.friction * self.gravity_norm;
        let mut reduced_mass = info.inv_mass_i + info.inv_mass_j;
        if reduced_mass > 0.0 {
            reduced_mass = 1.0 / reduced_mass;
        }
        let slip_force = mug * reduced_mass;
        let data = contact
            .contact_data()
            .expect("friction source must be a contact equation");
        let (t1, t2) = data.ni.tangents();

        for t in [t1, t2] {
            let mut eq = self.friction_pool.acquire();
            eq.bi = contact.bi;
            eq.bj = contact.bj;
            eq.si = contact.si;
            eq.sj = contact.sj;
            eq.enabled = contact.enabled;
            eq.min_force = -slip_force;
            eq.max_force = slip_force;
            eq.multiplier = 0.0;
            eq.kind = EquationKind::Friction(FrictionData {
                ri: data.ri,
                rj: data.rj,
                t,
            });
            eq.set_spook_params(
                cm.friction_equation_stiffness,
                cm.friction_equation_relaxation,
                self.dt,
            );
            self.friction_result.push(eq);
        }
        true
    }

    /// Build one averaged friction pair from the last `count` contacts
    /// of the current pair instead of two rows per contact.
    fn create_friction_from_average(&mut self, count: usize, info: &PairInfo) {
        if count == 0 || self.result.is_empty() {
            return;
        }
        let last = self.result[self.result.len() - 1].clone();
        if !self.create_friction_equations_from_contact(&last, info) || count == 1 {
            return;
        }

        let mut average_normal = Vec3::ZERO;
        let mut average_ri = Vec3::ZERO;
        let mut average_rj = Vec3::ZERO;
        for eq in &self.result[self.result.len() - count..] {
            let data = eq.contact_data().expect("contact batch");
            average_normal += data.ni;
            average_ri += data.ri;
            average_rj += data.rj;
        }
        let scale = 1.0 / count as f32;
        average_normal = average_normal.normalize_or_zero();
        average_ri *= scale;
        average_rj *= scale;

        let (t1, t2) = average_normal.tangents();
        let len = self.friction_result.len();
        for (offset, t) in [(2, t1), (1, t2)] {
            if let Some(EquationKind::Friction(data)) =
                self.friction_result.get_mut(len - offset).map(|e| &mut e.kind)
            {
                data.ri = average_ri;
                data.rj = average_rj;
                data.t = t;
            }
        }
    }

    /// Adjust shape-relative contact offsets to body centers of mass and
    /// store the equation.
    fn finish_contact(&mut self, mut eq: Equation, info: &PairInfo, with_friction: bool) {
        if let Some(data) = eq.contact_data_mut() {
            data.ri += info.xi - info.body_pos_i;
            data.rj += info.xj - info.body_pos_j;
        }
        if with_friction {
            self.create_friction_equations_from_contact(&eq, info);
        }
        self.result.push(eq);
    }

    fn sphere_sphere(&mut self, si: &Sphere, sj: &Sphere, info: &PairInfo) -> bool {
        let distance_squared = (info.xi - info.xj).length_squared();
        let radius_sum = si.radius + sj.radius;
        if distance_squared > radius_sum * radius_sum {
            return false;
        }
        if info.just_test {
            return true;
        }

        let ni = (info.xj - info.xi).normalize_or_zero();
        if ni == Vec3::ZERO {
            // Coincident centers, no usable normal
            return true;
        }
        let mut eq = self.create_contact_equation(info);
        let data = eq.contact_data_mut().unwrap();
        data.ni = ni;
        data.ri = ni * si.radius;
        data.rj = -ni * sj.radius;
        self.finish_contact(eq, info, true);
        true
    }

    fn sphere_plane(&mut self, si: &Sphere, info: &PairInfo) -> bool {
        let world_normal = info.qj * Vec3::Z;
        let point_on_plane_to_sphere = info.xi - info.xj;
        let height = world_normal.dot(point_on_plane_to_sphere);
        if height > si.radius {
            return false;
        }
        if info.just_test {
            return true;
        }

        let mut eq = self.create_contact_equation(info);
        let data = eq.contact_data_mut().unwrap();
        data.ni = -world_normal;
        data.ri = data.ni * si.radius;
        data.rj = point_on_plane_to_sphere - world_normal * height;
        self.finish_contact(eq, info, true);
        true
    }

    fn sphere_box(&mut self, si: &Sphere, half_extents: Vec3, info: &PairInfo) -> bool {
        let r = si.radius;
        let box_to_sphere = info.xi - info.xj;

        // Scaled side vectors, positive and negative
        let axes = [
            info.qj * (Vec3::X * half_extents.x),
            info.qj * (Vec3::Y * half_extents.y),
            info.qj * (Vec3::Z * half_extents.z),
        ];
        let sides = [
            axes[0], axes[1], axes[2], -axes[0], -axes[1], -axes[2],
        ];

        // Face contact: the deepest side whose cross section contains
        // the sphere center
        let mut best: Option<(f32, Vec3, f32, Vec3, f32, Vec3, f32)> = None;
        for (idx, side) in sides.iter().enumerate() {
            let h = side.length();
            if h == 0.0 {
                continue;
            }
            let ns = *side / h;
            let dot = box_to_sphere.dot(ns);
            if dot < h + r && dot > 0.0 {
                let side1 = sides[(idx + 1) % 3];
                let side2 = sides[(idx + 2) % 3];
                let h1 = side1.length();
                let h2 = side2.length();
                let ns1 = side1 / h1;
                let ns2 = side2 / h2;
                let dot1 = box_to_sphere.dot(ns1);
                let dot2 = box_to_sphere.dot(ns2);
                if dot1 < h1 && dot1 > -h1 && dot2 < h2 && dot2 > -h2 {
                    let dist = (dot - h - r).abs();
                    let better = match best {
                        None => true,
                        Some((best_dist, ..)) => dist < best_dist,
                    };
                    if better {
                        best = Some((dist, ns, h, ns1, dot1, ns2, dot2));
                    }
                }
            }
        }
        if let Some((_, ns, h, ns1, dot1, ns2, dot2)) = best {
            if info.just_test {
                return true;
            }
            let mut eq = self.create_contact_equation(info);
            let data = eq.contact_data_mut().unwrap();
            data.ri = ns * -r;
            data.ni = -ns;
            data.rj = ns * h + ns1 * dot1 + ns2 * dot2;
            self.finish_contact(eq, info, true);
            return true;
        }

        // Corner contacts
        let rad_squared = r * r;
        for sx in [-1.0f32, 1.0] {
            for sy in [-1.0f32, 1.0] {
                for sz in [-1.0f32, 1.0] {
                    let corner = info.qj
                        * (half_extents * Vec3::new(sx, sy, sz));
                    let sphere_to_corner = corner + info.xj - info.xi;
                    if sphere_to_corner.length_squared() < rad_squared {
                        if info.just_test {
                            return true;
                        }
                        let ni = sphere_to_corner.normalize_or_zero();
                        let mut eq = self.create_contact_equation(info);
                        let data = eq.contact_data_mut().unwrap();
                        data.ni = ni;
                        data.ri = ni * r;
                        data.rj = corner;
                        self.finish_contact(eq, info, true);
                        return true;
                    }
                }
            }
        }

        // Edge contacts: closest point on each box edge
        let corner_signs: [(f32, f32); 4] = [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)];
        for axis in 0..3 {
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            for &(su, sv) in &corner_signs {
                let mut start = Vec3::ZERO;
                start[axis] = -half_extents[axis];
                start[u] = su * half_extents[u];
                start[v] = sv * half_extents[v];
                let mut end = start;
                end[axis] = half_extents[axis];

                let a = info.qj * start + info.xj;
                let b = info.qj * end + info.xj;
                let ab = b - a;
                let t = ((info.xi - a).dot(ab) / ab.length_squared()).clamp(0.0, 1.0);
                let closest = a + ab * t;
                let to_closest = closest - info.xi;
                if to_closest.length_squared() < rad_squared {
                    if info.just_test {
                        return true;
                    }
                    let ni = to_closest.normalize_or_zero();
                    let mut eq = self.create_contact_equation(info);
                    let data = eq.contact_data_mut().unwrap();
                    data.ni = ni;
                    data.ri = ni * r;
                    data.rj = closest - info.xj;
                    self.finish_contact(eq, info, true);
                    return true;
                }
            }
        }
        false
    }

    fn sphere_convex(&mut self, si: &Sphere, convex: &ConvexPolyhedron, info: &PairInfo) -> bool {
        let r = si.radius;

        // Corner contacts
        for v in &convex.vertices {
            let world_corner = info.qj * *v + info.xj;
            let sphere_to_corner = world_corner - info.xi;
            if sphere_to_corner.length_squared() < r * r {
                if info.just_test {
                    return true;
                }
                let ni = sphere_to_corner.normalize_or_zero();
                let mut eq = self.create_contact_equation(info);
                let data = eq.contact_data_mut().unwrap();
                data.ni = ni;
                data.ri = ni * r;
                data.rj = world_corner - info.xj;
                self.finish_contact(eq, info, true);
                return true;
            }
        }

        // Face and face-edge contacts
        for (face_index, face) in convex.faces.iter().enumerate() {
            let world_normal = convex.world_face_normal(face_index, info.qj);
            let world_point = info.qj * convex.vertices[face[0]] + info.xj;

            // Closest point of the sphere towards the face plane
            let closest_on_sphere = info.xi - world_normal * r;
            let penetration = world_normal.dot(closest_on_sphere - world_point);
            let center_outside = world_normal.dot(info.xi - world_point) > 0.0;
            if penetration < 0.0 && center_outside {
                let face_verts: Vec<Vec3> = face
                    .iter()
                    .map(|&vi| info.qj * convex.vertices[vi] + info.xj)
                    .collect();
                if point_in_polygon(&face_verts, world_normal, info.xi) {
                    if info.just_test {
                        return true;
                    }
                    let mut eq = self.create_contact_equation(info);
                    let data = eq.contact_data_mut().unwrap();
                    data.ni = -world_normal;
                    data.ri = world_normal * -r;
                    // Point on the face, relative to the convex origin
                    data.rj = (info.xi - world_normal * (r + penetration)) - info.xj;
                    self.finish_contact(eq, info, true);
                    return true;
                }
                // Check the face edges
                for i in 0..face_verts.len() {
                    let v1 = face_verts[i];
                    let v2 = face_verts[(i + 1) % face_verts.len()];
                    let edge = v2 - v1;
                    let t = ((info.xi - v1).dot(edge) / edge.length_squared()).clamp(0.0, 1.0);
                    if t <= 0.0 || t >= 1.0 {
                        continue;
                    }
                    let closest = v1 + edge * t;
                    let to_closest = closest - info.xi;
                    if to_closest.length_squared() < r * r {
                        if info.just_test {
                            return true;
                        }
                        let ni = to_closest.normalize_or_zero();
                        let mut eq = self.create_contact_equation(info);
                        let data = eq.contact_data_mut().unwrap();
                        data.ni = ni;
                        data.ri = ni * r;
                        data.rj = closest - info.xj;
                        self.finish_contact(eq, info, true);
                        return true;
                    }
                }
            }
        }
        false
    }

    fn plane_convex(&mut self, convex: &ConvexPolyhedron, info: &PairInfo) -> bool {
        // Plane is body i, convex is body j
        let world_normal = info.qi * Vec3::Z;
        let mut num_contacts = 0;
        for v in &convex.vertices {
            let world_vertex = info.qj * *v + info.xj;
            let depth = world_normal.dot(world_vertex - info.xi);
            if depth <= 0.0 {
                if info.just_test {
                    return true;
                }
                let mut eq = self.create_contact_equation(info);
                let data = eq.contact_data_mut().unwrap();
                data.ni = world_normal;
                data.ri = (world_vertex - world_normal * depth) - info.xi;
                data.rj = world_vertex - info.xj;
                let with_friction = !self.enable_friction_reduction;
                self.finish_contact(eq, info, with_friction);
                num_contacts += 1;
            }
        }
        if self.enable_friction_reduction && num_contacts > 0 {
            self.create_friction_from_average(num_contacts, info);
        }
        num_contacts > 0
    }

    fn convex_convex(
        &mut self,
        hull_a: &ConvexPolyhedron,
        hull_b: &ConvexPolyhedron,
        info: &PairInfo,
    ) -> bool {
        let Some(sep_axis) =
            hull_a.find_separating_axis(hull_b, info.xi, info.qi, info.xj, info.qj)
        else {
            return false;
        };
        let contacts = hull_a.clip_against_hull(
            info.xi, info.qi, hull_b, info.xj, info.qj, sep_axis, -100.0, 100.0,
        );
        if contacts.is_empty() {
            return false;
        }
        if info.just_test {
            return true;
        }

        let count = contacts.len();
        for clip in contacts {
            let mut eq = self.create_contact_equation(info);
            let data = eq.contact_data_mut().unwrap();
            data.ni = -sep_axis;
            // Point on hull A: back the clip point out along its normal
            data.ri = (clip.point - clip.normal * clip.depth) - info.xi;
            data.rj = clip.point - info.xj;
            let with_friction = !self.enable_friction_reduction;
            self.finish_contact(eq, info, with_friction);
        }
        if self.enable_friction_reduction {
            self.create_friction_from_average(count, info);
        }
        true
    }

    fn sphere_heightfield(
        &mut self,
        sphere: &Sphere,
        field: &Heightfield,
        info: &PairInfo,
    ) -> bool {
        let transform = Transform::new(info.xj, info.qj);
        let local = transform.point_to_local(info.xi);
        let r = sphere.radius;

        // Sphere entirely above the field
        if local.z - r > field.max_value {
            return false;
        }

        let Some((x0, y0)) = field.get_index_of_position(local.x - r, local.y - r, true) else {
            return false;
        };
        let Some((x1, y1)) = field.get_index_of_position(local.x + r, local.y + r, true) else {
            return false;
        };

        let mut any = false;
        for xi in x0..=x1 {
            for yi in y0..=y1 {
                for upper in [false, true] {
                    let hit = field.with_pillar(xi, yi, upper, |convex, offset| {
                        let pillar_pos = transform.point_to_world(offset);
                        if (info.xi - pillar_pos).length()
                            > convex.bounding_sphere_radius() + r
                        {
                            return false;
                        }
                        let pillar_info = PairInfo {
                            xj: pillar_pos,
                            ..*info
                        };
                        self.sphere_convex(sphere, convex, &pillar_info)
                    });
                    any |= hit;
                    if hit && info.just_test {
                        return true;
                    }
                }
            }
        }
        any
    }

    fn convex_heightfield(
        &mut self,
        convex: &ConvexPolyhedron,
        field: &Heightfield,
        info: &PairInfo,
    ) -> bool {
        let transform = Transform::new(info.xj, info.qj);
        let local = transform.point_to_local(info.xi);
        let radius = convex.bounding_sphere_radius();

        if local.z - radius > field.max_value {
            return false;
        }

        let Some((x0, y0)) =
            field.get_index_of_position(local.x - radius, local.y - radius, true)
        else {
            return false;
        };
        let Some((x1, y1)) =
            field.get_index_of_position(local.x + radius, local.y + radius, true)
        else {
            return false;
        };

        let mut any = false;
        for xi in x0..=x1 {
            for yi in y0..=y1 {
                for upper in [false, true] {
                    let hit = field.with_pillar(xi, yi, upper, |pillar, offset| {
                        let pillar_pos = transform.point_to_world(offset);
                        if (info.xi - pillar_pos).length()
                            > pillar.bounding_sphere_radius() + radius
                        {
                            return false;
                        }
                        let pillar_info = PairInfo {
                            xj: pillar_pos,
                            ..*info
                        };
                        self.convex_convex(convex, pillar, &pillar_info)
                    });
                    any |= hit;
                    if hit && info.just_test {
                        return true;
                    }
                }
            }
        }
        any
    }

    fn sphere_particle(&mut self, sphere: &Sphere, info: &PairInfo) -> bool {
        // Sphere is i, particle is j
        let to_particle = info.xj - info.xi;
        if to_particle.length_squared() > sphere.radius * sphere.radius {
            return false;
        }
        if info.just_test {
            return true;
        }
        let ni = if to_particle.length_squared() > 0.0 {
            to_particle.normalize()
        } else {
            Vec3::Z
        };
        let mut eq = self.create_contact_equation(info);
        let data = eq.contact_data_mut().unwrap();
        data.ni = ni;
        data.ri = ni * sphere.radius;
        data.rj = Vec3::ZERO;
        self.finish_contact(eq, info, true);
        true
    }

    fn plane_particle(&mut self, info: &PairInfo) -> bool {
        // Plane is i, particle is j
        let world_normal = info.qi * Vec3::Z;
        let depth = world_normal.dot(info.xj - info.xi);
        if depth > 0.0 {
            return false;
        }
        if info.just_test {
            return true;
        }
        let mut eq = self.create_contact_equation(info);
        let data = eq.contact_data_mut().unwrap();
        data.ni = world_normal;
        data.ri = (info.xj - world_normal * depth) - info.xi;
        data.rj = Vec3::ZERO;
        self.finish_contact(eq, info, true);
        true
    }

    fn convex_particle(&mut self, convex: &ConvexPolyhedron, info: &PairInfo) -> bool {
        // Convex is i, particle is j
        let mut min_penetration: Option<f32> = None;
        let mut penetrated_normal = Vec3::ZERO;

        for (face_index, face) in convex.faces.iter().enumerate() {
            let world_normal = convex.world_face_normal(face_index, info.qi);
            let world_vertex = info.qi * convex.vertices[face[0]] + info.xi;
            let signed = world_normal.dot(info.xj - world_vertex);
            if signed > 0.0 {
                // Outside this face, no contact
                return false;
            }
            let penetration = -signed;
            if min_penetration.is_none() || penetration < min_penetration.unwrap() {
                min_penetration = Some(penetration);
                penetrated_normal = world_normal;
            }
        }

        let Some(penetration) = min_penetration else {
            return false;
        };
        if info.just_test {
            return true;
        }
        let mut eq = self.create_contact_equation(info);
        let data = eq.contact_data_mut().unwrap();
        data.ni = penetrated_normal;
        data.ri = (info.xj + penetrated_normal * penetration) - info.xi;
        data.rj = Vec3::ZERO;
        self.finish_contact(eq, info, true);
        true
    }

    fn plane_trimesh(&mut self, mesh: &Trimesh, info: &PairInfo) -> bool {
        // Plane is i, trimesh is j
        let world_normal = info.qi * Vec3::Z;
        let transform = Transform::new(info.xj, info.qj);
        let mut any = false;

        for v_index in 0..mesh.vertex_count() {
            let world_vertex = transform.point_to_world(mesh.get_vertex(v_index));
            let depth = world_normal.dot(world_vertex - info.xi);
            if depth <= 0.0 {
                if info.just_test {
                    return true;
                }
                let mut eq = self.create_contact_equation(info);
                let data = eq.contact_data_mut().unwrap();
                data.ni = world_normal;
                data.ri = (world_vertex - world_normal * depth) - info.xi;
                data.rj = world_vertex - info.xj;
                self.finish_contact(eq, info, true);
                any = true;
            }
        }
        any
    }

    fn sphere_trimesh(&mut self, sphere: &Sphere, mesh: &Trimesh, info: &PairInfo) -> bool {
        let transform = Transform::new(info.xj, info.qj);
        let local_sphere_pos = transform.point_to_local(info.xi);
        let r = sphere.radius;
        let r_squared = r * r;

        let mut candidates = Vec::new();
        mesh.get_triangles_in_aabb(
            &Aabb::from_center_half_extents(local_sphere_pos, Vec3::splat(r)),
            &mut candidates,
        );

        // Vertex contacts
        for &tri in &candidates {
            for &vi in &mesh.indices[tri as usize] {
                let v = mesh.get_vertex(vi as usize);
                if (v - local_sphere_pos).length_squared() <= r_squared {
                    if info.just_test {
                        return true;
                    }
                    let world_vertex = transform.point_to_world(v);
                    let ni = (world_vertex - info.xi).normalize_or_zero();
                    if ni == Vec3::ZERO {
                        continue;
                    }
                    let mut eq = self.create_contact_equation(info);
                    let data = eq.contact_data_mut().unwrap();
                    data.ni = ni;
                    data.ri = ni * r;
                    data.rj = world_vertex - info.xj;
                    self.finish_contact(eq, info, true);
                    return true;
                }
            }
        }

        // Edge contacts
        {
            use std::collections::HashSet;
            let mut seen = HashSet::new();
            for &tri in &candidates {
                let [a, b, c] = mesh.indices[tri as usize];
                for (ia, ib) in [(a, b), (b, c), (c, a)] {
                    if !seen.insert((ia.min(ib), ia.max(ib))) {
                        continue;
                    }
                    let va = mesh.get_vertex(ia as usize);
                    let vb = mesh.get_vertex(ib as usize);
                    let edge = vb - va;
                    let len_squared = edge.length_squared();
                    if len_squared == 0.0 {
                        continue;
                    }
                    let t = ((local_sphere_pos - va).dot(edge) / len_squared).clamp(0.0, 1.0);
                    let closest = va + edge * t;
                    if (closest - local_sphere_pos).length_squared() <= r_squared {
                        if info.just_test {
                            return true;
                        }
                        let world_closest = transform.point_to_world(closest);
                        let ni = (world_closest - info.xi).normalize_or_zero();
                        if ni == Vec3::ZERO {
                            continue;
                        }
                        let mut eq = self.create_contact_equation(info);
                        let data = eq.contact_data_mut().unwrap();
                        data.ni = ni;
                        data.ri = ni * r;
                        data.rj = world_closest - info.xj;
                        self.finish_contact(eq, info, true);
                        return true;
                    }
                }
            }
        }

        // Face contacts
        for &tri in &candidates {
            let tri = tri as usize;
            let normal = mesh.get_normal(tri);
            if normal == Vec3::ZERO {
                // Degenerate triangle
                continue;
            }
            let (va, vb, vc) = mesh.get_triangle_vertices(tri);
            let dist = (local_sphere_pos - va).dot(normal);
            if dist.abs() >= r {
                continue;
            }
            let projected = local_sphere_pos - normal * dist;
            if crate::collision::ray::point_in_triangle(projected, va, vb, vc) {
                if info.just_test {
                    return true;
                }
                let world_contact = transform.point_to_world(projected);
                let ni = (world_contact - info.xi).normalize_or_zero();
                if ni == Vec3::ZERO {
                    continue;
                }
                let mut eq = self.create_contact_equation(info);
                let data = eq.contact_data_mut().unwrap();
                data.ni = ni;
                data.ri = ni * r;
                data.rj = world_contact - info.xj;
                self.finish_contact(eq, info, true);
                return true;
            }
        }
        false
    }
}

/// True when `p` lies inside the planar polygon `verts` with the given
/// normal: every edge cross product lands on the same side.
fn point_in_polygon(verts: &[Vec3], normal: Vec3, p: Vec3) -> bool {
    let mut positive: Option<bool> = None;
    for i in 0..verts.len() {
        let v = verts[i];
        let edge = verts[(i + 1) % verts.len()] - v;
        let edge_x_normal = edge.cross(normal);
        let r = edge_x_normal.dot(p - v);
        match positive {
            None => positive = Some(r > 0.0),
            Some(sign) => {
                if (r > 0.0) != sign {
                    return false;
                }
            }
        }
    }
    true
}
