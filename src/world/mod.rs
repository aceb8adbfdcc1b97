//! The physics world: body arena, registries and step orchestration
//!
//! One `World` owns every simulation object. A step runs broadphase,
//! narrowphase, the constraint solver and integration in a fixed order,
//! then derives contact/trigger transition events by diffing the pair
//! dictionaries against the previous step.

pub mod events;

pub use events::{ContactInfo, WorldEvent};

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::body::{Body, SleepTransition};
use crate::collision::broad_phase::{Broadphase, NaiveBroadphase};
use crate::collision::narrow_phase::{Narrowphase, NarrowphaseInput};
use crate::collision::ray::{Ray, RayMode, RayOptions, RaycastResult};
use crate::constraints::Constraint;
use crate::equations::Equation;
use crate::material::{ContactMaterial, Material};
use crate::math::QuatExt;
use crate::shapes::Shape;
use crate::solver::{GsSolver, Solver};
use crate::utils::{CollisionMatrix, PairMap};

/// Plain-data world configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldOptions {
    pub gravity: Vec3,
    /// Skip the gravity force application entirely
    pub use_gravity: bool,
    /// Let inactive dynamic bodies fall asleep
    pub allow_sleep: bool,
    /// Normalize quaternions every `skip + 1` steps
    pub quat_normalize_skip: usize,
    /// Use the cheap one-Newton-step normalization
    pub quat_normalize_fast: bool,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            use_gravity: true,
            allow_sleep: false,
            quat_normalize_skip: 0,
            quat_normalize_fast: false,
        }
    }
}

pub struct World {
    pub gravity: Vec3,
    pub use_gravity: bool,
    pub allow_sleep: bool,
    pub quat_normalize_skip: usize,
    pub quat_normalize_fast: bool,

    /// Timestep used by the last `internal_step`
    pub dt: f32,
    /// Simulated time since world creation
    pub time: f32,
    pub step_number: usize,
    accumulator: f32,

    bodies: Vec<Body>,
    id_to_body_index: HashMap<u32, usize>,

    pub materials: Vec<Material>,
    pub contact_materials: Vec<ContactMaterial>,
    contact_material_table: PairMap<usize>,
    pub default_material: Material,
    pub default_contact_material: ContactMaterial,

    pub constraints: Vec<Constraint>,

    pub broadphase: Box<dyn Broadphase>,
    pub solver: Box<dyn Solver>,
    pub narrowphase: Narrowphase,

    /// Contact equations of the current step
    contacts: Vec<Equation>,
    friction_equations: Vec<Equation>,

    collision_matrix: CollisionMatrix,
    collision_matrix_previous: CollisionMatrix,
    trigger_matrix: CollisionMatrix,
    trigger_matrix_previous: CollisionMatrix,

    contacts_dic: PairMap<ContactInfo>,
    old_contacts_dic: PairMap<ContactInfo>,
    trigger_dic: PairMap<(u32, u32)>,
    old_trigger_dic: PairMap<(u32, u32)>,

    events: Vec<WorldEvent>,
    pairs_a: Vec<usize>,
    pairs_b: Vec<usize>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldOptions::default())
    }
}

impl World {
    pub fn new(options: WorldOptions) -> Self {
        Self {
            gravity: options.gravity,
            use_gravity: options.use_gravity,
            allow_sleep: options.allow_sleep,
            quat_normalize_skip: options.quat_normalize_skip,
            quat_normalize_fast: options.quat_normalize_fast,
            dt: -1.0,
            time: 0.0,
            step_number: 0,
            accumulator: 0.0,
            bodies: Vec::new(),
            id_to_body_index: HashMap::new(),
            materials: Vec::new(),
            contact_materials: Vec::new(),
            contact_material_table: PairMap::new(),
            default_material: Material::default(),
            default_contact_material: ContactMaterial::default_pair(),
            constraints: Vec::new(),
            broadphase: Box::new(NaiveBroadphase::new()),
            solver: Box::new(GsSolver::new()),
            narrowphase: Narrowphase::new(),
            contacts: Vec::new(),
            friction_equations: Vec::new(),
            collision_matrix: CollisionMatrix::new(),
            collision_matrix_previous: CollisionMatrix::new(),
            trigger_matrix: CollisionMatrix::new(),
            trigger_matrix_previous: CollisionMatrix::new(),
            contacts_dic: PairMap::new(),
            old_contacts_dic: PairMap::new(),
            trigger_dic: PairMap::new(),
            old_trigger_dic: PairMap::new(),
            events: Vec::new(),
            pairs_a: Vec::new(),
            pairs_b: Vec::new(),
        }
    }

    // ---- registries ----

    /// Insert a body into the arena. Returns its id.
    pub fn add_body(&mut self, mut body: Body) -> u32 {
        let id = body.id;
        body.index = self.bodies.len();
        body.aabb_needs_update = true;
        self.id_to_body_index.insert(id, body.index);
        self.bodies.push(body);
        self.events.push(WorldEvent::AddBody { body: id });
        debug!(body = id, "body added");
        id
    }

    /// Remove a body, dropping constraints that reference it and its
    /// collision bookkeeping.
    pub fn remove_body(&mut self, id: u32) -> Option<Body> {
        let index = self.id_to_body_index.remove(&id)?;
        let body = self.bodies.remove(index);
        for shifted in &mut self.bodies[index..] {
            shifted.index -= 1;
            self.id_to_body_index.insert(shifted.id, shifted.index);
        }
        self.constraints.retain(|c| c.body_a != id && c.body_b != id);
        self.collision_matrix.remove_id(id);
        self.collision_matrix_previous.remove_id(id);
        self.trigger_matrix.remove_id(id);
        self.trigger_matrix_previous.remove_id(id);
        self.events.push(WorldEvent::RemoveBody { body: id });
        debug!(body = id, "body removed");
        Some(body)
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    pub fn get_body_by_id(&self, id: u32) -> Option<&Body> {
        self.id_to_body_index.get(&id).map(|&index| &self.bodies[index])
    }

    pub fn get_body_by_id_mut(&mut self, id: u32) -> Option<&mut Body> {
        let index = *self.id_to_body_index.get(&id)?;
        Some(&mut self.bodies[index])
    }

    /// Resolve a shape id to its owning body and the shape itself.
    pub fn get_shape_by_id(&self, id: u32) -> Option<(&Body, &Shape)> {
        for body in &self.bodies {
            if let Some(shape) = body.shapes().iter().find(|s| s.id == id) {
                return Some((body, shape));
            }
        }
        None
    }

    /// Wake a body and report the transition.
    pub fn wake_up_body(&mut self, id: u32) {
        if let Some(index) = self.id_to_body_index.get(&id).copied() {
            if self.bodies[index].wake_up() {
                self.events.push(WorldEvent::Wakeup { body: id });
            }
        }
    }

    pub fn add_material(&mut self, material: Material) {
        self.materials.push(material);
    }

    /// Register a contact material for its material id pair.
    pub fn add_contact_material(&mut self, contact_material: ContactMaterial) {
        let (a, b) = contact_material.materials;
        self.contact_materials.push(contact_material);
        self.contact_material_table
            .set(a, b, self.contact_materials.len() - 1);
    }

    pub fn get_contact_material(&self, a: u32, b: u32) -> Option<&ContactMaterial> {
        self.contact_material_table
            .get(a, b)
            .map(|&index| &self.contact_materials[index])
    }

    /// Add a constraint and wake both of its bodies.
    pub fn add_constraint(&mut self, constraint: Constraint) -> u32 {
        let id = constraint.id;
        let (a, b) = (constraint.body_a, constraint.body_b);
        self.constraints.push(constraint);
        self.wake_up_body(a);
        self.wake_up_body(b);
        id
    }

    pub fn remove_constraint(&mut self, id: u32) -> Option<Constraint> {
        let index = self.constraints.iter().position(|c| c.id == id)?;
        Some(self.constraints.remove(index))
    }

    /// Drain the events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Contact equations produced by the last step.
    pub fn contacts(&self) -> &[Equation] {
        &self.contacts
    }

    pub fn clear_forces(&mut self) {
        for body in &mut self.bodies {
            body.force = Vec3::ZERO;
            body.torque = Vec3::ZERO;
        }
    }

    // ---- raycasts ----

    fn cast(
        &mut self,
        from: Vec3,
        to: Vec3,
        mode: RayMode,
        options: &RayOptions,
        result: &mut RaycastResult,
        callback: Option<&mut dyn FnMut(&mut RaycastResult)>,
    ) -> bool {
        let ray = Ray::new(from, to).with_options(mode, options);
        let mut indices = Vec::new();
        self.broadphase
            .aabb_query(&mut self.bodies, &ray.get_aabb(), &mut indices);
        ray.intersect_bodies(&self.bodies, &indices, result, callback)
    }

    /// Report every intersection along the segment to `callback`.
    pub fn raycast_all(
        &mut self,
        from: Vec3,
        to: Vec3,
        options: &RayOptions,
        callback: &mut dyn FnMut(&mut RaycastResult),
    ) -> bool {
        let mut result = RaycastResult::new();
        self.cast(from, to, RayMode::All, options, &mut result, Some(callback))
    }

    /// Stop at the first intersection found, in traversal order.
    pub fn raycast_any(
        &mut self,
        from: Vec3,
        to: Vec3,
        options: &RayOptions,
        result: &mut RaycastResult,
    ) -> bool {
        self.cast(from, to, RayMode::Any, options, result, None)
    }

    /// Keep only the nearest intersection.
    pub fn raycast_closest(
        &mut self,
        from: Vec3,
        to: Vec3,
        options: &RayOptions,
        result: &mut RaycastResult,
    ) -> bool {
        self.cast(from, to, RayMode::Closest, options, result, None)
    }

    // ---- stepping ----

    /// Fixed-timestep mode: advance exactly `dt`.
    pub fn step(&mut self, dt: f32) {
        self.internal_step(dt);
        self.time += dt;
    }

    /// Interpolated mode: accumulate wall-clock time, take up to
    /// `max_sub_steps` fixed steps and fill the interpolated transform
    /// fields with the leftover fraction.
    pub fn step_interpolated(&mut self, fixed_dt: f32, time_since_last: f32, max_sub_steps: usize) {
        self.accumulator += time_since_last;

        let mut substeps = 0;
        while self.accumulator >= fixed_dt && substeps < max_sub_steps {
            self.internal_step(fixed_dt);
            self.time += fixed_dt;
            self.accumulator -= fixed_dt;
            substeps += 1;
        }
        if self.accumulator >= fixed_dt {
            // Out of sub-step budget, drop the remainder
            warn!(
                dropped = self.accumulator - self.accumulator % fixed_dt,
                "physics accumulator exceeded sub-step budget, dropping time"
            );
            self.accumulator %= fixed_dt;
        }

        let alpha = (self.accumulator / fixed_dt).clamp(0.0, 1.0);
        for body in &mut self.bodies {
            body.interpolated_position = body.previous_position.lerp(body.position, alpha);
            body.interpolated_quaternion =
                body.previous_quaternion.slerp_to(body.quaternion, alpha);
        }
    }

    /// Leftover accumulated time, as a fraction of the fixed timestep.
    pub fn interpolation_alpha(&self, fixed_dt: f32) -> f32 {
        (self.accumulator / fixed_dt).clamp(0.0, 1.0)
    }

    fn collision_matrix_tick(&mut self) {
        std::mem::swap(&mut self.collision_matrix, &mut self.collision_matrix_previous);
        self.collision_matrix.reset();
        std::mem::swap(&mut self.trigger_matrix, &mut self.trigger_matrix_previous);
        self.trigger_matrix.reset();
    }

    fn internal_step(&mut self, dt: f32) {
        self.dt = dt;

        self.collision_matrix_tick();

        // Gravity as a force, so it passes through the solver
        if self.use_gravity {
            let gravity = self.gravity;
            for body in &mut self.bodies {
                if body.is_dynamic() {
                    body.force += gravity * body.mass;
                }
            }
        }

        // Broadphase
        let mut pairs_a = std::mem::take(&mut self.pairs_a);
        let mut pairs_b = std::mem::take(&mut self.pairs_b);
        self.broadphase
            .collision_pairs(&mut self.bodies, &mut pairs_a, &mut pairs_b);

        // Drop pairs whose constraint opted out of self-collision
        for constraint in &self.constraints {
            if constraint.collide_connected {
                continue;
            }
            let (ida, idb) = (constraint.body_a, constraint.body_b);
            let mut k = 0;
            while k < pairs_a.len() {
                let (a, b) = (self.bodies[pairs_a[k]].id, self.bodies[pairs_b[k]].id);
                if (a == ida && b == idb) || (a == idb && b == ida) {
                    pairs_a.remove(k);
                    pairs_b.remove(k);
                } else {
                    k += 1;
                }
            }
        }

        // Narrowphase
        let old_contacts = std::mem::take(&mut self.contacts);
        let old_friction = std::mem::take(&mut self.friction_equations);
        self.narrowphase.release_equations(old_contacts, old_friction);
        let input = NarrowphaseInput {
            dt,
            gravity_norm: self.gravity.length(),
            default_contact_material: &self.default_contact_material,
            contact_material_table: &self.contact_material_table,
            contact_materials: &self.contact_materials,
        };
        self.narrowphase
            .get_contacts(&pairs_a, &pairs_b, &self.bodies, &input);
        let (contacts, friction) = self.narrowphase.take_results();
        self.contacts = contacts;
        self.friction_equations = friction;

        self.pairs_a = pairs_a;
        self.pairs_b = pairs_b;

        // Trigger overlaps into the trigger dictionary and matrix
        for overlap in self.narrowphase.trigger_overlaps().to_vec() {
            self.trigger_matrix.set(overlap.body_a, overlap.body_b, true);
            self.trigger_dic.set(
                overlap.body_a,
                overlap.body_b,
                (overlap.shape_a, overlap.shape_b),
            );
        }

        // Contact bookkeeping: collision matrix, pair dictionary, first
        // touch events and wake-on-contact flags
        for contact_index in 0..self.contacts.len() {
            let eq = &self.contacts[contact_index];
            let (bi, bj) = (eq.bi, eq.bj);
            let (id_i, id_j) = (self.bodies[bi].id, self.bodies[bj].id);

            // A sleeping body touched by a fast-moving one wakes after
            // the step
            for (sleeper, mover) in [(bi, bj), (bj, bi)] {
                let s = &self.bodies[sleeper];
                let m = &self.bodies[mover];
                if s.allow_sleep
                    && s.is_dynamic()
                    && s.is_sleeping()
                    && m.is_awake()
                    && !m.is_static()
                {
                    let speed_squared =
                        m.velocity.length_squared() + m.angular_velocity.length_squared();
                    let limit_squared = m.sleep_speed_limit * m.sleep_speed_limit * 2.0;
                    if speed_squared >= limit_squared {
                        self.bodies[sleeper].wake_up_after_narrowphase = true;
                    }
                }
            }

            self.collision_matrix.set(id_i, id_j, true);
            let eq = &self.contacts[contact_index];
            let data = eq.contact_data().expect("contact list holds contacts");
            let info = ContactInfo {
                body_a: id_i,
                body_b: id_j,
                shape_a: eq.si,
                shape_b: eq.sj,
                normal: data.ni,
                ri: data.ri,
                rj: data.rj,
                impact_velocity: eq.impact_velocity_along_normal(&self.bodies[bi], &self.bodies[bj]),
            };
            if !self.collision_matrix_previous.get(id_i, id_j) {
                // First touch this pair, report on both bodies
                self.events.push(WorldEvent::Collide {
                    body: id_i,
                    other: id_j,
                    contact: info.clone(),
                });
                self.events.push(WorldEvent::Collide {
                    body: id_j,
                    other: id_i,
                    contact: info.clone(),
                });
            }
            self.contacts_dic.set(id_i, id_j, info);
        }

        for index in 0..self.bodies.len() {
            if self.bodies[index].wake_up_after_narrowphase {
                let id = self.bodies[index].id;
                if self.bodies[index].wake_up() {
                    self.events.push(WorldEvent::Wakeup { body: id });
                }
            }
        }

        // User constraints
        for constraint in &mut self.constraints {
            let (Some(&ia), Some(&ib)) = (
                self.id_to_body_index.get(&constraint.body_a),
                self.id_to_body_index.get(&constraint.body_b),
            ) else {
                continue;
            };
            constraint.update(&self.bodies, ia, ib, dt);
        }

        // Solve
        for body in &mut self.bodies {
            body.update_solve_mass_properties();
        }
        let mut equations: Vec<&mut Equation> = Vec::with_capacity(
            self.contacts.len() + self.friction_equations.len(),
        );
        equations.extend(self.contacts.iter_mut());
        equations.extend(self.friction_equations.iter_mut());
        for constraint in self.constraints.iter_mut().filter(|c| c.enabled) {
            equations.extend(constraint.equations.iter_mut());
        }
        self.solver.solve(dt, &mut self.bodies, &mut equations);

        // Integrate
        let quat_normalize = self.step_number % (self.quat_normalize_skip + 1) == 0;
        let quat_normalize_fast = self.quat_normalize_fast;
        for body in &mut self.bodies {
            body.integrate(dt, quat_normalize, quat_normalize_fast);
        }

        self.clear_forces();

        self.emit_trigger_events();
        self.emit_collision_events();

        // Sleep bookkeeping runs last so its events follow the contact
        // events of the same step
        if self.allow_sleep {
            let time = self.time;
            for index in 0..self.bodies.len() {
                let id = self.bodies[index].id;
                match self.bodies[index].sleep_tick(time) {
                    Some(SleepTransition::BecameSleepy) => {
                        self.events.push(WorldEvent::Sleepy { body: id })
                    }
                    Some(SleepTransition::FellAsleep) => {
                        self.events.push(WorldEvent::Sleep { body: id })
                    }
                    None => {}
                }
            }
        }

        self.step_number += 1;
    }

    /// Begin/end trigger transitions from the dictionary diff.
    fn emit_trigger_events(&mut self) {
        for ((a, b), &(shape_a, shape_b)) in self.trigger_dic.iter() {
            if !self.old_trigger_dic.contains(a, b) {
                self.events.push(WorldEvent::BeginTrigger {
                    body_a: a,
                    body_b: b,
                    shape_a,
                    shape_b,
                });
            }
        }
        for ((a, b), &(shape_a, shape_b)) in self.old_trigger_dic.iter() {
            if !self.trigger_dic.contains(a, b) {
                self.events.push(WorldEvent::EndTrigger {
                    body_a: a,
                    body_b: b,
                    shape_a,
                    shape_b,
                });
            }
        }
        std::mem::swap(&mut self.trigger_dic, &mut self.old_trigger_dic);
        self.trigger_dic.clear();
    }

    /// Begin/end contact transitions from the dictionary diff.
    fn emit_collision_events(&mut self) {
        for ((a, b), _) in self.contacts_dic.iter() {
            if !self.old_contacts_dic.contains(a, b) {
                self.events.push(WorldEvent::BeginContact { body_a: a, body_b: b });
            }
        }
        for ((a, b), _) in self.old_contacts_dic.iter() {
            if !self.contacts_dic.contains(a, b) {
                self.events.push(WorldEvent::EndContact { body_a: a, body_b: b });
            }
        }
        std::mem::swap(&mut self.contacts_dic, &mut self.old_contacts_dic);
        self.contacts_dic.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyOptions;
    use glam::Quat;

    fn sphere_body(mass: f32, position: Vec3) -> Body {
        let mut b = Body::new(BodyOptions {
            mass,
            position,
            ..Default::default()
        });
        b.add_shape_centered(Shape::sphere(1.0).unwrap());
        b
    }

    #[test]
    fn test_add_remove_body() {
        let mut world = World::default();
        let a = world.add_body(sphere_body(1.0, Vec3::ZERO));
        let b = world.add_body(sphere_body(1.0, Vec3::X));
        assert_eq!(world.bodies().len(), 2);
        assert!(world.get_body_by_id(a).is_some());

        world.remove_body(a);
        assert_eq!(world.bodies().len(), 1);
        assert!(world.get_body_by_id(a).is_none());
        // The remaining body was reindexed
        assert_eq!(world.get_body_by_id(b).unwrap().index, 0);

        let events = world.take_events();
        assert!(matches!(events[0], WorldEvent::AddBody { body } if body == a));
        assert!(matches!(events[2], WorldEvent::RemoveBody { body } if body == a));
    }

    #[test]
    fn test_remove_body_drops_its_constraints() {
        let mut world = World::default();
        let a = world.add_body(sphere_body(1.0, Vec3::ZERO));
        let b = world.add_body(sphere_body(1.0, Vec3::X));
        world.add_constraint(Constraint::distance(a, b, 1.0, 1e6));
        assert_eq!(world.constraints.len(), 1);
        world.remove_body(a);
        assert!(world.constraints.is_empty());
    }

    #[test]
    fn test_gravity_applies_to_dynamic_only() {
        let mut world = World::new(WorldOptions {
            gravity: Vec3::new(0.0, 0.0, -10.0),
            ..Default::default()
        });
        let dynamic = world.add_body(sphere_body(1.0, Vec3::ZERO));
        let fixed = world.add_body(sphere_body(0.0, Vec3::new(10.0, 0.0, 0.0)));
        world.step(1.0 / 60.0);
        assert!(world.get_body_by_id(dynamic).unwrap().velocity.z < 0.0);
        assert_eq!(world.get_body_by_id(fixed).unwrap().velocity, Vec3::ZERO);
    }

    #[test]
    fn test_use_gravity_flag() {
        let mut world = World::new(WorldOptions {
            gravity: Vec3::new(0.0, 0.0, -10.0),
            use_gravity: false,
            ..Default::default()
        });
        let id = world.add_body(sphere_body(1.0, Vec3::ZERO));
        world.step(1.0 / 60.0);
        assert_eq!(world.get_body_by_id(id).unwrap().velocity, Vec3::ZERO);
    }

    #[test]
    fn test_time_and_step_number_advance() {
        let mut world = World::default();
        world.step(1.0 / 60.0);
        world.step(1.0 / 60.0);
        assert_eq!(world.step_number, 2);
        assert!((world.time - 2.0 / 60.0).abs() < 1e-6);
        assert!((world.dt - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolated_step_fills_interpolation() {
        let mut world = World::default();
        let id = world.add_body({
            let mut b = Body::new(BodyOptions {
                mass: 1.0,
                linear_damping: 0.0,
                ..Default::default()
            });
            b.add_shape_centered(Shape::sphere(1.0).unwrap());
            b
        });
        world.get_body_by_id_mut(id).unwrap().velocity = Vec3::new(60.0, 0.0, 0.0);

        let fixed_dt = 1.0 / 60.0;
        // One and a half timesteps: one sub-step, alpha 0.5
        world.step_interpolated(fixed_dt, fixed_dt * 1.5, 10);
        assert_eq!(world.step_number, 1);
        let body = world.get_body_by_id(id).unwrap();
        assert!((body.position.x - 1.0).abs() < 1e-5);
        assert!((body.interpolated_position.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_sub_step_budget_caps_steps() {
        let mut world = World::default();
        world.add_body(sphere_body(1.0, Vec3::ZERO));
        world.step_interpolated(1.0 / 60.0, 1.0, 3);
        assert_eq!(world.step_number, 3);
    }

    #[test]
    fn test_begin_end_contact_events() {
        let mut world = World::new(WorldOptions {
            gravity: Vec3::ZERO,
            ..Default::default()
        });
        let a = world.add_body(sphere_body(1.0, Vec3::ZERO));
        let b = world.add_body(sphere_body(1.0, Vec3::new(1.5, 0.0, 0.0)));
        world.step(1.0 / 60.0);
        let events = world.take_events();
        assert!(events.iter().any(|e| matches!(e, WorldEvent::BeginContact { .. })));
        assert!(events
            .iter()
            .filter(|e| matches!(e, WorldEvent::Collide { .. }))
            .count()
            == 2);

        // Separate the pair, the contact must end
        world.get_body_by_id_mut(b).unwrap().position = Vec3::new(10.0, 0.0, 0.0);
        world.get_body_by_id_mut(b).unwrap().aabb_needs_update = true;
        world.step(1.0 / 60.0);
        let events = world.take_events();
        assert!(events.iter().any(
            |e| matches!(e, WorldEvent::EndContact { body_a, body_b } if (*body_a, *body_b) == (a.min(b), a.max(b)))
        ));
    }

    #[test]
    fn test_trigger_events() {
        let mut world = World::default();
        let _a = world.add_body({
            let mut b = Body::new(BodyOptions::dynamic(1.0));
            b.add_shape_centered(Shape::sphere(1.0).unwrap().as_trigger());
            b
        });
        let b = world.add_body(sphere_body(1.0, Vec3::new(1.0, 0.0, 0.0)));
        world.step(1.0 / 60.0);
        let events = world.take_events();
        assert!(events.iter().any(|e| matches!(e, WorldEvent::BeginTrigger { .. })));
        // Trigger produced no contact equations
        assert!(world.contacts().is_empty());

        world.get_body_by_id_mut(b).unwrap().position = Vec3::new(10.0, 0.0, 0.0);
        world.get_body_by_id_mut(b).unwrap().aabb_needs_update = true;
        world.step(1.0 / 60.0);
        let events = world.take_events();
        assert!(events.iter().any(|e| matches!(e, WorldEvent::EndTrigger { .. })));
    }

    #[test]
    fn test_raycast_closest_through_world() {
        let mut world = World::default();
        world.add_body(sphere_body(0.0, Vec3::ZERO));
        let mut result = RaycastResult::new();
        let hit = world.raycast_closest(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, -10.0),
            &RayOptions::default(),
            &mut result,
        );
        assert!(hit);
        assert!((result.hit_point_world.z - 1.0).abs() < 1e-4);
        assert!((result.distance - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_constraint_keeps_bodies_apart() {
        let mut world = World::default();
        let a = world.add_body(sphere_body(1.0, Vec3::ZERO));
        let b = world.add_body(sphere_body(1.0, Vec3::new(4.0, 0.0, 0.0)));
        world.add_constraint(Constraint::distance(a, b, 2.0, 1e6));
        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }
        let pa = world.get_body_by_id(a).unwrap().position;
        let pb = world.get_body_by_id(b).unwrap().position;
        assert!(((pa - pb).length() - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_quaternion_stays_normalized() {
        let mut world = World::default();
        let id = world.add_body(sphere_body(1.0, Vec3::ZERO));
        world.get_body_by_id_mut(id).unwrap().angular_velocity = Vec3::new(3.0, 2.0, 1.0);
        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }
        let q: Quat = world.get_body_by_id(id).unwrap().quaternion;
        assert!((q.length() - 1.0).abs() < 1e-3);
    }
}
