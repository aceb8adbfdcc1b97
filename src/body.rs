//! Rigid body state and integration

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::aabb::Aabb;
use crate::ids;
use crate::material::Material;
use crate::math::{QuatExt, Transform};
use crate::shapes::Shape;

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BodyType {
    /// Moved by forces and impulses, full collision response
    Dynamic = 1,
    /// Never moves; infinite mass
    Static = 2,
    /// Infinite mass, moved by velocity only
    Kinematic = 4,
}

/// Sleep state machine: `Awake -> Sleepy -> Sleeping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SleepState {
    Awake = 0,
    Sleepy = 1,
    Sleeping = 2,
}

/// Transition reported by [`Body::sleep_tick`] so the world can emit the
/// matching event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTransition {
    BecameSleepy,
    FellAsleep,
}

/// Construction parameters for [`Body`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyOptions {
    pub mass: f32,
    /// Defaults to `Dynamic` when mass is positive, else `Static`
    pub body_type: Option<BodyType>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub quaternion: Quat,
    pub angular_velocity: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub sleep_speed_limit: f32,
    pub sleep_time_limit: f32,
    pub collision_filter_group: i32,
    pub collision_filter_mask: i32,
    pub collision_response: bool,
    pub fixed_rotation: bool,
    pub material: Option<Material>,
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            mass: 0.0,
            body_type: None,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            linear_damping: 0.01,
            angular_damping: 0.01,
            allow_sleep: true,
            sleep_speed_limit: 0.1,
            sleep_time_limit: 1.0,
            collision_filter_group: 1,
            collision_filter_mask: -1,
            collision_response: true,
            fixed_rotation: false,
            material: None,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
        }
    }
}

impl BodyOptions {
    pub fn dynamic(mass: f32) -> Self {
        Self {
            mass,
            body_type: Some(BodyType::Dynamic),
            ..Default::default()
        }
    }

    pub fn kinematic() -> Self {
        Self {
            body_type: Some(BodyType::Kinematic),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }
}

/// A rigid body: state vector, mass properties and attached shapes.
#[derive(Debug, Clone)]
pub struct Body {
    /// Unique body id, assigned at construction
    pub id: u32,
    /// Slot in the world body arena, maintained by add/remove
    pub(crate) index: usize,
    pub body_type: BodyType,

    pub position: Vec3,
    pub previous_position: Vec3,
    pub interpolated_position: Vec3,
    pub init_position: Vec3,

    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force: Vec3,
    pub torque: Vec3,

    pub quaternion: Quat,
    pub previous_quaternion: Quat,
    pub interpolated_quaternion: Quat,
    pub init_quaternion: Quat,

    pub mass: f32,
    pub inv_mass: f32,
    /// Principal-axis inertia diagonal
    pub inertia: Vec3,
    pub inv_inertia: Vec3,
    pub inv_inertia_world: Mat3,
    /// Solve-time copies; zero while sleeping or non-dynamic
    pub inv_mass_solve: f32,
    pub inv_inertia_solve: Vec3,
    pub inv_inertia_world_solve: Mat3,

    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Componentwise motion gates in [0, 1]
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
    pub fixed_rotation: bool,

    pub sleep_state: SleepState,
    pub allow_sleep: bool,
    pub sleep_speed_limit: f32,
    pub sleep_time_limit: f32,
    pub time_last_sleepy: f32,
    pub(crate) wake_up_after_narrowphase: bool,

    pub collision_filter_group: i32,
    pub collision_filter_mask: i32,
    pub collision_response: bool,

    pub material: Option<Material>,

    shapes: Vec<Shape>,
    shape_offsets: Vec<Vec3>,
    shape_orientations: Vec<Quat>,
    /// True when any attached shape is a trigger
    pub has_trigger: bool,

    pub aabb: Aabb,
    pub aabb_needs_update: bool,
    pub bounding_radius: f32,

    /// Solver scratch, folded into the velocities after each solve
    pub(crate) vlambda: Vec3,
    pub(crate) wlambda: Vec3,
}

impl Body {
    pub fn new(options: BodyOptions) -> Self {
        let body_type = options.body_type.unwrap_or(if options.mass > 0.0 {
            BodyType::Dynamic
        } else {
            BodyType::Static
        });
        let mass = if body_type == BodyType::Dynamic {
            options.mass
        } else {
            0.0
        };

        let mut body = Self {
            id: ids::next_body_id(),
            index: usize::MAX,
            body_type,
            position: options.position,
            previous_position: options.position,
            interpolated_position: options.position,
            init_position: options.position,
            velocity: options.velocity,
            angular_velocity: options.angular_velocity,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            quaternion: options.quaternion,
            previous_quaternion: options.quaternion,
            interpolated_quaternion: options.quaternion,
            init_quaternion: options.quaternion,
            mass,
            inv_mass: 0.0,
            inertia: Vec3::ZERO,
            inv_inertia: Vec3::ZERO,
            inv_inertia_world: Mat3::ZERO,
            inv_mass_solve: 0.0,
            inv_inertia_solve: Vec3::ZERO,
            inv_inertia_world_solve: Mat3::ZERO,
            linear_damping: options.linear_damping,
            angular_damping: options.angular_damping,
            linear_factor: options.linear_factor,
            angular_factor: options.angular_factor,
            fixed_rotation: options.fixed_rotation,
            sleep_state: SleepState::Awake,
            allow_sleep: options.allow_sleep,
            sleep_speed_limit: options.sleep_speed_limit,
            sleep_time_limit: options.sleep_time_limit,
            time_last_sleepy: 0.0,
            wake_up_after_narrowphase: false,
            collision_filter_group: options.collision_filter_group,
            collision_filter_mask: options.collision_filter_mask,
            collision_response: options.collision_response,
            material: options.material,
            shapes: Vec::new(),
            shape_offsets: Vec::new(),
            shape_orientations: Vec::new(),
            has_trigger: false,
            aabb: Aabb::default(),
            aabb_needs_update: true,
            bounding_radius: 0.0,
            vlambda: Vec3::ZERO,
            wlambda: Vec3::ZERO,
        };
        body.update_mass_properties();
        body
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    pub fn is_awake(&self) -> bool {
        self.sleep_state == SleepState::Awake
    }

    /// Force the body awake. Returns true when it was sleeping, so the
    /// caller can emit a wakeup event.
    pub fn wake_up(&mut self) -> bool {
        let was_sleeping = self.sleep_state == SleepState::Sleeping;
        self.sleep_state = SleepState::Awake;
        self.wake_up_after_narrowphase = false;
        was_sleeping
    }

    /// Put the body to sleep immediately, zeroing its motion.
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.wake_up_after_narrowphase = false;
    }

    /// Advance the sleep state machine. Called once per step with the
    /// world time.
    pub fn sleep_tick(&mut self, time: f32) -> Option<SleepTransition> {
        if !self.allow_sleep || self.body_type != BodyType::Dynamic {
            return None;
        }
        let speed_squared = self.velocity.length_squared() + self.angular_velocity.length_squared();
        let speed_limit_squared = self.sleep_speed_limit * self.sleep_speed_limit;
        match self.sleep_state {
            SleepState::Awake if speed_squared < speed_limit_squared => {
                self.sleep_state = SleepState::Sleepy;
                self.time_last_sleepy = time;
                Some(SleepTransition::BecameSleepy)
            }
            SleepState::Sleepy if speed_squared >= speed_limit_squared => {
                self.wake_up();
                None
            }
            SleepState::Sleepy if time - self.time_last_sleepy > self.sleep_time_limit => {
                self.sleep();
                Some(SleepTransition::FellAsleep)
            }
            _ => None,
        }
    }

    /// Zero the solve-time mass fields while sleeping or non-dynamic so
    /// the solver sees empty rows for this body.
    pub fn update_solve_mass_properties(&mut self) {
        if self.sleep_state == SleepState::Sleeping || self.body_type != BodyType::Dynamic {
            self.inv_mass_solve = 0.0;
            self.inv_inertia_solve = Vec3::ZERO;
            self.inv_inertia_world_solve = Mat3::ZERO;
        } else {
            self.inv_mass_solve = self.inv_mass;
            self.inv_inertia_solve = self.inv_inertia;
            self.inv_inertia_world_solve = self.inv_inertia_world;
        }
    }

    pub fn point_to_local_frame(&self, world_point: Vec3) -> Vec3 {
        Transform::point_to_local_frame(self.position, self.quaternion, world_point)
    }

    pub fn point_to_world_frame(&self, local_point: Vec3) -> Vec3 {
        Transform::point_to_world_frame(self.position, self.quaternion, local_point)
    }

    pub fn vector_to_local_frame(&self, world_vector: Vec3) -> Vec3 {
        Transform::vector_to_local_frame(self.quaternion, world_vector)
    }

    pub fn vector_to_world_frame(&self, local_vector: Vec3) -> Vec3 {
        Transform::vector_to_world_frame(self.quaternion, local_vector)
    }

    /// Accumulate a world-space force applied at a point relative to the
    /// center of mass.
    pub fn apply_force(&mut self, force: Vec3, relative_point: Vec3) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.force += force;
        self.torque += relative_point.cross(force);
    }

    /// Force and application point given in the body frame.
    pub fn apply_local_force(&mut self, local_force: Vec3, local_point: Vec3) {
        let world_force = self.vector_to_world_frame(local_force);
        let relative_point = self.vector_to_world_frame(local_point);
        self.apply_force(world_force, relative_point);
    }

    /// Instantaneous momentum change at a point relative to the center
    /// of mass.
    pub fn apply_impulse(&mut self, impulse: Vec3, relative_point: Vec3) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.velocity += impulse * self.inv_mass * self.linear_factor;
        let rotational = relative_point.cross(impulse);
        self.angular_velocity += (self.inv_inertia_world * rotational) * self.angular_factor;
    }

    pub fn apply_local_impulse(&mut self, local_impulse: Vec3, local_point: Vec3) {
        let world_impulse = self.vector_to_world_frame(local_impulse);
        let relative_point = self.vector_to_world_frame(local_point);
        self.apply_impulse(world_impulse, relative_point);
    }

    /// Attach a shape at an offset and orientation in the body frame.
    /// Returns the shape id.
    pub fn add_shape(&mut self, mut shape: Shape, offset: Vec3, orientation: Quat) -> u32 {
        let shape_id = shape.id;
        shape.body_id = Some(self.id);
        self.shapes.push(shape);
        self.shape_offsets.push(offset);
        self.shape_orientations.push(orientation);
        self.update_mass_properties();
        self.update_bounding_radius();
        self.update_has_trigger();
        self.aabb_needs_update = true;
        shape_id
    }

    /// Attach a shape at the center of mass.
    pub fn add_shape_centered(&mut self, shape: Shape) -> u32 {
        self.add_shape(shape, Vec3::ZERO, Quat::IDENTITY)
    }

    /// Detach a shape by id.
    pub fn remove_shape(&mut self, shape_id: u32) -> Option<Shape> {
        let index = self.shapes.iter().position(|s| s.id == shape_id)?;
        let mut shape = self.shapes.remove(index);
        self.shape_offsets.remove(index);
        self.shape_orientations.remove(index);
        shape.body_id = None;
        self.update_mass_properties();
        self.update_bounding_radius();
        self.update_has_trigger();
        self.aabb_needs_update = true;
        Some(shape)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut [Shape] {
        &mut self.shapes
    }

    pub fn shape_offsets(&self) -> &[Vec3] {
        &self.shape_offsets
    }

    pub fn shape_orientations(&self) -> &[Quat] {
        &self.shape_orientations
    }

    /// World transform of shape `index`.
    pub fn shape_world_transform(&self, index: usize) -> (Vec3, Quat) {
        (
            self.quaternion * self.shape_offsets[index] + self.position,
            self.quaternion * self.shape_orientations[index],
        )
    }

    fn update_has_trigger(&mut self) {
        self.has_trigger = self.shapes.iter().any(|s| s.is_trigger);
    }

    /// Recompute inverse mass and inertia. The aggregate inertia is
    /// approximated by the box spanning the body AABB.
    pub fn update_mass_properties(&mut self) {
        self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };
        self.compute_aabb();

        let half = self.aabb.half_extents();
        let x = 2.0 * half.x;
        let y = 2.0 * half.y;
        let z = 2.0 * half.z;
        let factor = self.mass / 12.0;
        self.inertia = if self.fixed_rotation {
            Vec3::ZERO
        } else {
            Vec3::new(
                factor * (y * y + z * z),
                factor * (x * x + z * z),
                factor * (x * x + y * y),
            )
        };
        self.inv_inertia = Vec3::new(
            if self.inertia.x > 0.0 { 1.0 / self.inertia.x } else { 0.0 },
            if self.inertia.y > 0.0 { 1.0 / self.inertia.y } else { 0.0 },
            if self.inertia.z > 0.0 { 1.0 / self.inertia.z } else { 0.0 },
        );
        self.update_inertia_world(true);
    }

    /// Rotate the inverse inertia diagonal into the world frame.
    pub fn update_inertia_world(&mut self, force: bool) {
        let i = self.inv_inertia;
        if i.x == i.y && i.y == i.z && !force {
            // Isotropic tensor is rotation invariant
            return;
        }
        let r = Mat3::from_quat(self.quaternion);
        self.inv_inertia_world = (r * Mat3::from_diagonal(i)) * r.transpose();
    }

    /// Aggregate world AABB over all attached shapes.
    pub fn compute_aabb(&mut self) {
        if self.shapes.is_empty() {
            self.aabb = Aabb::new(self.position, self.position);
        } else {
            let mut aabb = Aabb::inverted();
            for index in 0..self.shapes.len() {
                let (pos, quat) = self.shape_world_transform(index);
                aabb.extend(&self.shapes[index].calculate_world_aabb(pos, quat));
            }
            self.aabb = aabb;
        }
        self.aabb_needs_update = false;
    }

    pub fn update_bounding_radius(&mut self) {
        let mut radius: f32 = 0.0;
        for (shape, offset) in self.shapes.iter().zip(&self.shape_offsets) {
            radius = radius.max(offset.length() + shape.bounding_sphere_radius);
        }
        self.bounding_radius = radius;
    }

    /// Advance position and orientation one timestep.
    pub fn integrate(&mut self, dt: f32, quat_normalize: bool, quat_normalize_fast: bool) {
        self.previous_position = self.position;
        self.previous_quaternion = self.quaternion;

        let moving = self.body_type == BodyType::Dynamic || self.body_type == BodyType::Kinematic;
        if !moving || self.sleep_state == SleepState::Sleeping {
            return;
        }

        if self.body_type == BodyType::Dynamic {
            self.velocity += self.force * (self.inv_mass * dt) * self.linear_factor;
            self.angular_velocity +=
                (self.inv_inertia_world * (self.torque * dt)) * self.angular_factor;

            self.velocity *= (1.0 - self.linear_damping).powf(dt);
            self.angular_velocity *= (1.0 - self.angular_damping).powf(dt);
        }

        self.position += self.velocity * dt;
        self.quaternion =
            self.quaternion
                .integrate_angular_velocity(self.angular_velocity, dt, self.angular_factor);
        if quat_normalize {
            self.quaternion = if quat_normalize_fast {
                self.quaternion.normalize_fast()
            } else {
                self.quaternion.normalize_safe()
            };
        }

        self.aabb_needs_update = true;
        self.update_inertia_world(false);
    }

    /// Principal inertia of a single shape, exposed for diagnostics.
    pub fn shape_local_inertia(&self, index: usize) -> Vec3 {
        self.shapes[index].calculate_local_inertia(self.mass)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new(BodyOptions::default())
    }
}
