//! SPOOK-form constraint equations
//!
//! Every equation row is `G·v = rhs` with a regularization `eps` and
//! clamped multiplier bounds. Contact rows carry the penetration and
//! restitution terms; friction rows are purely tangential. User
//! constraints (distance, point-to-point) reuse the contact form with
//! zero restitution, exactly like the contact pipeline does.

use glam::Vec3;

use crate::body::Body;
use crate::ids;
use crate::math::JacobianElement;

/// Default force bounds, in newtons.
pub const DEFAULT_MAX_FORCE: f32 = 1e6;

/// Normal contact payload. `ri`/`rj` point from each body's center of
/// mass to the contact, world oriented; `ni` points out of body `i`.
#[derive(Debug, Clone, Copy)]
pub struct ContactData {
    pub ri: Vec3,
    pub rj: Vec3,
    pub ni: Vec3,
    pub restitution: f32,
}

impl Default for ContactData {
    fn default() -> Self {
        Self {
            ri: Vec3::ZERO,
            rj: Vec3::ZERO,
            ni: Vec3::ZERO,
            restitution: 0.0,
        }
    }
}

/// Tangential friction payload; `t` is one of the two contact tangents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrictionData {
    pub ri: Vec3,
    pub rj: Vec3,
    pub t: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub enum EquationKind {
    Contact(ContactData),
    Friction(FrictionData),
}

/// One solver row between two bodies.
#[derive(Debug, Clone)]
pub struct Equation {
    pub id: u32,
    /// Arena indices of the two bodies, valid for the current step
    pub bi: usize,
    pub bj: usize,
    /// Shape ids for event reporting; `u32::MAX` for user constraints
    pub si: u32,
    pub sj: u32,
    pub min_force: f32,
    pub max_force: f32,
    /// SPOOK parameters derived from stiffness/relaxation/timestep
    pub a: f32,
    pub b: f32,
    pub eps: f32,
    pub jacobian_a: JacobianElement,
    pub jacobian_b: JacobianElement,
    pub enabled: bool,
    /// Accumulated multiplier from the last solve
    pub multiplier: f32,
    pub kind: EquationKind,
}

impl Default for Equation {
    fn default() -> Self {
        Self {
            id: ids::next_equation_id(),
            bi: 0,
            bj: 0,
            si: u32::MAX,
            sj: u32::MAX,
            min_force: -DEFAULT_MAX_FORCE,
            max_force: DEFAULT_MAX_FORCE,
            a: 0.0,
            b: 0.0,
            eps: 0.0,
            jacobian_a: JacobianElement::default(),
            jacobian_b: JacobianElement::default(),
            enabled: true,
            multiplier: 0.0,
            kind: EquationKind::Contact(ContactData::default()),
        }
    }
}

impl Equation {
    /// Recompute the SPOOK scalars from stiffness `k`, relaxation `d`
    /// and timestep `h`.
    pub fn set_spook_params(&mut self, stiffness: f32, relaxation: f32, dt: f32) {
        let k = stiffness;
        let d = relaxation;
        let h = dt;
        self.a = 4.0 / (h * (1.0 + 4.0 * d));
        self.b = (4.0 * d) / (1.0 + 4.0 * d);
        self.eps = 4.0 / (h * h * k * (1.0 + 4.0 * d));
    }

    pub fn contact_data(&self) -> Option<&ContactData> {
        match &self.kind {
            EquationKind::Contact(data) => Some(data),
            EquationKind::Friction(_) => None,
        }
    }

    pub fn contact_data_mut(&mut self) -> Option<&mut ContactData> {
        match &mut self.kind {
            EquationKind::Contact(data) => Some(data),
            EquationKind::Friction(_) => None,
        }
    }

    /// Right-hand side of the SPOOK equation. Also refreshes the
    /// jacobian rows from the current contact geometry.
    pub fn compute_b(&mut self, bi: &Body, bj: &Body, h: f32) -> f32 {
        match self.kind {
            EquationKind::Contact(data) => {
                let n = data.ni;
                let rixn = data.ri.cross(n);
                let rjxn = data.rj.cross(n);
                self.jacobian_a = JacobianElement::new(-n, -rixn);
                self.jacobian_b = JacobianElement::new(n, rjxn);

                // Penetration along the normal
                let penetration_vec = (bj.position + data.rj) - (bi.position + data.ri);
                let g = penetration_vec.dot(n);

                let e_plus_one = data.restitution + 1.0;
                let gw = e_plus_one * bj.velocity.dot(n) - e_plus_one * bi.velocity.dot(n)
                    + bj.angular_velocity.dot(rjxn)
                    - bi.angular_velocity.dot(rixn);
                let gimf = self.compute_gimf(bi, bj);
                -g * self.a - gw * self.b - h * gimf
            }
            EquationKind::Friction(data) => {
                let t = data.t;
                let rixt = data.ri.cross(t);
                let rjxt = data.rj.cross(t);
                self.jacobian_a = JacobianElement::new(-t, -rixt);
                self.jacobian_b = JacobianElement::new(t, rjxt);

                let gw = self.compute_gw(bi, bj);
                let gimf = self.compute_gimf(bi, bj);
                -gw * self.b - h * gimf
            }
        }
    }

    /// `G·W` over the body velocities.
    pub fn compute_gw(&self, bi: &Body, bj: &Body) -> f32 {
        self.jacobian_a.multiply_vectors(bi.velocity, bi.angular_velocity)
            + self.jacobian_b.multiply_vectors(bj.velocity, bj.angular_velocity)
    }

    /// `G·Wλ` over the solver scratch velocities.
    pub fn compute_gw_lambda(&self, bi: &Body, bj: &Body) -> f32 {
        self.jacobian_a.multiply_vectors(bi.vlambda, bi.wlambda)
            + self.jacobian_b.multiply_vectors(bj.vlambda, bj.wlambda)
    }

    /// `G·M⁻¹·f` over the external forces, using the solve-time masses.
    pub fn compute_gimf(&self, bi: &Body, bj: &Body) -> f32 {
        self.jacobian_a.multiply_vectors(
            bi.force * bi.inv_mass_solve,
            bi.inv_inertia_world_solve * bi.torque,
        ) + self.jacobian_b.multiply_vectors(
            bj.force * bj.inv_mass_solve,
            bj.inv_inertia_world_solve * bj.torque,
        )
    }

    /// `G·M⁻¹·Gᵀ`.
    pub fn compute_gimgt(&self, bi: &Body, bj: &Body) -> f32 {
        bi.inv_mass_solve
            + bj.inv_mass_solve
            + (bi.inv_inertia_world_solve * self.jacobian_a.rotational)
                .dot(self.jacobian_a.rotational)
            + (bj.inv_inertia_world_solve * self.jacobian_b.rotational)
                .dot(self.jacobian_b.rotational)
    }

    /// Denominator of the iteration step, `C = G·M⁻¹·Gᵀ + eps`.
    pub fn compute_c(&self, bi: &Body, bj: &Body) -> f32 {
        self.compute_gimgt(bi, bj) + self.eps
    }

    /// Fold a multiplier delta into both bodies' scratch velocities.
    pub fn add_to_w_lambda(&self, bi: &mut Body, bj: &mut Body, deltalambda: f32) {
        bi.vlambda += self.jacobian_a.spatial * (deltalambda * bi.inv_mass_solve);
        bj.vlambda += self.jacobian_b.spatial * (deltalambda * bj.inv_mass_solve);
        bi.wlambda += (bi.inv_inertia_world_solve * self.jacobian_a.rotational) * deltalambda;
        bj.wlambda += (bj.inv_inertia_world_solve * self.jacobian_b.rotational) * deltalambda;
    }

    /// Relative velocity at the contact projected on the normal. Only
    /// meaningful for contact rows.
    pub fn impact_velocity_along_normal(&self, bi: &Body, bj: &Body) -> f32 {
        match &self.kind {
            EquationKind::Contact(data) => {
                let vi = bi.velocity + bi.angular_velocity.cross(data.ri);
                let vj = bj.velocity + bj.angular_velocity.cross(data.rj);
                data.ni.dot(vi - vj)
            }
            EquationKind::Friction(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyOptions;
    use approx::assert_abs_diff_eq;

    fn dynamic_body(mass: f32) -> Body {
        let mut b = Body::new(BodyOptions::dynamic(mass));
        b.add_shape_centered(crate::shapes::Shape::sphere(1.0).unwrap());
        b.update_solve_mass_properties();
        b
    }

    #[test]
    fn test_spook_params() {
        let mut eq = Equation::default();
        let (k, d, h) = (1e7, 3.0, 1.0 / 60.0);
        eq.set_spook_params(k, d, h);
        assert_abs_diff_eq!(eq.a, 4.0 / (h * (1.0 + 4.0 * d)), epsilon = 1e-3);
        assert_abs_diff_eq!(eq.b, 4.0 * d / (1.0 + 4.0 * d), epsilon = 1e-6);
        assert_abs_diff_eq!(eq.eps, 4.0 / (h * h * k * (1.0 + 4.0 * d)), epsilon = 1e-9);
    }

    #[test]
    fn test_contact_jacobians_oppose() {
        let bi = dynamic_body(1.0);
        let bj = dynamic_body(1.0);
        let mut eq = Equation::default();
        eq.kind = EquationKind::Contact(ContactData {
            ri: Vec3::ZERO,
            rj: Vec3::ZERO,
            ni: Vec3::Z,
            restitution: 0.0,
        });
        eq.set_spook_params(1e7, 3.0, 1.0 / 60.0);
        eq.compute_b(&bi, &bj, 1.0 / 60.0);
        assert_eq!(eq.jacobian_a.spatial, -Vec3::Z);
        assert_eq!(eq.jacobian_b.spatial, Vec3::Z);
    }

    #[test]
    fn test_c_includes_both_masses() {
        let bi = dynamic_body(2.0);
        let bj = dynamic_body(4.0);
        let mut eq = Equation::default();
        eq.kind = EquationKind::Contact(ContactData {
            ri: Vec3::ZERO,
            rj: Vec3::ZERO,
            ni: Vec3::Z,
            restitution: 0.0,
        });
        eq.set_spook_params(1e7, 3.0, 1.0 / 60.0);
        eq.compute_b(&bi, &bj, 1.0 / 60.0);
        let c = eq.compute_c(&bi, &bj);
        // At least the sum of the inverse masses
        assert!(c >= 0.5 + 0.25);
    }

    #[test]
    fn test_sleeping_body_contributes_zero_rows() {
        let bi = dynamic_body(1.0);
        let mut bj = dynamic_body(1.0);
        bj.sleep();
        bj.update_solve_mass_properties();
        let mut eq = Equation::default();
        eq.kind = EquationKind::Contact(ContactData {
            ri: Vec3::ZERO,
            rj: Vec3::ZERO,
            ni: Vec3::Z,
            restitution: 0.0,
        });
        eq.compute_b(&bi, &bj, 1.0 / 60.0);
        let mut a = dynamic_body(1.0);
        let mut b = bj.clone();
        eq.add_to_w_lambda(&mut a, &mut b, 1.0);
        assert_eq!(b.vlambda, Vec3::ZERO);
        assert_ne!(a.vlambda, Vec3::ZERO);
    }
}
