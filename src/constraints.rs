//! User constraints built from solver equations
//!
//! A constraint owns one or more equations and refreshes their geometry
//! from the body states before every solve. Both kinds here reuse the
//! contact equation form with zero restitution, which gives them the
//! same Baumgarte-style position correction as contacts.

use glam::Vec3;

use crate::body::Body;
use crate::equations::{ContactData, Equation, EquationKind};
use crate::ids;

#[derive(Debug, Clone)]
pub enum ConstraintKind {
    /// Keep the body centers at a fixed distance
    Distance { distance: f32 },
    /// Glue two body-local pivot points together
    PointToPoint { pivot_a: Vec3, pivot_b: Vec3 },
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub id: u32,
    /// Stable body ids; resolved to arena indices at update time
    pub body_a: u32,
    pub body_b: u32,
    pub equations: Vec<Equation>,
    /// When false, broadphase pairs between the two bodies are dropped
    pub collide_connected: bool,
    pub enabled: bool,
    pub stiffness: f32,
    pub relaxation: f32,
    pub kind: ConstraintKind,
}

impl Constraint {
    fn base(body_a: u32, body_b: u32, kind: ConstraintKind, equation_count: usize, max_force: f32) -> Self {
        let mut equations = Vec::with_capacity(equation_count);
        for _ in 0..equation_count {
            let mut eq = Equation::default();
            eq.min_force = -max_force;
            eq.max_force = max_force;
            equations.push(eq);
        }
        Self {
            id: ids::next_constraint_id(),
            body_a,
            body_b,
            equations,
            collide_connected: true,
            enabled: true,
            stiffness: 1e7,
            relaxation: 4.0,
            kind,
        }
    }

    pub fn distance(body_a: u32, body_b: u32, distance: f32, max_force: f32) -> Self {
        Self::base(body_a, body_b, ConstraintKind::Distance { distance }, 1, max_force)
    }

    /// Pivots are given in each body's local frame.
    pub fn point_to_point(
        body_a: u32,
        body_b: u32,
        pivot_a: Vec3,
        pivot_b: Vec3,
        max_force: f32,
    ) -> Self {
        Self::base(
            body_a,
            body_b,
            ConstraintKind::PointToPoint { pivot_a, pivot_b },
            3,
            max_force,
        )
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        for eq in &mut self.equations {
            eq.enabled = true;
        }
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        for eq in &mut self.equations {
            eq.enabled = false;
        }
    }

    /// Refresh equation geometry and SPOOK parameters for the next
    /// solve. `index_a`/`index_b` are the bodies' current arena slots.
    pub fn update(&mut self, bodies: &[Body], index_a: usize, index_b: usize, dt: f32) {
        let bi = &bodies[index_a];
        let bj = &bodies[index_b];

        match self.kind {
            ConstraintKind::Distance { distance } => {
                let half = distance * 0.5;
                let delta = bj.position - bi.position;
                let normal = if delta.length_squared() > 0.0 {
                    delta.normalize()
                } else {
                    Vec3::X
                };
                let eq = &mut self.equations[0];
                eq.kind = EquationKind::Contact(ContactData {
                    ri: normal * half,
                    rj: normal * -half,
                    ni: normal,
                    restitution: 0.0,
                });
            }
            ConstraintKind::PointToPoint { pivot_a, pivot_b } => {
                let ri = bi.quaternion * pivot_a;
                let rj = bj.quaternion * pivot_b;
                for (eq, axis) in self.equations.iter_mut().zip([Vec3::X, Vec3::Y, Vec3::Z]) {
                    eq.kind = EquationKind::Contact(ContactData {
                        ri,
                        rj,
                        ni: axis,
                        restitution: 0.0,
                    });
                }
            }
        }

        for eq in &mut self.equations {
            eq.bi = index_a;
            eq.bj = index_b;
            eq.set_spook_params(self.stiffness, self.relaxation, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyOptions};

    fn bodies_at(a: Vec3, b: Vec3) -> Vec<Body> {
        vec![
            Body::new(BodyOptions::dynamic(1.0).with_position(a)),
            Body::new(BodyOptions::dynamic(1.0).with_position(b)),
        ]
    }

    #[test]
    fn test_distance_constraint_geometry() {
        let bodies = bodies_at(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0));
        let mut c = Constraint::distance(bodies[0].id, bodies[1].id, 2.0, 1e6);
        c.update(&bodies, 0, 1, 1.0 / 60.0);
        let data = c.equations[0].contact_data().unwrap();
        assert_eq!(data.ni, Vec3::X);
        assert_eq!(data.ri, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(data.rj, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_point_to_point_has_three_axes() {
        let bodies = bodies_at(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let mut c = Constraint::point_to_point(
            bodies[0].id,
            bodies[1].id,
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(-0.5, 0.0, 0.0),
            1e6,
        );
        c.update(&bodies, 0, 1, 1.0 / 60.0);
        assert_eq!(c.equations.len(), 3);
        let normals: Vec<Vec3> = c
            .equations
            .iter()
            .map(|e| e.contact_data().unwrap().ni)
            .collect();
        assert_eq!(normals, vec![Vec3::X, Vec3::Y, Vec3::Z]);
    }

    #[test]
    fn test_disable_disables_equations() {
        let bodies = bodies_at(Vec3::ZERO, Vec3::X);
        let mut c = Constraint::distance(bodies[0].id, bodies[1].id, 1.0, 1e6);
        c.disable();
        assert!(c.equations.iter().all(|e| !e.enabled));
        c.enable();
        assert!(c.equations.iter().all(|e| e.enabled));
    }
}
