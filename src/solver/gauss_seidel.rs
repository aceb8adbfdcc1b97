//! Projected Gauss-Seidel solver
//!
//! Iteratively relaxes the SPOOK system `J·M⁻¹·Jᵀ·λ = rhs`, clamping
//! each accumulated multiplier into `[min_force·h, max_force·h]`.
//! Non-convergence is not an error: the clamped partial result is used.

use glam::Vec3;
use tracing::trace;

use super::{body_pair_mut, Solver};
use crate::body::Body;
use crate::equations::Equation;

#[derive(Debug, Clone)]
pub struct GsSolver {
    /// Number of relaxation sweeps per solve
    pub iterations: usize,
    /// Early-out threshold on the summed multiplier delta per sweep
    pub tolerance: f32,
}

impl Default for GsSolver {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance: 1e-7,
        }
    }
}

impl GsSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Solver for GsSolver {
    fn solve(&mut self, dt: f32, bodies: &mut [Body], equations: &mut [&mut Equation]) -> usize {
        let n_eq = equations.len();
        if n_eq == 0 {
            return 0;
        }
        let h = dt;
        let tolerance_squared = self.tolerance * self.tolerance;

        for body in bodies.iter_mut() {
            body.vlambda = Vec3::ZERO;
            body.wlambda = Vec3::ZERO;
        }

        // Precompute right-hand sides and denominators
        let mut lambdas = vec![0.0f32; n_eq];
        let mut bs = vec![0.0f32; n_eq];
        let mut inv_cs = vec![0.0f32; n_eq];
        for (index, eq) in equations.iter_mut().enumerate() {
            let (bi, bj) = (&bodies[eq.bi], &bodies[eq.bj]);
            bs[index] = eq.compute_b(bi, bj, h);
            inv_cs[index] = 1.0 / eq.compute_c(bi, bj);
        }

        let mut iterations_used = 0;
        for iteration in 0..self.iterations {
            iterations_used = iteration + 1;
            let mut delta_lambda_total = 0.0f32;

            for (index, eq) in equations.iter_mut().enumerate() {
                if !eq.enabled {
                    continue;
                }
                let lambda = lambdas[index];
                let gw_lambda = {
                    let (bi, bj) = (&bodies[eq.bi], &bodies[eq.bj]);
                    eq.compute_gw_lambda(bi, bj)
                };
                let mut delta_lambda = inv_cs[index] * (bs[index] - gw_lambda - eq.eps * lambda);

                // Clamp the accumulated multiplier
                if lambda + delta_lambda < eq.min_force * h {
                    delta_lambda = eq.min_force * h - lambda;
                } else if lambda + delta_lambda > eq.max_force * h {
                    delta_lambda = eq.max_force * h - lambda;
                }
                lambdas[index] += delta_lambda;
                delta_lambda_total += delta_lambda.abs();

                let (bi, bj) = body_pair_mut(bodies, eq.bi, eq.bj);
                eq.add_to_w_lambda(bi, bj, delta_lambda);
            }

            if delta_lambda_total * delta_lambda_total < tolerance_squared {
                break;
            }
        }
        trace!(iterations = iterations_used, equations = n_eq, "solver pass done");

        // Fold the scratch velocities back, gated per axis
        for body in bodies.iter_mut() {
            body.velocity += body.vlambda * body.linear_factor;
            body.angular_velocity += body.wlambda * body.angular_factor;
        }
        for (index, eq) in equations.iter_mut().enumerate() {
            eq.multiplier = lambdas[index];
        }

        iterations_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyOptions;
    use crate::equations::{ContactData, EquationKind};
    use crate::shapes::Shape;

    fn prepared_body(mass: f32, position: Vec3, velocity: Vec3) -> Body {
        let mut b = Body::new(BodyOptions {
            mass,
            position,
            velocity,
            ..Default::default()
        });
        b.add_shape_centered(Shape::sphere(1.0).unwrap());
        b.update_solve_mass_properties();
        b
    }

    fn head_on_contact() -> Equation {
        let mut eq = Equation::default();
        eq.bi = 0;
        eq.bj = 1;
        eq.kind = EquationKind::Contact(ContactData {
            ri: Vec3::new(1.0, 0.0, 0.0),
            rj: Vec3::new(-1.0, 0.0, 0.0),
            ni: Vec3::X,
            restitution: 0.0,
        });
        eq.min_force = 0.0;
        eq.set_spook_params(1e7, 3.0, 1.0 / 60.0);
        eq
    }

    #[test]
    fn test_contact_stops_approach() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![
            prepared_body(1.0, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)),
            prepared_body(1.0, Vec3::new(1.9, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
        ];
        let mut eq = head_on_contact();
        let mut solver = GsSolver::new();
        solver.solve(dt, &mut bodies, &mut [&mut eq]);

        // Post-solve normal relative velocity must not be approaching
        let rel = (bodies[1].velocity - bodies[0].velocity).dot(Vec3::X);
        assert!(rel > -1e-3, "bodies still approaching: {rel}");
        // Momentum is conserved for the symmetric pair
        let momentum = bodies[0].velocity.x + bodies[1].velocity.x;
        assert!(momentum.abs() < 1e-4);
    }

    #[test]
    fn test_multiplier_respects_bounds() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![
            prepared_body(1.0, Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)),
            prepared_body(1.0, Vec3::new(1.5, 0.0, 0.0), Vec3::new(-100.0, 0.0, 0.0)),
        ];
        let mut eq = head_on_contact();
        eq.max_force = 10.0;
        let mut solver = GsSolver::new();
        solver.solve(dt, &mut bodies, &mut [&mut eq]);
        assert!(eq.multiplier >= eq.min_force * dt - 1e-6);
        assert!(eq.multiplier <= eq.max_force * dt + 1e-6);
    }

    #[test]
    fn test_sleeping_body_untouched() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![
            prepared_body(1.0, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)),
            prepared_body(1.0, Vec3::new(1.9, 0.0, 0.0), Vec3::ZERO),
        ];
        bodies[1].sleep();
        bodies[1].update_solve_mass_properties();
        let mut eq = head_on_contact();
        let mut solver = GsSolver::new();
        solver.solve(dt, &mut bodies, &mut [&mut eq]);
        assert_eq!(bodies[1].velocity, Vec3::ZERO);
        assert_eq!(bodies[1].angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_empty_system_is_noop() {
        let mut bodies = vec![prepared_body(1.0, Vec3::ZERO, Vec3::X)];
        let mut solver = GsSolver::new();
        let iterations = solver.solve(1.0 / 60.0, &mut bodies, &mut []);
        assert_eq!(iterations, 0);
        assert_eq!(bodies[0].velocity, Vec3::X);
    }

    #[test]
    fn test_disabled_equation_ignored() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![
            prepared_body(1.0, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)),
            prepared_body(1.0, Vec3::new(1.9, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
        ];
        let mut eq = head_on_contact();
        eq.enabled = false;
        let mut solver = GsSolver::new();
        solver.solve(dt, &mut bodies, &mut [&mut eq]);
        assert_eq!(bodies[0].velocity, Vec3::new(1.0, 0.0, 0.0));
    }
}
