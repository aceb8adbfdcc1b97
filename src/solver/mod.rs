//! Constraint solvers

pub mod gauss_seidel;

pub use gauss_seidel::GsSolver;

use crate::body::Body;
use crate::equations::Equation;

/// Velocity-level constraint solver. Implementations read the equation
/// set for one step and fold the resulting impulses into the bodies.
pub trait Solver {
    /// Solve the system and return the number of iterations used.
    fn solve(&mut self, dt: f32, bodies: &mut [Body], equations: &mut [&mut Equation]) -> usize;
}

/// Disjoint mutable access to both bodies of an equation.
pub(crate) fn body_pair_mut(bodies: &mut [Body], i: usize, j: usize) -> (&mut Body, &mut Body) {
    debug_assert_ne!(i, j, "an equation cannot connect a body to itself");
    if i < j {
        let (left, right) = bodies.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = bodies.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}
