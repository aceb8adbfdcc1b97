//! Fallible 3x3 linear solves
//!
//! glam's `Mat3::inverse` silently returns garbage for singular input.
//! The inertia pipeline needs to know when a matrix cannot be inverted,
//! so these routines do explicit Gauss elimination and report failure.

use glam::{Mat3, Vec3};

use super::MathError;

/// Extension operations on [`glam::Mat3`].
pub trait Mat3Ext {
    /// Solve `self * x = b` by Gauss elimination with row pivoting.
    fn solve_gauss(&self, b: Vec3) -> Result<Vec3, MathError>;

    /// Invert by Gauss-Jordan elimination on an augmented 3x6 system.
    fn invert_gauss(&self) -> Result<Mat3, MathError>;

    /// Scale each column by the matching component of `v`.
    fn scale_columns(&self, v: Vec3) -> Mat3;

    /// The diagonal as a vector.
    fn get_trace(&self) -> Vec3;

    /// Overwrite the diagonal, leaving the rest untouched.
    fn set_trace(&mut self, diagonal: Vec3);

    /// Element accessor in (row, column) form.
    fn element(&self, row: usize, col: usize) -> f32;
}

impl Mat3Ext for Mat3 {
    fn solve_gauss(&self, b: Vec3) -> Result<Vec3, MathError> {
        // Augmented 3x4 system, row major
        let mut eqns = [[0.0f32; 4]; 3];
        for row in 0..3 {
            for col in 0..3 {
                eqns[row][col] = self.element(row, col);
            }
        }
        eqns[0][3] = b.x;
        eqns[1][3] = b.y;
        eqns[2][3] = b.z;

        gauss_eliminate(&mut eqns)?;

        // Back substitution
        let z = eqns[2][3] / eqns[2][2];
        let y = (eqns[1][3] - eqns[1][2] * z) / eqns[1][1];
        let x = (eqns[0][3] - eqns[0][2] * z - eqns[0][1] * y) / eqns[0][0];
        let result = Vec3::new(x, y, z);
        if !result.is_finite() {
            return Err(MathError::SingularMatrix);
        }
        Ok(result)
    }

    fn invert_gauss(&self) -> Result<Mat3, MathError> {
        let cols = [
            self.solve_gauss(Vec3::X)?,
            self.solve_gauss(Vec3::Y)?,
            self.solve_gauss(Vec3::Z)?,
        ];
        Ok(Mat3::from_cols(cols[0], cols[1], cols[2]))
    }

    fn scale_columns(&self, v: Vec3) -> Mat3 {
        Mat3::from_cols(self.x_axis * v.x, self.y_axis * v.y, self.z_axis * v.z)
    }

    fn get_trace(&self) -> Vec3 {
        Vec3::new(self.x_axis.x, self.y_axis.y, self.z_axis.z)
    }

    fn set_trace(&mut self, diagonal: Vec3) {
        self.x_axis.x = diagonal.x;
        self.y_axis.y = diagonal.y;
        self.z_axis.z = diagonal.z;
    }

    fn element(&self, row: usize, col: usize) -> f32 {
        self.col(col)[row]
    }
}

/// Forward elimination; leaves the system upper triangular.
fn gauss_eliminate(eqns: &mut [[f32; 4]; 3]) -> Result<(), MathError> {
    for i in 0..3 {
        if eqns[i][i] == 0.0 {
            // Swap with a lower row that has a non-zero pivot
            let mut found = false;
            for j in (i + 1)..3 {
                if eqns[j][i] != 0.0 {
                    eqns.swap(i, j);
                    found = true;
                    break;
                }
            }
            if !found {
                return Err(MathError::SingularMatrix);
            }
        }
        for j in (i + 1)..3 {
            let factor = eqns[j][i] / eqns[i][i];
            for k in i..4 {
                eqns[j][k] -= factor * eqns[i][k];
            }
        }
    }
    if eqns[2][2] == 0.0 || eqns[1][1] == 0.0 || eqns[0][0] == 0.0 {
        return Err(MathError::SingularMatrix);
    }
    Ok(())
}
