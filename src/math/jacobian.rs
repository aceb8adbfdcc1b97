//! Per-body constraint jacobian rows

use glam::Vec3;

/// One body's row of a constraint jacobian, split into the translational
/// and rotational halves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JacobianElement {
    pub spatial: Vec3,
    pub rotational: Vec3,
}

impl JacobianElement {
    pub fn new(spatial: Vec3, rotational: Vec3) -> Self {
        Self { spatial, rotational }
    }

    pub fn set_zero(&mut self) {
        self.spatial = Vec3::ZERO;
        self.rotational = Vec3::ZERO;
    }

    /// `G · G'`, summing both halves.
    pub fn multiply_element(&self, other: &JacobianElement) -> f32 {
        self.spatial.dot(other.spatial) + self.rotational.dot(other.rotational)
    }

    /// Dot against a spatial/rotational vector pair.
    pub fn multiply_vectors(&self, spatial: Vec3, rotational: Vec3) -> f32 {
        self.spatial.dot(spatial) + self.rotational.dot(rotational)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_element() {
        let a = JacobianElement::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0));
        let b = JacobianElement::new(Vec3::new(7.0, 8.0, 9.0), Vec3::new(10.0, 11.0, 12.0));
        // 7+16+27 + 40+55+72
        assert_eq!(a.multiply_element(&b), 217.0);
        assert_eq!(a.multiply_vectors(b.spatial, b.rotational), 217.0);
    }
}
