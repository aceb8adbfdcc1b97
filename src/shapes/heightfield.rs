//! Heightfield terrain shape
//!
//! The field lies in the local x-y plane with heights along +z. Sample
//! `data[xi][yi]` sits at `(xi * element_size, yi * element_size)`. Each
//! grid cell splits into two triangles; collision tests run against
//! cached triangular-prism pillars built per `(xi, yi, upper)` cell.

use std::cell::RefCell;
use std::collections::HashMap;

use glam::{Quat, Vec3};

use super::convex::ConvexPolyhedron;
use super::ShapeError;
use crate::collision::aabb::Aabb;

/// Cached prism hull for one cell triangle, positioned at `offset` in
/// heightfield-local space.
#[derive(Debug, Clone)]
struct Pillar {
    convex: ConvexPolyhedron,
    offset: Vec3,
}

#[derive(Debug, Clone)]
pub struct Heightfield {
    /// Height samples, indexed `[xi][yi]`
    data: Vec<Vec<f32>>,
    /// Grid spacing in local units
    pub element_size: f32,
    pub min_value: f32,
    pub max_value: f32,
    pillar_cache: RefCell<HashMap<(u32, u32, bool), Pillar>>,
}

impl Heightfield {
    pub fn new(data: Vec<Vec<f32>>, element_size: f32) -> Result<Self, ShapeError> {
        if data.len() < 2 || data[0].len() < 2 {
            return Err(ShapeError::EmptyHeightfield);
        }
        let row_len = data[0].len();
        if data.iter().any(|row| row.len() != row_len) {
            return Err(ShapeError::RaggedHeightfield);
        }
        let mut field = Self {
            data,
            element_size,
            min_value: 0.0,
            max_value: 0.0,
            pillar_cache: RefCell::new(HashMap::new()),
        };
        field.update_min_value();
        field.update_max_value();
        Ok(field)
    }

    /// Number of samples along local x.
    pub fn width(&self) -> usize {
        self.data.len()
    }

    /// Number of samples along local y.
    pub fn depth(&self) -> usize {
        self.data[0].len()
    }

    pub fn data(&self) -> &[Vec<f32>] {
        &self.data
    }

    pub fn update_min_value(&mut self) {
        self.min_value = self
            .data
            .iter()
            .flatten()
            .copied()
            .fold(f32::MAX, f32::min);
    }

    pub fn update_max_value(&mut self) {
        self.max_value = self
            .data
            .iter()
            .flatten()
            .copied()
            .fold(-f32::MAX, f32::max);
    }

    /// Replace one sample. Invalidates every cached pillar.
    pub fn set_height_value_at_index(&mut self, xi: usize, yi: usize, value: f32) {
        self.data[xi][yi] = value;
        self.pillar_cache.borrow_mut().clear();
        self.update_min_value();
        self.update_max_value();
    }

    pub fn get_height_at_index(&self, xi: usize, yi: usize) -> f32 {
        self.data[xi][yi]
    }

    /// Cell index containing the local position, clamped into the grid
    /// when requested.
    pub fn get_index_of_position(&self, x: f32, y: f32, clamp: bool) -> Option<(usize, usize)> {
        let el = self.element_size;
        let mut xi = (x / el).floor() as isize;
        let mut yi = (y / el).floor() as isize;
        let max_x = self.width() as isize - 2;
        let max_y = self.depth() as isize - 2;
        if clamp {
            xi = xi.clamp(0, max_x);
            yi = yi.clamp(0, max_y);
        } else if xi < 0 || yi < 0 || xi > max_x || yi > max_y {
            return None;
        }
        Some((xi as usize, yi as usize))
    }

    /// Local AABB of one cell, spanning the full height range.
    pub fn get_aabb_at_index(&self, xi: usize, yi: usize) -> Aabb {
        let el = self.element_size;
        Aabb::new(
            Vec3::new(xi as f32 * el, yi as f32 * el, self.min_value),
            Vec3::new((xi + 1) as f32 * el, (yi + 1) as f32 * el, self.max_value),
        )
    }

    /// Run `f` with the convex pillar of the given cell triangle and its
    /// local-frame offset. Pillars are cached until the data mutates.
    pub fn with_pillar<R>(
        &self,
        xi: usize,
        yi: usize,
        upper: bool,
        f: impl FnOnce(&ConvexPolyhedron, Vec3) -> R,
    ) -> R {
        let key = (xi as u32, yi as u32, upper);
        {
            let mut cache = self.pillar_cache.borrow_mut();
            if !cache.contains_key(&key) {
                let pillar = self.build_pillar(xi, yi, upper);
                cache.insert(key, pillar);
            }
        }
        let cache = self.pillar_cache.borrow();
        let pillar = &cache[&key];
        f(&pillar.convex, pillar.offset)
    }

    fn build_pillar(&self, xi: usize, yi: usize, upper: bool) -> Pillar {
        let el = self.element_size;
        let data = &self.data;

        // Heights of the triangle corners
        let (a, b, c) = if upper {
            (data[xi + 1][yi + 1], data[xi][yi + 1], data[xi + 1][yi])
        } else {
            (data[xi][yi], data[xi + 1][yi], data[xi][yi + 1])
        };

        // Sink the pillar base halfway towards the field minimum
        let h = (a.min(b).min(c) - self.min_value) / 2.0 + self.min_value;
        let bottom = -h.abs() - 1.0;

        let (offset, top) = if upper {
            (
                Vec3::new((xi as f32 + 0.75) * el, (yi as f32 + 0.75) * el, h),
                [
                    Vec3::new(0.25 * el, 0.25 * el, a - h),
                    Vec3::new(-0.75 * el, 0.25 * el, b - h),
                    Vec3::new(0.25 * el, -0.75 * el, c - h),
                ],
            )
        } else {
            (
                Vec3::new((xi as f32 + 0.25) * el, (yi as f32 + 0.25) * el, h),
                [
                    Vec3::new(-0.25 * el, -0.25 * el, a - h),
                    Vec3::new(0.75 * el, -0.25 * el, b - h),
                    Vec3::new(-0.25 * el, 0.75 * el, c - h),
                ],
            )
        };

        let vertices = vec![
            top[0],
            top[1],
            top[2],
            Vec3::new(top[0].x, top[0].y, bottom),
            Vec3::new(top[1].x, top[1].y, bottom),
            Vec3::new(top[2].x, top[2].y, bottom),
        ];
        let faces = vec![
            vec![0, 1, 2],
            vec![5, 4, 3],
            vec![0, 3, 4, 1],
            vec![1, 4, 5, 2],
            vec![2, 5, 3, 0],
        ];
        let convex = ConvexPolyhedron::new(vertices, faces)
            .expect("pillar hull indices are valid");
        Pillar { convex, offset }
    }

    pub fn volume(&self) -> f32 {
        // Treated as unbounded terrain
        f32::MAX
    }

    pub fn calculate_local_inertia(&self, _mass: f32) -> Vec3 {
        Vec3::ZERO
    }

    pub fn local_aabb(&self) -> Aabb {
        let el = self.element_size;
        Aabb::new(
            Vec3::new(0.0, 0.0, self.min_value),
            Vec3::new(
                (self.width() - 1) as f32 * el,
                (self.depth() - 1) as f32 * el,
                self.max_value,
            ),
        )
    }

    pub fn calculate_world_aabb(&self, position: Vec3, quaternion: Quat) -> Aabb {
        Aabb::from_points(&self.local_aabb().get_corners(), position, quaternion, 0.0)
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        self.local_aabb()
            .get_corners()
            .iter()
            .map(|c| c.length_squared())
            .fold(0.0f32, f32::max)
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_field(height: f32) -> Heightfield {
        Heightfield::new(vec![vec![height; 3]; 3], 1.0).unwrap()
    }

    #[test]
    fn test_rejects_tiny_grid() {
        assert!(matches!(
            Heightfield::new(vec![vec![0.0]], 1.0),
            Err(ShapeError::EmptyHeightfield)
        ));
    }

    #[test]
    fn test_min_max_tracking() {
        let mut field = flat_field(1.0);
        assert_eq!(field.min_value, 1.0);
        assert_eq!(field.max_value, 1.0);
        field.set_height_value_at_index(1, 1, 5.0);
        assert_eq!(field.max_value, 5.0);
        assert_eq!(field.min_value, 1.0);
    }

    #[test]
    fn test_index_of_position() {
        let field = flat_field(0.0);
        assert_eq!(field.get_index_of_position(0.5, 0.5, false), Some((0, 0)));
        assert_eq!(field.get_index_of_position(1.5, 0.5, false), Some((1, 0)));
        assert_eq!(field.get_index_of_position(-0.5, 0.5, false), None);
        assert_eq!(field.get_index_of_position(-0.5, 0.5, true), Some((0, 0)));
    }

    #[test]
    fn test_pillar_cache_invalidation() {
        let mut field = flat_field(1.0);
        field.with_pillar(0, 0, false, |convex, _offset| {
            assert_eq!(convex.vertices.len(), 6);
        });
        assert_eq!(field.pillar_cache.borrow().len(), 1);
        field.set_height_value_at_index(0, 0, 2.0);
        assert_eq!(field.pillar_cache.borrow().len(), 0);
    }

    #[test]
    fn test_pillar_top_at_sample_height() {
        let field = flat_field(2.0);
        field.with_pillar(0, 0, false, |convex, offset| {
            // Highest pillar vertex plus the offset recovers the sample
            let top = convex
                .vertices
                .iter()
                .map(|v| v.z + offset.z)
                .fold(-f32::MAX, f32::max);
            assert!((top - 2.0).abs() < 1e-5);
        });
    }
}
