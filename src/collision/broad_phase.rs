//! Broadphase pair generation

use crate::body::Body;
use crate::collision::aabb::Aabb;

/// Candidate pair source for the narrowphase. Implementations push
/// arena indices of potentially colliding bodies.
pub trait Broadphase {
    /// Fill `pairs_a`/`pairs_b` with candidate index pairs.
    fn collision_pairs(
        &mut self,
        bodies: &mut [Body],
        pairs_a: &mut Vec<usize>,
        pairs_b: &mut Vec<usize>,
    );

    /// Indices of bodies whose aggregate AABB overlaps `aabb`.
    fn aabb_query(&self, bodies: &mut [Body], aabb: &Aabb, result: &mut Vec<usize>);
}

/// Pair filter shared by every broadphase: filter-mask match, at least
/// one body able to move, and not both inert (static or sleeping).
pub fn need_broadphase_collision(a: &Body, b: &Body) -> bool {
    // Collision filter masks
    if (a.collision_filter_group & b.collision_filter_mask) == 0
        || (b.collision_filter_group & a.collision_filter_mask) == 0
    {
        return false;
    }
    // Static/kinematic pairings never collide
    if !a.is_dynamic() && !b.is_dynamic() {
        return false;
    }
    // Both inert: either static or asleep
    let a_inert = a.is_static() || a.is_sleeping();
    let b_inert = b.is_static() || b.is_sleeping();
    if a_inert && b_inert {
        return false;
    }
    true
}

/// Sort pairs by `(min_id, max_id)` and drop duplicates so multi-shape
/// overlap reports collapse to one pair per body couple.
pub fn make_pairs_unique(bodies: &[Body], pairs_a: &mut Vec<usize>, pairs_b: &mut Vec<usize>) {
    let mut keyed: Vec<((u32, u32), usize, usize)> = pairs_a
        .iter()
        .zip(pairs_b.iter())
        .map(|(&i, &j)| {
            let (id_i, id_j) = (bodies[i].id, bodies[j].id);
            ((id_i.min(id_j), id_i.max(id_j)), i, j)
        })
        .collect();
    keyed.sort_by_key(|entry| entry.0);
    keyed.dedup_by_key(|entry| entry.0);

    pairs_a.clear();
    pairs_b.clear();
    for (_, i, j) in keyed {
        pairs_a.push(i);
        pairs_b.push(j);
    }
}

/// O(n²) broadphase checking every body couple. Plenty for small and
/// medium worlds, and fully deterministic.
#[derive(Debug, Clone)]
pub struct NaiveBroadphase {
    /// Compare AABBs when true, bounding spheres otherwise
    pub use_bounding_boxes: bool,
}

impl Default for NaiveBroadphase {
    fn default() -> Self {
        Self {
            use_bounding_boxes: true,
        }
    }
}

impl NaiveBroadphase {
    pub fn new() -> Self {
        Self::default()
    }

    fn intersection_test(&self, a: &Body, b: &Body) -> bool {
        if self.use_bounding_boxes {
            a.aabb.overlaps(&b.aabb)
        } else {
            let r = a.bounding_radius + b.bounding_radius;
            (a.position - b.position).length_squared() < r * r
        }
    }
}

impl Broadphase for NaiveBroadphase {
    fn collision_pairs(
        &mut self,
        bodies: &mut [Body],
        pairs_a: &mut Vec<usize>,
        pairs_b: &mut Vec<usize>,
    ) {
        pairs_a.clear();
        pairs_b.clear();

        if self.use_bounding_boxes {
            for body in bodies.iter_mut() {
                if body.aabb_needs_update {
                    body.compute_aabb();
                }
            }
        }

        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                if !need_broadphase_collision(&bodies[i], &bodies[j]) {
                    continue;
                }
                if self.intersection_test(&bodies[i], &bodies[j]) {
                    pairs_a.push(i);
                    pairs_b.push(j);
                }
            }
        }
        make_pairs_unique(bodies, pairs_a, pairs_b);
    }

    fn aabb_query(&self, bodies: &mut [Body], aabb: &Aabb, result: &mut Vec<usize>) {
        result.clear();
        for (index, body) in bodies.iter_mut().enumerate() {
            if body.aabb_needs_update {
                body.compute_aabb();
            }
            if body.aabb.overlaps(aabb) {
                result.push(index);
            }
        }
    }
}
