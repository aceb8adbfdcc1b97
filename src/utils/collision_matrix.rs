//! Symmetric pair matrix recording which bodies touched this step

use std::collections::HashSet;

/// Boolean matrix keyed by unordered body id pairs. The world keeps two
/// of these and swaps them every step so begin/end transitions can be
/// derived by diffing.
#[derive(Debug, Clone, Default)]
pub struct CollisionMatrix {
    entries: HashSet<(u32, u32)>,
}

fn normalize(i: u32, j: u32) -> (u32, u32) {
    if i <= j {
        (i, j)
    } else {
        (j, i)
    }
}

impl CollisionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, i: u32, j: u32) -> bool {
        self.entries.contains(&normalize(i, j))
    }

    pub fn set(&mut self, i: u32, j: u32, value: bool) {
        let key = normalize(i, j);
        if value {
            self.entries.insert(key);
        } else {
            self.entries.remove(&key);
        }
    }

    /// Drop every stored pair.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Remove all pairs involving `id` (body removal).
    pub fn remove_id(&mut self, id: u32) {
        self.entries.retain(|&(a, b)| a != id && b != id);
    }
}
