//! Monotonic id assignment
//!
//! Every entity kind draws from its own counter, so ids are unique and
//! strictly increasing per kind for the lifetime of the process.

use std::sync::atomic::{AtomicU32, Ordering};

static BODY_IDS: AtomicU32 = AtomicU32::new(0);
static SHAPE_IDS: AtomicU32 = AtomicU32::new(0);
static MATERIAL_IDS: AtomicU32 = AtomicU32::new(0);
static EQUATION_IDS: AtomicU32 = AtomicU32::new(0);
static CONSTRAINT_IDS: AtomicU32 = AtomicU32::new(0);

pub(crate) fn next_body_id() -> u32 {
    BODY_IDS.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_shape_id() -> u32 {
    SHAPE_IDS.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_material_id() -> u32 {
    MATERIAL_IDS.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_equation_id() -> u32 {
    EQUATION_IDS.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_constraint_id() -> u32 {
    CONSTRAINT_IDS.fetch_add(1, Ordering::Relaxed)
}
