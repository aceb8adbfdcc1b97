//! Container utilities backing the world registries

pub mod collision_matrix;
pub mod octree;
pub mod pair_map;
pub mod pool;

pub use collision_matrix::CollisionMatrix;
pub use octree::Octree;
pub use pair_map::PairMap;
pub use pool::Pool;
