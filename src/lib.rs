pub mod bounds;
pub mod generator;
pub mod octree;
pub mod points;
pub mod pool;
pub mod snapshot;

pub use generator::{Config, Generator, MAX_SIZE};
pub use octree::Octree;
pub use points::{ColorPoint, FrontierPoint, SpacePoint};
