//! World runtime and spatial indexing toolkit for simulation workloads.
//!
//! `phalanx` re-exports the runtime from `phalanx-core` at the crate root and
//! the container family from `phalanx-spatial` under [`spatial`]. Most
//! applications just pull in the [`prelude`].

pub use phalanx_core::*;
pub use phalanx_spatial as spatial;

pub mod prelude {
    pub use phalanx_core::{
        shared, CsvLogger, Event, EventKind, Execution, Iteration, LogLevel, Logger, Record,
        SharedSystem, StreamLogger, System, SystemEntry, SystemFault, SystemResult, Worker, World,
    };
    pub use phalanx_spatial::{
        Aabb2, Aabb3, Circle, Grid2, Grid3, HashGrid2, HashGrid3, Linear, Octree, Position2,
        Position3, Quadtree, SpatialError, SpatialIndex2, SpatialIndex3, Sphere,
    };
}
