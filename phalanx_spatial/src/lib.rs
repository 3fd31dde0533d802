//! Generic spatial indexing containers for 2D and 3D point-bearing elements.
//!
//! Four strategies share one contract ([`SpatialIndex2`] / [`SpatialIndex3`]):
//! a bounded uniform [`Grid2`]/[`Grid3`], an unbounded [`HashGrid2`]/
//! [`HashGrid3`], a recursively subdividing [`Quadtree`]/[`Octree`], and the
//! unstructured [`Linear`] baseline. Elements are anything implementing the
//! [`Position2`]/[`Position3`] projection; positions use `cgmath` points.

mod bounds;
mod grid;
mod hash_grid;
mod index;
mod linear;
mod octree;
mod quadtree;

pub use crate::bounds::*;
pub use crate::grid::*;
pub use crate::hash_grid::*;
pub use crate::index::*;
pub use crate::linear::*;
pub use crate::octree::*;
pub use crate::quadtree::*;

use thiserror::Error;

/// Configuration faults surfaced when a container is constructed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SpatialError {
    #[error("grid resolution must be at least 1 on every axis")]
    InvalidResolution,
    #[error("hash grid cell size must be positive on every axis")]
    InvalidCellSize,
    #[error("hash grid bucket count must be at least 1")]
    InvalidBucketCount,
}
