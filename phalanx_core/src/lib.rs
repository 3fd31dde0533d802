//! World runtime for simulation workloads.
//!
//! A [`World`] owns a collection of [`System`]s and an event queue. Calling
//! [`World::run`] snapshots the systems, groups them by priority, pins each
//! parallel system to its own [`Worker`] thread, and drives the
//! start/update/trigger/stop lifecycle until the world is told to stop.

mod event;
mod log;
mod system;
mod worker;
mod world;

pub use crate::event::*;
pub use crate::log::*;
pub use crate::system::*;
pub use crate::worker::*;
pub use crate::world::*;
