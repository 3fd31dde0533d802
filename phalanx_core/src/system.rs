use crate::event::{Event, EventKind};
use crate::world::{Iteration, World};
use downcast_rs::{impl_downcast, Downcast};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a system callback. Returning an error makes the current
/// iteration the last one of the run; the world logs the failure and keeps
/// other systems isolated from it.
pub type SystemResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A plain-message error for system callbacks that have nothing more
/// structured to report.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SystemFault(pub String);

impl SystemFault {
    pub fn new(message: impl Into<String>) -> SystemFault {
        SystemFault(message.into())
    }
}

/// How a system is scheduled within a run.
///
/// A system with a higher priority has `on_update` invoked after a system
/// with a lower one. Systems sharing a priority form a group and update in
/// parallel, each pinned to its own worker thread for the whole run.
///
/// `world_thread_only` forces every callback of the system onto the thread
/// that called [`World::run`]. Useful for thread-bound contexts such as GL.
/// Several such systems in one group will not be parallelized, since they
/// all need the runner thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Execution {
    pub priority: i32,
    pub world_thread_only: bool,
}

impl Execution {
    pub const fn new(priority: i32) -> Execution {
        Execution {
            priority,
            world_thread_only: false,
        }
    }

    pub const fn on_world_thread(priority: i32) -> Execution {
        Execution {
            priority,
            world_thread_only: true,
        }
    }
}

/// A named unit of behavior driven by a [`World`].
///
/// The world invokes the callbacks while running: `on_start` in registration
/// order, `on_update` every iteration in priority order, `on_trigger` for
/// subscribed events, and `on_stop` in reverse registration order. A system's
/// callbacks are never invoked concurrently with themselves, and within one
/// run they all observe the same thread identity.
///
/// Avoid spawning threads that outlive a callback; the scheduler owns the
/// threading model.
pub trait System: Downcast + Send {
    fn name(&self) -> &str;

    fn execution(&self) -> Execution {
        Execution::default()
    }

    /// Event kinds this system consumes. Read once per run, when the world
    /// snapshots its systems.
    fn triggers(&self) -> Vec<EventKind> {
        Vec::new()
    }

    fn on_start(&mut self, _world: &World) -> SystemResult {
        Ok(())
    }

    fn on_trigger(&mut self, _world: &World, _iter: &Iteration, _event: &Event) -> SystemResult {
        Ok(())
    }

    fn on_update(&mut self, _world: &World, _iter: &Iteration) -> SystemResult {
        Ok(())
    }

    fn on_stop(&mut self, _world: &World, _iter: &Iteration) -> SystemResult {
        Ok(())
    }
}

impl_downcast!(System);

/// Shared-ownership handle to a system. The mutex is what guarantees that a
/// system is never observed mid-mutation: the scheduler locks it around every
/// callback, and applications lock it to inspect state between runs.
pub type SharedSystem = Arc<Mutex<dyn System>>;

/// Wrap a system for registration on a world, keeping a handle to it.
pub fn shared<S: System>(system: S) -> SharedSystem {
    Arc::new(Mutex::new(system))
}
