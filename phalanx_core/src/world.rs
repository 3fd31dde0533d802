use crate::event::Event;
use crate::log::{LogLevel, Logger, Record};
use crate::system::{Execution, SharedSystem, System};
use crate::worker::Worker;
use derivative::Derivative;
use fxhash::FxHashSet;
use itertools::Itertools;
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Information about the current iteration of a running world, passed to
/// system callbacks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Iteration {
    /// Iteration number starting from 0.
    pub index: u64,
    /// Seconds elapsed since the start of the loop.
    pub time: f32,
    /// Seconds elapsed since the previous iteration (0 on the first one).
    pub dt: f32,
}

/// A system as registered on a world. The name is cached here so lookups and
/// scheduling never have to lock a system that may be running a callback.
pub struct SystemEntry {
    pub name: String,
    pub system: SharedSystem,
}

// Filtering happens before the message is formatted, so verbose logging costs
// nothing when the world was built with a lower level.
macro_rules! world_log {
    ($world:expr, $level:expr, $($arg:tt)*) => {
        if $level <= $world.max_log_level() {
            $world.emit($level, format!($($arg)*));
        }
    };
}

/// A world owns a collection of systems and an event queue, and drives both
/// through the start/update/trigger/stop lifecycle when [`run`](World::run)
/// is called.
///
/// `World` is a cheap handle; clones share the same underlying state, which
/// is how scheduler jobs and [`stop`](World::stop) callers on other threads
/// hold on to it.
///
/// Avoid adding or removing systems while the world is running: a run only
/// ever sees the snapshot it took when it started. Only one `run` is active
/// at a time per world.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct World {
    inner: Arc<Inner>,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Inner {
    name: String,
    max_log_level: LogLevel,
    #[derivative(Debug = "ignore")]
    logger: Arc<dyn Logger>,
    #[derivative(Debug = "ignore")]
    systems: Mutex<Vec<SystemEntry>>,
    #[derivative(Debug = "ignore")]
    events: Mutex<VecDeque<Event>>,
    should_stop: AtomicBool,
    #[derivative(Debug = "ignore")]
    run_lock: Mutex<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if LogLevel::Info <= self.max_log_level {
            let _ = self.logger.log(&Record {
                level: LogLevel::Info,
                world: self.name.clone(),
                thread_id: thread::current().id(),
                message: "world destroyed".to_string(),
            });
        }
    }
}

impl World {
    pub fn new(name: impl Into<String>, max_log_level: LogLevel, logger: Arc<dyn Logger>) -> World {
        let world = World {
            inner: Arc::new(Inner {
                name: name.into(),
                max_log_level,
                logger,
                systems: Mutex::new(Vec::new()),
                events: Mutex::new(VecDeque::new()),
                should_stop: AtomicBool::new(false),
                run_lock: Mutex::new(()),
            }),
        };
        world_log!(world, LogLevel::Info, "world created");
        world
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn max_log_level(&self) -> LogLevel {
        self.inner.max_log_level
    }

    /// Add a custom log message. Records above the world's maximum level are
    /// dropped before they reach the logger.
    pub fn log(&self, level: LogLevel, message: &str) {
        world_log!(self, level, "{}", message);
    }

    fn emit(&self, level: LogLevel, message: String) {
        let record = Record {
            level,
            world: self.inner.name.clone(),
            thread_id: thread::current().id(),
            message,
        };
        if let Err(err) = self.inner.logger.log(&record) {
            // The sink is gone; there is nowhere left to report to, so shut
            // the world down and tell the host process.
            tracing::error!(world = %self.inner.name, error = %err, "log sink failed, stopping");
            self.inner.should_stop.store(true, Ordering::SeqCst);
        }
    }

    /// Register a system, returning the shared handle it is stored under.
    pub fn add_system<S: System>(&self, system: S) -> SharedSystem {
        let handle: SharedSystem = Arc::new(Mutex::new(system));
        self.add_shared_system(handle.clone());
        handle
    }

    /// Register an already-shared system, e.g. one kept around between runs.
    pub fn add_shared_system(&self, system: SharedSystem) {
        let name = system.lock().name().to_string();
        world_log!(self, LogLevel::Verbose, "adding a new system named {:?}", name);
        self.inner.systems.lock().push(SystemEntry { name, system });
    }

    /// The first system with the given name, if any.
    pub fn get_system_named(&self, name: &str) -> Option<SharedSystem> {
        self.inner
            .systems
            .lock()
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.system.clone())
    }

    /// Remove the first system with the given name.
    pub fn remove_system_named(&self, name: &str) {
        world_log!(
            self,
            LogLevel::Verbose,
            "removing the first system named {:?}",
            name
        );
        let mut systems = self.inner.systems.lock();
        if let Some(index) = systems.iter().position(|entry| entry.name == name) {
            systems.remove(index);
        }
    }

    /// Remove every system with the given name.
    pub fn remove_systems_named(&self, name: &str) {
        world_log!(
            self,
            LogLevel::Verbose,
            "removing all systems named {:?}",
            name
        );
        self.inner.systems.lock().retain(|entry| entry.name != name);
    }

    /// Remove all systems.
    pub fn remove_systems(&self) {
        world_log!(self, LogLevel::Verbose, "removing all systems");
        self.inner.systems.lock().clear();
    }

    /// Locked access to the system list. The guard doubles as the
    /// coordination point for callers that mutate the list from several
    /// threads; the world itself only takes it for short lookups and for the
    /// snapshot at the start of a run.
    pub fn systems(&self) -> MutexGuard<'_, Vec<SystemEntry>> {
        self.inner.systems.lock()
    }

    /// Enqueue an event from any thread, including from inside a system
    /// callback. Events are dispatched at the start of the next iteration
    /// that observes them, in enqueue order.
    pub fn enqueue_event(&self, event: Event) {
        world_log!(
            self,
            LogLevel::Verbose,
            "enqueueing an event of kind {}",
            event.kind()
        );
        self.inner.events.lock().push_back(event);
    }

    /// Start the main loop.
    ///
    /// Signals any in-flight run to stop and takes its place. Runs until
    /// [`stop`](World::stop) is called, `max_run_time` elapses, or a system
    /// callback fails. A `max_update_rate` of 0 leaves the rate uncapped; a
    /// `max_run_time` of 0 leaves the run time uncapped.
    pub fn run(&self, max_update_rate: f32, max_run_time: f32) {
        world_log!(self, LogLevel::Info, "preparing to run");
        if max_update_rate != 0.0 {
            world_log!(
                self,
                LogLevel::Info,
                "max_update_rate = {:.3} iterations/s",
                max_update_rate
            );
        }
        if max_run_time != 0.0 {
            world_log!(self, LogLevel::Info, "max_run_time = {:.3} s", max_run_time);
        }

        // If the world is already running, wait for that run to wind down.
        self.inner.should_stop.store(true, Ordering::SeqCst);
        let run_guard = self.inner.run_lock.lock();
        self.inner.should_stop.store(false, Ordering::SeqCst);

        let (entries, groups) = self.prepare_run();

        let started_all = self.start_systems(&entries);

        let mut iter = Iteration::default();
        let time_start = Instant::now();
        let mut time_last_iter = time_start;
        let min_dt = if max_update_rate == 0.0 {
            0.0
        } else {
            1.0 / max_update_rate
        };

        if started_all {
            world_log!(self, LogLevel::Info, "starting the loop");

            while !self.inner.should_stop.load(Ordering::SeqCst) {
                world_log!(
                    self,
                    LogLevel::Verbose,
                    "loop iteration {} (elapsed = {:.3} s, dt = {:.3} s)",
                    iter.index,
                    iter.time,
                    iter.dt
                );

                let processed_all = self.process_events(&entries, &iter);

                let mut updated_all = true;
                if processed_all {
                    updated_all = self.update_systems(&entries, &groups, &iter);
                }

                // Don't go faster than the maximum update rate.
                let time_left = min_dt - time_last_iter.elapsed().as_secs_f32();
                if time_left > 0.0 {
                    thread::sleep(Duration::from_secs_f32(time_left));
                }

                iter.index += 1;
                iter.time = time_start.elapsed().as_secs_f32();
                iter.dt = time_last_iter.elapsed().as_secs_f32();
                time_last_iter = Instant::now();

                // A system that failed to update or trigger ends the run.
                if !processed_all || !updated_all {
                    break;
                }

                if max_run_time != 0.0 && iter.time > max_run_time {
                    world_log!(
                        self,
                        LogLevel::Info,
                        "breaking the loop because the maximum run time was exceeded"
                    );
                    break;
                }
            }
        }

        self.stop_systems(&entries, &iter);

        // Workers drain and join here, before the run mutex is released.
        drop(entries);
        drop(run_guard);

        world_log!(self, LogLevel::Info, "stopped running");
    }

    /// Signal the runner thread to stop, and optionally wait for it. Must be
    /// called with `wait = true` only from a thread other than the one
    /// running the world, since waiting means blocking on the run mutex.
    pub fn stop(&self, wait: bool) {
        world_log!(
            self,
            LogLevel::Info,
            "signaling the world to stop running (wait = {})",
            wait
        );
        self.inner.should_stop.store(true, Ordering::SeqCst);
        if wait {
            drop(self.inner.run_lock.lock());
        }
    }

    fn prepare_run(&self) -> (Vec<RunEntry>, Vec<Group>) {
        world_log!(self, LogLevel::Info, "preparing system groups and workers");

        // The snapshot: later mutations of the system list are invisible to
        // this run. Execution schemes and trigger sets are read once here.
        let snapshot: Vec<(String, SharedSystem)> = self
            .inner
            .systems
            .lock()
            .iter()
            .map(|entry| (entry.name.clone(), entry.system.clone()))
            .collect();

        let mut entries: Vec<RunEntry> = snapshot
            .into_iter()
            .map(|(name, system)| {
                let (execution, triggers) = {
                    let guard = system.lock();
                    (guard.execution(), guard.triggers().into_iter().collect())
                };
                RunEntry {
                    system,
                    name,
                    execution,
                    triggers,
                    worker: None,
                }
            })
            .collect();

        let priorities: Vec<i32> = entries
            .iter()
            .map(|entry| entry.execution.priority)
            .sorted()
            .dedup()
            .collect();

        let mut groups = Vec::with_capacity(priorities.len());
        let mut next_worker = 0u64;
        for priority in priorities {
            let members: Vec<usize> = entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.execution.priority == priority)
                .map(|(index, _)| index)
                .collect();

            // A lone system needs no parallelism, and an affinity system must
            // stay on the runner thread. Everything else gets a fresh worker
            // pinned to it for the whole run.
            if members.len() > 1 {
                for &index in &members {
                    if !entries[index].execution.world_thread_only {
                        entries[index].worker = Some(Arc::new(Worker::spawn(next_worker)));
                        next_worker += 1;
                    }
                }
            }

            groups.push(Group { priority, members });
        }

        world_log!(
            self,
            LogLevel::Info,
            "prepared {} system group(s) and {} worker(s)",
            groups.len(),
            next_worker
        );

        (entries, groups)
    }

    fn start_systems(&self, entries: &[RunEntry]) -> bool {
        let ok = Arc::new(AtomicBool::new(true));

        // Starts are fully serialized in registration order: a later system's
        // on_start sees the effects of earlier ones.
        for entry in entries {
            match &entry.worker {
                Some(worker) => {
                    let world = self.clone();
                    let system = entry.system.clone();
                    let name = entry.name.clone();
                    let ok = ok.clone();
                    let worker_id = worker.id();
                    worker.enqueue(move || {
                        if !world.try_start(&system, &name, Some(worker_id)) {
                            ok.store(false, Ordering::SeqCst);
                        }
                    });
                    worker.wait();
                }
                None => {
                    if !self.try_start(&entry.system, &entry.name, None) {
                        ok.store(false, Ordering::SeqCst);
                    }
                }
            }
        }

        ok.load(Ordering::SeqCst)
    }

    fn process_events(&self, entries: &[RunEntry], iter: &Iteration) -> bool {
        // Take everything that is queued right now. The queue lock is not
        // held across dispatches, so a triggered system can re-enqueue
        // freely; whatever arrives during dispatch waits for the next
        // iteration.
        let pending = {
            let mut events = self.inner.events.lock();
            mem::take(&mut *events)
        };
        if pending.is_empty() {
            return true;
        }

        let ok = Arc::new(AtomicBool::new(true));
        for event in pending {
            let event = Arc::new(event);
            for entry in entries {
                if !entry.triggers.contains(&event.kind()) {
                    continue;
                }
                match &entry.worker {
                    Some(worker) => {
                        let world = self.clone();
                        let system = entry.system.clone();
                        let name = entry.name.clone();
                        let event = event.clone();
                        let iter = *iter;
                        let ok = ok.clone();
                        let worker_id = worker.id();
                        worker.enqueue(move || {
                            if !world.try_trigger(&system, &name, Some(worker_id), &iter, &event) {
                                ok.store(false, Ordering::SeqCst);
                            }
                        });
                        worker.wait();
                    }
                    None => {
                        if !self.try_trigger(&entry.system, &entry.name, None, iter, &event) {
                            ok.store(false, Ordering::SeqCst);
                        }
                    }
                }
            }
        }

        ok.load(Ordering::SeqCst)
    }

    fn update_systems(&self, entries: &[RunEntry], groups: &[Group], iter: &Iteration) -> bool {
        let ok = Arc::new(AtomicBool::new(true));

        for group in groups {
            world_log!(
                self,
                LogLevel::Verbose,
                "updating {} system(s) at priority {}",
                group.members.len(),
                group.priority
            );

            // First fan out to every worker-backed system in the group...
            for &index in &group.members {
                let entry = &entries[index];
                if let Some(worker) = &entry.worker {
                    let world = self.clone();
                    let system = entry.system.clone();
                    let name = entry.name.clone();
                    let priority = group.priority;
                    let iter = *iter;
                    let ok = ok.clone();
                    let worker_id = worker.id();
                    worker.enqueue(move || {
                        if !world.try_update(&system, &name, Some(worker_id), priority, &iter) {
                            ok.store(false, Ordering::SeqCst);
                        }
                    });
                }
            }

            // ...then run the ones bound to this thread...
            for &index in &group.members {
                let entry = &entries[index];
                if entry.worker.is_none()
                    && !self.try_update(&entry.system, &entry.name, None, group.priority, iter)
                {
                    ok.store(false, Ordering::SeqCst);
                }
            }

            // ...and hold the line until the whole group is done.
            for entry in entries {
                if let Some(worker) = &entry.worker {
                    worker.wait();
                }
            }
        }

        ok.load(Ordering::SeqCst)
    }

    fn stop_systems(&self, entries: &[RunEntry], iter: &Iteration) {
        // Reverse registration order: the first system started is the last
        // one stopped. Failures are logged but never block later stops.
        for entry in entries.iter().rev() {
            match &entry.worker {
                Some(worker) => {
                    let world = self.clone();
                    let system = entry.system.clone();
                    let name = entry.name.clone();
                    let iter = *iter;
                    let worker_id = worker.id();
                    worker.enqueue(move || {
                        world.try_stop(&system, &name, Some(worker_id), &iter);
                    });
                    worker.wait();
                }
                None => {
                    self.try_stop(&entry.system, &entry.name, None, iter);
                }
            }
        }
    }

    fn try_start(&self, system: &SharedSystem, name: &str, worker_id: Option<u64>) -> bool {
        match worker_id {
            Some(id) => world_log!(
                self,
                LogLevel::Info,
                "starting system {:?} on worker thread #{}",
                name,
                id
            ),
            None => world_log!(
                self,
                LogLevel::Info,
                "starting system {:?} on the world runner thread",
                name
            ),
        }

        match system.lock().on_start(self) {
            Ok(()) => true,
            Err(err) => {
                world_log!(
                    self,
                    LogLevel::Error,
                    "system {:?} couldn't start: {}",
                    name,
                    err
                );
                false
            }
        }
    }

    fn try_trigger(
        &self,
        system: &SharedSystem,
        name: &str,
        worker_id: Option<u64>,
        iter: &Iteration,
        event: &Event,
    ) -> bool {
        match worker_id {
            Some(id) => world_log!(
                self,
                LogLevel::Verbose,
                "triggering system {:?} with an event of kind {} on worker thread #{}",
                name,
                event.kind(),
                id
            ),
            None => world_log!(
                self,
                LogLevel::Verbose,
                "triggering system {:?} with an event of kind {} on the world runner thread",
                name,
                event.kind()
            ),
        }

        match system.lock().on_trigger(self, iter, event) {
            Ok(()) => true,
            Err(err) => {
                world_log!(
                    self,
                    LogLevel::Error,
                    "system {:?} couldn't be triggered: {}",
                    name,
                    err
                );
                false
            }
        }
    }

    fn try_update(
        &self,
        system: &SharedSystem,
        name: &str,
        worker_id: Option<u64>,
        priority: i32,
        iter: &Iteration,
    ) -> bool {
        match worker_id {
            Some(id) => world_log!(
                self,
                LogLevel::Verbose,
                "updating system {:?} at priority {} on worker thread #{}",
                name,
                priority,
                id
            ),
            None => world_log!(
                self,
                LogLevel::Verbose,
                "updating system {:?} at priority {} on the world runner thread",
                name,
                priority
            ),
        }

        match system.lock().on_update(self, iter) {
            Ok(()) => true,
            Err(err) => {
                world_log!(
                    self,
                    LogLevel::Error,
                    "system {:?} couldn't update: {}",
                    name,
                    err
                );
                false
            }
        }
    }

    fn try_stop(&self, system: &SharedSystem, name: &str, worker_id: Option<u64>, iter: &Iteration) {
        match worker_id {
            Some(id) => world_log!(
                self,
                LogLevel::Info,
                "stopping system {:?} on worker thread #{}",
                name,
                id
            ),
            None => world_log!(
                self,
                LogLevel::Info,
                "stopping system {:?} on the world runner thread",
                name
            ),
        }

        if let Err(err) = system.lock().on_stop(self, iter) {
            world_log!(
                self,
                LogLevel::Error,
                "system {:?} couldn't stop: {}",
                name,
                err
            );
        }
    }
}

/// A system as seen by one run: the snapshotted handle, its cached metadata
/// and the worker it is pinned to (none means the runner thread).
struct RunEntry {
    system: SharedSystem,
    name: String,
    execution: Execution,
    triggers: FxHashSet<u64>,
    worker: Option<Arc<Worker>>,
}

/// Systems sharing one priority value. Groups execute in ascending priority
/// order; members execute concurrently, subject to thread affinity.
struct Group {
    priority: i32,
    members: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Named(&'static str);

    impl System for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn quiet_world() -> World {
        World::new(
            "test",
            LogLevel::Error,
            Arc::new(crate::log::StreamLogger::new(io::sink())),
        )
    }

    #[test]
    fn get_system_named_returns_the_first_match() {
        let world = quiet_world();
        let first = world.add_system(Named("dup"));
        world.add_system(Named("dup"));

        let found = world.get_system_named("dup").unwrap();
        assert!(Arc::ptr_eq(&found, &first));
        assert!(world.get_system_named("missing").is_none());
    }

    #[test]
    fn remove_system_named_removes_only_the_first() {
        let world = quiet_world();
        world.add_system(Named("dup"));
        world.add_system(Named("dup"));
        world.add_system(Named("other"));

        world.remove_system_named("dup");
        assert_eq!(world.systems().len(), 2);

        world.remove_systems_named("dup");
        assert_eq!(world.systems().len(), 1);
        assert_eq!(world.systems()[0].name, "other");

        world.remove_systems();
        assert!(world.systems().is_empty());
    }

    #[test]
    fn add_shared_system_keeps_the_same_handle() {
        let world = quiet_world();
        let handle = crate::system::shared(Named("keeper"));
        world.add_shared_system(handle.clone());

        let found = world.get_system_named("keeper").unwrap();
        assert!(Arc::ptr_eq(&found, &handle));
    }

    #[test]
    fn run_with_no_systems_terminates() {
        let world = quiet_world();
        world.run(0.0, 0.01);
    }
}
