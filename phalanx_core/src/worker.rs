use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct State {
    jobs: VecDeque<Job>,
    busy: bool,
    stop: bool,
}

struct Shared {
    state: Mutex<State>,
    job_added: Condvar,
    queue_empty: Condvar,
}

/// A single-thread FIFO job executor.
///
/// Spawns its OS thread on construction and keeps waiting for jobs. Jobs
/// handed to one worker run in enqueue order, with the queue lock released
/// around each job body. Dropping the worker requests a cooperative stop;
/// the thread drains the remaining queue, exits and is joined.
///
/// A panicking job does not take the worker down; the panic is caught and
/// reported through `tracing`. Jobs installed by the world scheduler never
/// panic (system failures travel as results), so standalone users of this
/// type should contain their own errors the same way.
pub struct Worker {
    id: u64,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(id: u64) -> Worker {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                jobs: VecDeque::new(),
                busy: false,
                stop: false,
            }),
            job_added: Condvar::new(),
            queue_empty: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name(format!("phalanx-worker-{}", id))
            .spawn(move || Worker::thread_main(id, &thread_shared))
            .expect("failed to spawn worker thread");

        Worker {
            id,
            shared,
            thread: Some(thread),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Push a job to the back of the queue and wake the worker thread.
    pub fn enqueue<F: FnOnce() + Send + 'static>(&self, job: F) {
        {
            let mut state = self.shared.state.lock();
            state.jobs.push_back(Box::new(job));
        }
        self.shared.job_added.notify_all();
    }

    /// Block until the queue is empty and no job is in flight.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while !state.jobs.is_empty() || state.busy {
            self.shared.queue_empty.wait(&mut state);
        }
    }

    fn thread_main(id: u64, shared: &Shared) {
        tracing::trace!(worker = id, "worker thread started");
        loop {
            let job = {
                let mut state = shared.state.lock();
                loop {
                    if let Some(job) = state.jobs.pop_front() {
                        state.busy = true;
                        break Some(job);
                    }
                    shared.queue_empty.notify_all();
                    if state.stop {
                        break None;
                    }
                    shared.job_added.wait(&mut state);
                }
            };

            let job = match job {
                Some(job) => job,
                None => break,
            };

            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!(worker = id, "a queued job panicked; the worker keeps running");
            }
            shared.state.lock().busy = false;
        }
        tracing::trace!(worker = id, "worker thread exiting");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
        }
        // The thread may be parked waiting for jobs that will never come.
        self.shared.job_added.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn jobs_run_in_enqueue_order() {
        let worker = Worker::spawn(0);
        let (tx, rx) = crossbeam_channel::unbounded();

        for i in 0..100 {
            let tx = tx.clone();
            worker.enqueue(move || tx.send(i).unwrap());
        }
        worker.wait();

        let seen: Vec<i32> = rx.try_iter().collect();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn wait_blocks_until_the_running_job_finishes() {
        let worker = Worker::spawn(1);
        let done = Arc::new(AtomicUsize::new(0));

        let flag = done.clone();
        worker.enqueue(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(1, Ordering::SeqCst);
        });
        worker.wait();

        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn all_jobs_observe_the_same_thread() {
        let worker = Worker::spawn(2);
        let ids = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..10 {
            let ids = ids.clone();
            worker.enqueue(move || ids.lock().push(thread::current().id()));
        }
        worker.wait();

        let ids = ids.lock();
        assert_eq!(ids.len(), 10);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_ne!(ids[0], thread::current().id());
    }

    #[test]
    fn a_panicking_job_does_not_kill_the_worker() {
        let worker = Worker::spawn(3);
        let done = Arc::new(AtomicUsize::new(0));

        worker.enqueue(|| panic!("oops"));
        let flag = done.clone();
        worker.enqueue(move || {
            flag.store(1, Ordering::SeqCst);
        });
        worker.wait();

        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_drains_the_queue_before_joining() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let worker = Worker::spawn(4);
            for _ in 0..20 {
                let counter = counter.clone();
                worker.enqueue(move || {
                    thread::sleep(Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }
}
