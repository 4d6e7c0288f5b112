//! Single-concurrency scheduling worker
//!
//! One dedicated thread consumes a FIFO of scheduling tasks (disk reads and
//! render hand-offs). Running one task at a time is what makes buffer
//! hand-offs strictly FIFO per session without any further ordering
//! machinery.
//!
//! Cancellation contract: `cancel_pending_and_wait` removes every task that
//! has not started and blocks until the in-flight task (if any) finishes.
//! A task that completes mid-cancellation may still hand a buffer to the
//! render node; callers tolerate this by flushing the node afterwards.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::debug;

/// A queued scheduling task
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

struct WorkerQueue {
    tasks: VecDeque<Task>,
    busy: bool,
}

struct WorkerState {
    inner: Mutex<WorkerQueue>,
    /// Signals the worker that work arrived (or shutdown)
    work_available: Condvar,
    /// Signals cancellers that the in-flight task drained
    work_drained: Condvar,
    stop_flag: AtomicBool,
}

/// FIFO worker queue with exactly one task running at a time
pub(crate) struct ScheduleWorker {
    state: Arc<WorkerState>,
    thread: Option<JoinHandle<()>>,
}

impl ScheduleWorker {
    /// Spawn the worker thread
    pub(crate) fn new(name: &str) -> Self {
        let state = Arc::new(WorkerState {
            inner: Mutex::new(WorkerQueue {
                tasks: VecDeque::new(),
                busy: false,
            }),
            work_available: Condvar::new(),
            work_drained: Condvar::new(),
            stop_flag: AtomicBool::new(false),
        });

        let state_clone = Arc::clone(&state);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::worker_loop(state_clone))
            .expect("failed to spawn scheduling worker thread");

        debug!("Scheduling worker '{}' started", name);

        Self {
            state,
            thread: Some(thread),
        }
    }

    /// Enqueue a task; runs after everything already queued
    pub(crate) fn submit(&self, task: Task) {
        if self.state.stop_flag.load(Ordering::Relaxed) {
            debug!("Scheduling worker stopping; task dropped");
            return;
        }

        let mut inner = self.state.inner.lock().unwrap();
        inner.tasks.push_back(task);
        drop(inner);
        self.state.work_available.notify_one();
    }

    /// Cancel every queued-but-not-started task, then block until the
    /// in-flight task (if any) finishes
    pub(crate) fn cancel_pending_and_wait(&self) {
        let mut inner = self.state.inner.lock().unwrap();
        let cancelled = inner.tasks.len();
        inner.tasks.clear();
        if cancelled > 0 {
            debug!("Cancelled {} pending scheduling tasks", cancelled);
        }
        while inner.busy {
            inner = self.state.work_drained.wait(inner).unwrap();
        }
    }

    fn worker_loop(state: Arc<WorkerState>) {
        loop {
            let task = {
                let mut inner = state.inner.lock().unwrap();

                while inner.tasks.is_empty() && !state.stop_flag.load(Ordering::Relaxed) {
                    inner = state.work_available.wait(inner).unwrap();
                }

                if state.stop_flag.load(Ordering::Relaxed) {
                    break;
                }

                let task = inner.tasks.pop_front();
                if task.is_some() {
                    inner.busy = true;
                }
                task
            };

            if let Some(task) = task {
                task();

                let mut inner = state.inner.lock().unwrap();
                inner.busy = false;
                drop(inner);
                state.work_drained.notify_all();
            }
        }

        debug!("Scheduling worker exiting");
    }
}

impl Drop for ScheduleWorker {
    fn drop(&mut self) {
        self.state.stop_flag.store(true, Ordering::Relaxed);
        self.state.work_available.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
