//! Manager service: schedules executions on a bounded worker pool
//!
//! Every submission moves through `Queued → Running → Completed`. The
//! manager tracks how many tasks sit in each of the first two states with
//! atomic counters and supports exactly one graceful shutdown, which stops
//! new submissions and blocks until all outstanding work has drained.
//!
//! # Failure containment
//!
//! Provider errors and panics (in the provider or the completion callback)
//! are caught at the task boundary, logged, and counted as failures. A
//! failed provider call is reported to the callback as "no product". The
//! worker thread and the counters are never affected.

use crate::error::{QpipeError, Result};
use crate::listener::Listeners;
use crate::pool::WorkerPool;
use crate::provider::Provider;
use crate::service::executor::{ExecutorService, ProviderExecutor};
use crate::types::{Completion, ServiceStats, TaskState};
use crossbeam_channel::bounded;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scheduling of queries onto a worker pool
pub trait ManagerService<T, H>: Send + Sync {
    /// Schedule `query`. `callback` runs on the worker once the query executed.
    fn submit(&self, query: T, callback: Option<Completion<T, H>>) -> Result<TaskHandle>;

    /// Schedule `query` and block until its product is available.
    ///
    /// Fails with a lifecycle error when called from one of the service's
    /// own worker threads.
    fn exec(&self, query: T) -> Result<Option<H>>;

    /// Tasks accepted but not yet picked up by a worker
    fn count_submitted(&self) -> u64;

    /// Tasks currently executing
    fn count_in_progress(&self) -> u64;

    /// Snapshot of all counters
    fn stats(&self) -> ServiceStats;

    /// Whether shutdown has been requested
    fn is_shutting_down(&self) -> bool;

    /// Whether the calling thread is one of the workers this service runs on
    fn is_worker_thread(&self) -> bool;

    /// Refuse further submissions and block until outstanding work drained.
    /// Permitted exactly once.
    fn shutdown(&self) -> Result<()>;
}

// ==================== Task Handle ====================

struct TaskCell {
    state: Mutex<TaskState>,
    changed: Condvar,
}

impl TaskCell {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskState::Queued),
            changed: Condvar::new(),
        })
    }

    fn set(&self, state: TaskState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }
}

/// Handle to a submitted task, resolving when it reaches `Completed`
pub struct TaskHandle {
    cell: Arc<TaskCell>,
}

impl TaskHandle {
    /// Current state of the task
    pub fn state(&self) -> TaskState {
        *self.cell.state.lock()
    }

    /// Whether the task has completed
    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Block until the task has completed
    pub fn wait(self) {
        let mut state = self.cell.state.lock();
        while *state != TaskState::Completed {
            self.cell.changed.wait(&mut state);
        }
    }

    /// Block until the task has completed or `timeout` elapsed.
    /// Returns whether the task completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.cell.state.lock();
        if *state != TaskState::Completed {
            self.cell.changed.wait_while_for(
                &mut state,
                |s| *s != TaskState::Completed,
                timeout,
            );
        }
        *state == TaskState::Completed
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .finish()
    }
}

// ==================== Shared Counters ====================

struct ManagerState {
    queued: AtomicU64,
    running: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    shutting_down: AtomicBool,
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            queued: AtomicU64::new(0),
            running: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
        }
    }

    fn outstanding(&self) -> u64 {
        self.queued.load(Ordering::SeqCst) + self.running.load(Ordering::SeqCst)
    }

    /// Wake the shutdown waiter if this was the last outstanding task
    fn notify_if_drained(&self) {
        if self.outstanding() == 0 && self.shutting_down.load(Ordering::SeqCst) {
            let _guard = self.drain_lock.lock();
            self.drained.notify_all();
        }
    }
}

/// Owns one task's slot in the counters. Dropping it completes the task,
/// whether the job ran, panicked, or was discarded unrun.
struct TaskGuard {
    state: Arc<ManagerState>,
    cell: Arc<TaskCell>,
    started: bool,
    failed: bool,
}

impl TaskGuard {
    fn new(state: Arc<ManagerState>, cell: Arc<TaskCell>) -> Self {
        Self {
            state,
            cell,
            started: false,
            failed: false,
        }
    }

    /// Queued → Running. `running` goes up first so the sum never reads zero.
    fn start(&mut self) {
        self.state.running.fetch_add(1, Ordering::SeqCst);
        self.state.queued.fetch_sub(1, Ordering::SeqCst);
        self.started = true;
        self.cell.set(TaskState::Running);
    }

    fn mark_failed(&mut self) {
        self.failed = true;
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.started {
            if self.failed {
                self.state.failed.fetch_add(1, Ordering::SeqCst);
            }
            self.state.completed.fetch_add(1, Ordering::SeqCst);
            self.state.running.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.state.queued.fetch_sub(1, Ordering::SeqCst);
        }
        self.cell.set(TaskState::Completed);
        self.state.notify_if_drained();
    }
}

// ==================== Concurrent Manager ====================

/// [`ManagerService`] running tasks on a shared [`WorkerPool`]
pub struct ConcurrentManager<T, H> {
    pool: Arc<WorkerPool>,
    executor: Arc<dyn ExecutorService<T, H>>,
    listeners: Listeners<T>,
    state: Arc<ManagerState>,
}

impl<T, H> ConcurrentManager<T, H>
where
    T: Send + 'static,
    H: Send + 'static,
{
    pub fn new(pool: Arc<WorkerPool>, executor: Arc<dyn ExecutorService<T, H>>) -> Self {
        Self {
            pool,
            executor,
            listeners: Listeners::new(),
            state: Arc::new(ManagerState::new()),
        }
    }

    /// Manager over a [`ProviderExecutor`] wrapping `provider`
    pub fn with_provider(pool: Arc<WorkerPool>, provider: Arc<dyn Provider<T, H>>) -> Self {
        Self::new(pool, Arc::new(ProviderExecutor::new(provider)))
    }

    /// Attach task lifecycle listeners
    pub fn with_listeners(mut self, listeners: Listeners<T>) -> Self {
        self.listeners = listeners;
        self
    }

    /// The pool this manager schedules onto
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    fn rejected() -> QpipeError {
        QpipeError::Lifecycle("service is in shutdown state, submissions are blocked".to_string())
    }
}

impl<T, H> ManagerService<T, H> for ConcurrentManager<T, H>
where
    T: Send + 'static,
    H: Send + 'static,
{
    fn submit(&self, query: T, callback: Option<Completion<T, H>>) -> Result<TaskHandle> {
        if self.state.shutting_down.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }

        // Count the task before re-checking the flag: a concurrent shutdown
        // either sees this increment or this submit sees its flag.
        self.state.queued.fetch_add(1, Ordering::SeqCst);
        let cell = TaskCell::new();
        let mut guard = TaskGuard::new(self.state.clone(), cell.clone());
        if self.state.shutting_down.load(Ordering::SeqCst) {
            drop(guard);
            return Err(Self::rejected());
        }

        // The job takes its query from this slot. Holding the slot until
        // listeners saw the submission keeps `on_submit` before `on_exec`.
        let slot = Arc::new(Mutex::new(None));
        let mut pending = slot.lock();
        *pending = Some(query);

        let handoff = slot.clone();
        let executor = self.executor.clone();
        let listeners = self.listeners.clone();
        let job = move || {
            let Some(query) = handoff.lock().take() else {
                return;
            };
            guard.start();

            let product = match catch_unwind(AssertUnwindSafe(|| executor.exec(&query))) {
                Ok(Ok(product)) => product,
                Ok(Err(e)) => {
                    tracing::warn!("Query execution failed, treating as no product: {}", e);
                    guard.mark_failed();
                    None
                }
                Err(_) => {
                    tracing::error!("Provider panicked, treating as no product");
                    guard.mark_failed();
                    None
                }
            };

            if let Some(callback) = callback {
                if catch_unwind(AssertUnwindSafe(|| callback(&query, product))).is_err() {
                    tracing::error!("Completion callback panicked");
                    guard.mark_failed();
                }
            }

            listeners.notify_exec(&query);
            drop(guard);
        };

        self.pool.execute(Box::new(job))?;
        if let Some(query) = pending.as_ref() {
            self.listeners.notify_submit(query);
        }
        drop(pending);

        tracing::trace!(
            queued = self.state.queued.load(Ordering::Relaxed),
            "Task submitted"
        );
        Ok(TaskHandle { cell })
    }

    fn exec(&self, query: T) -> Result<Option<H>> {
        if self.pool.is_worker_thread() {
            return Err(QpipeError::Lifecycle(
                "exec cannot wait for the pool from one of its own workers".to_string(),
            ));
        }
        let (tx, rx) = bounded(1);
        self.submit(
            query,
            Some(Box::new(move |_: &T, product: Option<H>| {
                let _ = tx.send(product);
            })),
        )?;
        // A disconnected channel means the task was discarded before running.
        Ok(rx.recv().ok().flatten())
    }

    fn count_submitted(&self) -> u64 {
        self.state.queued.load(Ordering::SeqCst)
    }

    fn count_in_progress(&self) -> u64 {
        self.state.running.load(Ordering::SeqCst)
    }

    fn stats(&self) -> ServiceStats {
        ServiceStats {
            queued: self.state.queued.load(Ordering::SeqCst),
            running: self.state.running.load(Ordering::SeqCst),
            completed: self.state.completed.load(Ordering::SeqCst),
            failed: self.state.failed.load(Ordering::SeqCst),
            shutting_down: self.state.shutting_down.load(Ordering::SeqCst),
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.state.shutting_down.load(Ordering::SeqCst)
    }

    fn is_worker_thread(&self) -> bool {
        self.pool.is_worker_thread()
    }

    fn shutdown(&self) -> Result<()> {
        if self.pool.is_worker_thread() {
            return Err(QpipeError::Lifecycle(
                "shutdown cannot wait for the pool from one of its own workers".to_string(),
            ));
        }
        if self
            .state
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(QpipeError::Lifecycle("already is in shutdown state".to_string()));
        }

        let outstanding = self.state.outstanding();
        tracing::info!("Manager shutting down with {} outstanding task(s)", outstanding);

        if outstanding != 0 {
            let mut guard = self.state.drain_lock.lock();
            while self.state.outstanding() != 0 {
                self.state.drained.wait(&mut guard);
            }
        }

        self.executor.shutdown();
        tracing::info!(
            "Manager drained: {} completed, {} failed",
            self.state.completed.load(Ordering::SeqCst),
            self.state.failed.load(Ordering::SeqCst)
        );
        Ok(())
    }
}

impl<T, H> std::fmt::Debug for ConcurrentManager<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentManager")
            .field("pool", &self.pool)
            .field("queued", &self.state.queued.load(Ordering::Relaxed))
            .field("running", &self.state.running.load(Ordering::Relaxed))
            .field("shutting_down", &self.state.shutting_down.load(Ordering::Relaxed))
            .finish()
    }
}
