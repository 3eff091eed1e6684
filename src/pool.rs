//! Bounded worker pool
//!
//! A fixed number of named OS threads pull boxed jobs from an unbounded
//! crossbeam channel. Each job runs to completion on the worker that picked
//! it up. Closing the pool drops the sending side of the channel, so
//! workers finish the jobs already queued and then exit.
//!
//! Jobs are expected to contain their own panics (the manager service does);
//! a job that panics anyway is caught here so the worker keeps serving.

use crate::config::PoolConfig;
use crate::error::{QpipeError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

/// A unit of work for the pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    name: String,
    size: usize,
    /// `None` once the pool has been closed
    job_tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
}

impl WorkerPool {
    /// Spawn a pool with `size` workers and the default thread name prefix
    pub fn new(size: usize) -> Result<Self> {
        Self::from_config(&PoolConfig::with_threads(size))
    }

    /// Spawn a pool from a validated configuration
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let (job_tx, job_rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(config.worker_threads);

        for index in 0..config.worker_threads {
            let rx = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || worker_loop(rx))?;
            workers.push(handle);
        }

        let worker_ids = workers.iter().map(|h| h.thread().id()).collect();

        tracing::debug!(
            "Worker pool '{}' started with {} threads",
            config.thread_name_prefix,
            config.worker_threads
        );

        Ok(Self {
            name: config.thread_name_prefix.clone(),
            size: config.worker_threads,
            job_tx: Mutex::new(Some(job_tx)),
            workers: Mutex::new(workers),
            worker_ids,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether [`WorkerPool::shutdown`] has been called
    pub fn is_closed(&self) -> bool {
        self.job_tx.lock().is_none()
    }

    /// Whether the calling thread is one of this pool's workers
    pub fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker_ids.contains(&current)
    }

    /// Enqueue a job. Fails with a lifecycle error once the pool is closed.
    pub fn execute(&self, job: Job) -> Result<()> {
        let guard = self.job_tx.lock();
        let tx = guard.as_ref().ok_or_else(|| {
            QpipeError::Lifecycle(format!("worker pool '{}' is shut down", self.name))
        })?;
        tx.send(job).map_err(|_| {
            QpipeError::Lifecycle(format!("worker pool '{}' has no live workers", self.name))
        })
    }

    /// Stop accepting jobs, let queued jobs finish, and join the workers.
    ///
    /// Idempotent. When called from one of the pool's own workers, that
    /// worker is not joined (it exits once its current job returns).
    pub fn shutdown(&self) {
        let tx = self.job_tx.lock().take();
        if tx.is_none() {
            return;
        }
        drop(tx);

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Worker thread in pool '{}' panicked", self.name);
            }
        }

        tracing::debug!("Worker pool '{}' shut down", self.name);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn worker_loop(job_rx: Receiver<Job>) {
    while let Ok(job) = job_rx.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(
                "Job panicked on worker {:?}",
                thread::current().name().unwrap_or("<unnamed>")
            );
        }
    }
}
