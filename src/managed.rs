//! Managed pipelines: single-use sessions owning their own pool and backend
//!
//! A [`ManagedPipeline`] bundles a [`WorkerPool`], a [`ConcurrentManager`]
//! over a fixed provider and a pipeline already bound to that manager.
//! Every pipeline derived from one constructor call shares the session. The
//! first terminal call consumes it: once its results are collected, the
//! manager is drained and the pool joined, and every further terminal call
//! on the family fails with a lifecycle error.

use crate::config::PoolConfig;
use crate::error::{QpipeError, Result};
use crate::pipeline::{Pipeline, Products};
use crate::pool::WorkerPool;
use crate::provider::Provider;
use crate::service::{ConcurrentManager, ManagerService};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Resources released when a managed pipeline is consumed.
///
/// Erases the query/product types so sessions survive [`ManagedPipeline::run_via`].
trait Session: Send + Sync {
    /// Claim the session for a terminal call. Fails if already claimed.
    fn claim(&self) -> Result<()>;

    fn is_consumed(&self) -> bool;

    /// Drain the manager and join the pool
    fn release(&self);
}

struct PoolSession<T, H> {
    pool: Arc<WorkerPool>,
    manager: Arc<ConcurrentManager<T, H>>,
    consumed: AtomicBool,
}

impl<T, H> Session for PoolSession<T, H>
where
    T: Send + 'static,
    H: Send + 'static,
{
    fn claim(&self) -> Result<()> {
        self.consumed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| {
                QpipeError::Lifecycle(
                    "managed pipeline already executed, its pool is shut down".to_string(),
                )
            })
    }

    fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::SeqCst)
    }

    fn release(&self) {
        if let Err(e) = self.manager.shutdown() {
            tracing::warn!("Managed pipeline manager did not shut down cleanly: {}", e);
        }
        self.pool.shutdown();
        tracing::debug!("Managed pipeline session released");
    }
}

/// Pipeline with a fixed, owned backend that can be executed once
pub struct ManagedPipeline<T, H> {
    inner: Pipeline<T, H>,
    session: Arc<dyn Session>,
}

impl<T, H> Clone for ManagedPipeline<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            session: self.session.clone(),
        }
    }
}

impl<T, H> ManagedPipeline<T, H>
where
    T: Clone + Send + Sync + 'static,
    H: Send + 'static,
{
    /// Start a session with `threads` workers serving `provider`
    pub fn new<P>(threads: usize, provider: P) -> Result<Self>
    where
        P: Provider<T, H> + 'static,
    {
        Self::from_config(&PoolConfig::with_threads(threads), provider)
    }

    /// Start a session with a pool built from `config`
    pub fn from_config<P>(config: &PoolConfig, provider: P) -> Result<Self>
    where
        P: Provider<T, H> + 'static,
    {
        let pool = Arc::new(WorkerPool::from_config(config)?);
        let manager = Arc::new(ConcurrentManager::<T, H>::with_provider(
            pool.clone(),
            Arc::new(provider),
        ));
        let service: Arc<dyn ManagerService<T, H>> = manager.clone();

        Ok(Self {
            inner: Pipeline::with_service(service),
            session: Arc::new(PoolSession {
                pool,
                manager,
                consumed: AtomicBool::new(false),
            }),
        })
    }

    fn rewrap(&self, inner: Pipeline<T, H>) -> Self {
        Self {
            inner,
            session: self.session.clone(),
        }
    }

    /// Whether a terminal call already released this session
    pub fn is_consumed(&self) -> bool {
        self.session.is_consumed()
    }

    /// The bound pipeline, without session bookkeeping
    pub fn pipeline(&self) -> &Pipeline<T, H> {
        &self.inner
    }

    // ==================== Builders ====================

    pub fn run(&self, query: T) -> Self {
        self.rewrap(self.inner.run(query))
    }

    pub fn run_all(&self, queries: impl IntoIterator<Item = T>) -> Self {
        self.rewrap(self.inner.run_all(queries))
    }

    pub fn run_map<F>(&self, mapper: F) -> Self
    where
        F: Fn(&H) -> T + Send + Sync + 'static,
    {
        self.rewrap(self.inner.run_map(mapper))
    }

    pub fn on<F>(&self, callback: F) -> Self
    where
        F: Fn(&T, Option<&H>) + Send + Sync + 'static,
    {
        self.rewrap(self.inner.on(callback))
    }

    /// Always fails: a managed pipeline's backend cannot be replaced
    pub fn using(&self, _service: Arc<dyn ManagerService<T, H>>) -> Result<Self> {
        Err(QpipeError::Configuration(
            "a managed pipeline owns its backend service, 'using()' is not allowed".to_string(),
        ))
    }

    /// Hop into a differently typed pipeline. The result still carries this
    /// session and releases it on its terminal call.
    pub fn run_via<R, K, F>(&self, mapper: F, other: &Pipeline<R, K>) -> ManagedPipeline<R, K>
    where
        F: Fn(&H) -> R + Send + Sync + 'static,
    {
        ManagedPipeline {
            inner: self.inner.run_via(mapper, other),
            session: self.session.clone(),
        }
    }

    /// Run `terminal` once, then release the session whatever the outcome
    fn consume<O>(&self, terminal: impl FnOnce(&Pipeline<T, H>) -> Result<O>) -> Result<O> {
        self.session.claim()?;
        let result = terminal(&self.inner);
        self.session.release();
        result
    }

    // ==================== Terminals ====================

    pub fn stream(&self) -> Result<Products<H>> {
        self.consume(Pipeline::stream)
    }

    pub fn product(&self) -> Result<Option<H>> {
        self.consume(Pipeline::product)
    }

    pub fn products(&self) -> Result<Vec<H>> {
        self.consume(Pipeline::products)
    }
}

impl<T, H> fmt::Debug for ManagedPipeline<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedPipeline")
            .field("pipeline", &self.inner)
            .field("consumed", &self.session.is_consumed())
            .finish()
    }
}
