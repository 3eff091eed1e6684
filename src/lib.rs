//! # qpipe: query → product pipelines on a bounded worker pool
//!
//! A concurrency library for composing "query → product" computations and
//! running them concurrently behind a fan-out/fan-in barrier. Callers bring
//! their own query and product types and a [`Provider`] that turns one into
//! the other.
//!
//! ## Architecture
//!
//! - **Pool**: [`WorkerPool`], a fixed set of named threads fed through a crossbeam channel
//! - **Services**: [`ExecutorService`] runs one query on the calling thread,
//!   [`ManagerService`] schedules queries onto the pool and drains on shutdown
//! - **Pipelines**: [`Pipeline`], an immutable chain of configuration nodes
//!   compiled into an explicit stage list on every terminal call
//! - **Sessions**: [`ManagedPipeline`], a single-use pipeline owning its pool and backend
//!
//! ## Example
//!
//! ```
//! use qpipe::{provider_fn, ConcurrentManager, ManagerService, Pipeline, WorkerPool};
//! use std::sync::Arc;
//!
//! # fn main() -> qpipe::Result<()> {
//! let pool = Arc::new(WorkerPool::new(4)?);
//! let provider = Arc::new(provider_fn(|q: &String| Ok(Some(format!("{}_pong", q)))));
//! let service: Arc<dyn ManagerService<String, String>> =
//!     Arc::new(ConcurrentManager::<String, String>::with_provider(pool, provider));
//!
//! let product = Pipeline::with_service(service.clone())
//!     .run("ping".to_string())
//!     .product()?;
//! assert_eq!(product.as_deref(), Some("ping_pong"));
//!
//! service.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod managed;
pub mod pipeline;
pub mod pool;
pub mod provider;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::PoolConfig;
pub use error::{QpipeError, Result, ResultExt};
pub use listener::{LifecycleListener, Listeners, TracingListener};
pub use managed::ManagedPipeline;
pub use pipeline::{Pipeline, Products};
pub use pool::WorkerPool;
pub use provider::{provider_fn, FnProvider, Provider};
pub use service::{ConcurrentManager, ExecutorService, ManagerService, ProviderExecutor, TaskHandle};
pub use types::{Callback, Completion, Mapper, Product, ServiceStats, TaskState};
