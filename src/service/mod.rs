//! Execution services
//!
//! Two layers sit between a [`Provider`](crate::provider::Provider) and a
//! pipeline:
//!
//! - [`ExecutorService`] - runs one query synchronously on the calling thread
//!   ([`ProviderExecutor`] is the stock implementation)
//! - [`ManagerService`] - schedules queries onto a bounded worker pool, tracks
//!   queued/running counts and drains on shutdown ([`ConcurrentManager`])
//!
//! Pipelines hold a manager as `Arc<dyn ManagerService<T, H>>`, so any
//! implementation of the trait can back a pipeline.

pub mod executor;
pub mod manager;

pub use executor::{ExecutorService, ProviderExecutor};
pub use manager::{ConcurrentManager, ManagerService, TaskHandle};
