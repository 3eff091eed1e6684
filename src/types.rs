//! Core types shared by services and pipelines
//!
//! Queries and products are opaque to the engine: callers bring their own
//! types and the engine only moves them between threads. This module holds
//! the function-object aliases used at the seams and the small value types
//! reported by services.
//!
//! # Main Types
//!
//! - [`Callback`] - observer invoked with `(query, product)` when a stage completes
//! - [`Mapper`] - derives a follow-up query from a product
//! - [`Completion`] - one-shot continuation handed to a single submission
//! - [`TaskState`] - Queued → Running → Completed
//! - [`ServiceStats`] - snapshot of a manager's counters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Observer invoked every time a pipeline stage completes.
///
/// Receives the query that was executed and the product, if any.
pub type Callback<T, H> = Arc<dyn Fn(&T, Option<&H>) + Send + Sync>;

/// Derives a follow-up query from the product of a previous stage.
pub type Mapper<H, T> = Arc<dyn Fn(&H) -> T + Send + Sync>;

/// One-shot continuation for a single submission. Takes ownership of the product.
pub type Completion<T, H> = Box<dyn FnOnce(&T, Option<H>) + Send>;

/// A product that knows which query produced it.
///
/// The back reference is informational only; the engine never relies on it.
pub trait Product<T> {
    /// The query this product was produced from, if recorded
    fn query(&self) -> Option<&T> {
        None
    }
}

/// Lifecycle of a unit of work submitted to a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Accepted, waiting for a free worker
    Queued,
    /// Executing on a worker thread
    Running,
    /// Finished (with or without a product)
    Completed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Queued => write!(f, "queued"),
            TaskState::Running => write!(f, "running"),
            TaskState::Completed => write!(f, "completed"),
        }
    }
}

/// Snapshot of a manager service's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Tasks accepted but not yet picked up by a worker
    pub queued: u64,
    /// Tasks currently executing
    pub running: u64,
    /// Tasks that reached Completed
    pub completed: u64,
    /// Completed tasks whose provider or callback failed
    pub failed: u64,
    /// Whether shutdown has been requested
    pub shutting_down: bool,
}

impl ServiceStats {
    /// Tasks not yet completed
    pub fn outstanding(&self) -> u64 {
        self.queued + self.running
    }

    /// Whether the service has no outstanding work
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }
}
