//! Lifecycle listeners for observing submissions and executions
//!
//! Listeners are purely observational. Services notify them at fixed points
//! (`on_submit` when a task is enqueued, `on_exec` when a query has been
//! executed) and never depend on what they do.

use std::fmt;
use std::sync::Arc;

/// Observer of query lifecycle events
pub trait LifecycleListener<T>: Send + Sync {
    /// Called after a query has been accepted for execution
    fn on_submit(&self, _query: &T) {}

    /// Called after a query has been executed
    fn on_exec(&self, _query: &T) {}
}

/// An ordered set of listeners notified together
pub struct Listeners<T> {
    inner: Vec<Arc<dyn LifecycleListener<T>>>,
}

impl<T> Listeners<T> {
    /// Create an empty listener set
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    /// Add a listener
    pub fn with(mut self, listener: Arc<dyn LifecycleListener<T>>) -> Self {
        self.inner.push(listener);
        self
    }

    /// Add a listener in place
    pub fn push(&mut self, listener: Arc<dyn LifecycleListener<T>>) {
        self.inner.push(listener);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn notify_submit(&self, query: &T) {
        for listener in &self.inner {
            listener.on_submit(query);
        }
    }

    pub(crate) fn notify_exec(&self, query: &T) {
        for listener in &self.inner {
            listener.on_exec(query);
        }
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.inner.len())
            .finish()
    }
}

impl<T> FromIterator<Arc<dyn LifecycleListener<T>>> for Listeners<T> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn LifecycleListener<T>>>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// Listener that emits a `trace!` event for every lifecycle notification
#[derive(Debug, Clone)]
pub struct TracingListener {
    name: String,
}

impl TracingListener {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<T: fmt::Debug> LifecycleListener<T> for TracingListener {
    fn on_submit(&self, query: &T) {
        tracing::trace!(listener = %self.name, ?query, "query submitted");
    }

    fn on_exec(&self, query: &T) {
        tracing::trace!(listener = %self.name, ?query, "query executed");
    }
}
