//! Executor service: turns a provider into an execution primitive

use crate::error::{QpipeError, Result};
use crate::listener::Listeners;
use crate::provider::Provider;
use crate::types::Completion;
use std::sync::Arc;

/// Synchronous execution of single queries
pub trait ExecutorService<T, H>: Send + Sync {
    /// Execute `query` on the calling thread and return the product, if any
    fn exec(&self, query: &T) -> Result<Option<H>>;

    /// Execute `query`, then hand the result to `callback`.
    ///
    /// A failed execution is passed to the callback as `None` before the
    /// error is returned.
    fn exec_with(&self, query: &T, callback: Completion<T, H>) -> Result<()> {
        match self.exec(query) {
            Ok(product) => {
                callback(query, product);
                Ok(())
            }
            Err(e) => {
                callback(query, None);
                Err(e)
            }
        }
    }

    /// Release resources. Stateless executors have nothing to do.
    fn shutdown(&self) {}
}

/// Executor backed by a [`Provider`], notifying listeners after every execution
pub struct ProviderExecutor<T, H> {
    provider: Arc<dyn Provider<T, H>>,
    listeners: Listeners<T>,
}

impl<T, H> ProviderExecutor<T, H> {
    pub fn new(provider: Arc<dyn Provider<T, H>>) -> Self {
        Self {
            provider,
            listeners: Listeners::new(),
        }
    }

    /// Attach lifecycle listeners
    pub fn with_listeners(mut self, listeners: Listeners<T>) -> Self {
        self.listeners = listeners;
        self
    }
}

impl<T, H> ExecutorService<T, H> for ProviderExecutor<T, H> {
    fn exec(&self, query: &T) -> Result<Option<H>> {
        let fetched = self.provider.fetch(query);
        self.listeners.notify_exec(query);
        fetched.map_err(QpipeError::from_provider_error)
    }
}
