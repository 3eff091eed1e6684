//! Builders for services and pipelines used across integration tests

use super::mock_helpers::{IntProduct, IntQuery, PongProvider, TextProduct, TextQuery, ThousandProvider};
use qpipe::{ConcurrentManager, ManagerService, Pipeline, PoolConfig, Provider, WorkerPool};
use std::sync::Arc;

pub type TextService = Arc<dyn ManagerService<TextQuery, TextProduct>>;
pub type IntService = Arc<dyn ManagerService<IntQuery, IntProduct>>;

/// Builder for a [`ConcurrentManager`] over its own pool
pub struct ServiceBuilder {
    config: PoolConfig,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::with_threads(2),
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    pub fn name(mut self, prefix: &str) -> Self {
        self.config.thread_name_prefix = prefix.to_string();
        self
    }

    pub fn build<T, H, P>(self, provider: P) -> Arc<dyn ManagerService<T, H>>
    where
        T: Send + 'static,
        H: Send + 'static,
        P: Provider<T, H> + 'static,
    {
        let pool = Arc::new(WorkerPool::from_config(&self.config).unwrap());
        Arc::new(ConcurrentManager::<T, H>::with_provider(pool, Arc::new(provider)))
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn text_query(value: &str) -> TextQuery {
    TextQuery(value.to_string())
}

pub fn pong_service(threads: usize) -> TextService {
    ServiceBuilder::new().threads(threads).build(PongProvider::new())
}

pub fn thousand_service(threads: usize) -> IntService {
    ServiceBuilder::new().threads(threads).build(ThousandProvider)
}

pub fn text_pipeline(threads: usize) -> Pipeline<TextQuery, TextProduct> {
    Pipeline::with_service(pong_service(threads))
}

pub fn int_pipeline(threads: usize) -> Pipeline<IntQuery, IntProduct> {
    Pipeline::with_service(thousand_service(threads))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_builder() {
        let service: TextService = ServiceBuilder::new()
            .threads(1)
            .name("builder")
            .build(PongProvider::new());
        assert_eq!(service.count_submitted(), 0);
        service.shutdown().unwrap();
    }
}
