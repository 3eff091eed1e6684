//! Composable query pipelines.
//!
//! A [`Pipeline`] is a handle to the head of a persistent chain of
//! configuration nodes. Builder calls never mutate: each returns a new
//! pipeline whose head is one extra node, so any pipeline can be extended,
//! shared across threads and executed repeatedly.
//!
//! # Architecture
//!
//! ```text
//! run / run_all / run_map / using / on      stream / product / products
//!        │                                           │
//!        ▼                                           ▼
//!  [Node] ◄── [Node] ◄── [Node] ── PlanCompiler ──► CompiledPlan ── PlanExecutor
//!                                                                      │
//!                                  query ─► Fetch ─► Remap ─► … ─► FanIn barrier
//! ```
//!
//! # Design
//!
//! - **Lazy validation**: the single backend and the non-empty query list
//!   are checked when a terminal call compiles the chain, never by builders.
//! - **Explicit stages**: mappers become an ordered stage list walked by
//!   iteration, one backend round-trip per stage.
//! - **Continuations**: each stage is one submission whose completion
//!   schedules the next, so workers never block on each other.
//! - **Cross-pipeline hops**: [`Pipeline::run_via`] makes the upstream
//!   pipeline's products the queries of a differently typed pipeline.

pub mod barrier;
pub mod compiled_plan;
pub mod compiler;
pub mod executor;
pub mod node;

pub use barrier::{FanIn, Permit};
pub use compiled_plan::{CompiledPlan, PlanStats, Stage};
pub use compiler::PlanCompiler;
pub use executor::PlanExecutor;
pub use node::{Node, QuerySource};

use crate::error::Result;
use crate::service::ManagerService;
use node::DeferredQueries;
use std::fmt;
use std::sync::Arc;

/// Immutable, cheaply cloneable pipeline handle
pub struct Pipeline<T, H> {
    head: Arc<Node<T, H>>,
}

impl<T, H> Clone for Pipeline<T, H> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<T, H> Default for Pipeline<T, H> {
    fn default() -> Self {
        Self {
            head: Arc::new(Node::root()),
        }
    }
}

impl<T, H> Pipeline<T, H> {
    /// An empty pipeline: no queries, no backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Pipeline::new().using(service)`
    pub fn with_service(service: Arc<dyn ManagerService<T, H>>) -> Self {
        Self::new().using(service)
    }

    fn push(&self, node: Node<T, H>) -> Self {
        Self {
            head: Arc::new(node.under(self.head.clone())),
        }
    }

    /// Head node of the chain
    pub fn head(&self) -> &Arc<Node<T, H>> {
        &self.head
    }

    // ==================== Builders ====================

    /// Add one query
    pub fn run(&self, query: T) -> Self {
        self.push(Node::with_queries(QuerySource::Ready(vec![query])))
    }

    /// Add a batch of queries, kept in order
    pub fn run_all(&self, queries: impl IntoIterator<Item = T>) -> Self {
        self.push(Node::with_queries(QuerySource::Ready(
            queries.into_iter().collect(),
        )))
    }

    /// Add a remap stage: each product is mapped to a new query and run again
    pub fn run_map<F>(&self, mapper: F) -> Self
    where
        F: Fn(&H) -> T + Send + Sync + 'static,
    {
        self.push(Node::with_mapper(Arc::new(mapper)))
    }

    /// Set the backend service. Exactly one must be reachable at terminal time.
    pub fn using(&self, service: Arc<dyn ManagerService<T, H>>) -> Self {
        self.push(Node::with_service(service))
    }

    /// Register a callback invoked with `(query, product)` on every stage completion
    pub fn on<F>(&self, callback: F) -> Self
    where
        F: Fn(&T, Option<&H>) + Send + Sync + 'static,
    {
        self.push(Node::with_callback(Arc::new(callback)))
    }
}

impl<T, H> Pipeline<T, H>
where
    T: Clone + Send + Sync + 'static,
    H: Send + 'static,
{
    /// Hop into a differently typed pipeline.
    ///
    /// When the returned pipeline is executed, this pipeline runs first and
    /// `mapper` turns each of its products into a query of `other`. Errors of
    /// this pipeline surface from the downstream terminal call.
    pub fn run_via<R, K, F>(&self, mapper: F, other: &Pipeline<R, K>) -> Pipeline<R, K>
    where
        F: Fn(&H) -> R + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let produce: DeferredQueries<R> = Arc::new(move || -> Result<Vec<R>> {
            let products = upstream.products()?;
            Ok(products.iter().map(&mapper).collect())
        });
        other.push(Node::with_queries(QuerySource::Deferred(produce)))
    }

    // ==================== Terminals ====================

    /// Resolve the chain without executing it
    pub fn compile(&self) -> Result<CompiledPlan<T, H>> {
        PlanCompiler::compile(&self.head)
    }

    /// Execute and expose the products as an unordered, single-pass sequence
    pub fn stream(&self) -> Result<Products<H>> {
        let plan = self.compile()?;
        let products = PlanExecutor::execute(plan)?;
        Ok(Products {
            inner: products.into_iter(),
        })
    }

    /// Execute and return the first available product
    pub fn product(&self) -> Result<Option<H>> {
        Ok(self.stream()?.next())
    }

    /// Execute and return every product, in completion order
    pub fn products(&self) -> Result<Vec<H>> {
        Ok(self.stream()?.collect())
    }
}

impl<T, H> fmt::Debug for Pipeline<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("nodes", &Node::lineage(&self.head).len())
            .field("head", &self.head)
            .finish()
    }
}

/// Products collected by one terminal call
#[derive(Debug)]
pub struct Products<H> {
    inner: std::vec::IntoIter<H>,
}

impl<H> Iterator for Products<H> {
    type Item = H;

    fn next(&mut self) -> Option<H> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<H> ExactSizeIterator for Products<H> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use crate::provider::provider_fn;
    use crate::service::ConcurrentManager;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn pong_service(threads: usize) -> Arc<dyn ManagerService<String, String>> {
        let pool = Arc::new(WorkerPool::new(threads).unwrap());
        let provider = Arc::new(provider_fn(|q: &String| Ok(Some(format!("{}_pong", q)))));
        Arc::new(ConcurrentManager::<String, String>::with_provider(pool, provider))
    }

    fn times_thousand() -> Arc<dyn ManagerService<i64, i64>> {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let provider = Arc::new(provider_fn(|q: &i64| Ok(Some(q * 1000))));
        Arc::new(ConcurrentManager::<i64, i64>::with_provider(pool, provider))
    }

    #[test]
    fn test_single_query_product() {
        let pipeline = Pipeline::with_service(pong_service(2)).run("ping".to_string());
        assert_eq!(pipeline.product().unwrap().as_deref(), Some("ping_pong"));
    }

    #[test]
    fn test_builders_do_not_mutate() {
        let base = Pipeline::with_service(pong_service(2)).run("a".to_string());
        let extended = base.run("b".to_string());

        assert_eq!(base.products().unwrap().len(), 1);
        assert_eq!(extended.products().unwrap().len(), 2);
    }

    #[test]
    fn test_chain_executes_repeatedly() {
        let pipeline = Pipeline::with_service(pong_service(2)).run_all(vec!["x".to_string(); 3]);
        for _ in 0..3 {
            assert_eq!(pipeline.stream().unwrap().len(), 3);
        }
    }

    #[test]
    fn test_remap_returns_second_result() {
        let product = Pipeline::with_service(pong_service(1))
            .run("ping".to_string())
            .run_map(|p: &String| format!("{}!", p))
            .product()
            .unwrap();
        assert_eq!(product.as_deref(), Some("ping_pong!_pong"));
    }

    #[test]
    fn test_callbacks_fire_per_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        Pipeline::with_service(pong_service(1))
            .on(move |q: &String, p: Option<&String>| sink.lock().push((q.clone(), p.cloned())))
            .run("ping".to_string())
            .run_map(|p: &String| p.to_uppercase())
            .products()
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                ("ping".to_string(), Some("ping_pong".to_string())),
                ("PING_PONG".to_string(), Some("PING_PONG_pong".to_string())),
            ]
        );
    }

    #[test]
    fn test_missing_service_is_lazy_configuration_error() {
        let pipeline: Pipeline<String, String> = Pipeline::new().run("ping".to_string());
        assert!(pipeline.products().unwrap_err().is_configuration());
    }

    #[test]
    fn test_two_services_is_configuration_error() {
        let pipeline = Pipeline::with_service(pong_service(1))
            .run("ping".to_string())
            .using(pong_service(1));
        assert!(pipeline.product().unwrap_err().is_configuration());
    }

    #[test]
    fn test_no_query_is_configuration_error() {
        let pipeline = Pipeline::with_service(pong_service(1));
        assert!(pipeline.stream().unwrap_err().is_configuration());
    }

    #[test]
    fn test_run_via_hops_between_types() {
        let text = Pipeline::with_service(pong_service(2));
        let numbers = Pipeline::with_service(times_thousand());

        let product = text
            .run("ping".to_string())
            .run_via(|p: &String| p.len() as i64, &numbers)
            .run_via(|n: &i64| format!("ok_{}", n), &text)
            .product()
            .unwrap();

        assert_eq!(product.as_deref(), Some("ok_9000_pong"));
    }

    #[test]
    fn test_run_via_propagates_upstream_error() {
        let upstream: Pipeline<String, String> = Pipeline::new().run("ping".to_string());
        let numbers = Pipeline::with_service(times_thousand());
        let downstream = upstream.run_via(|p: &String| p.len() as i64, &numbers);
        assert!(downstream.products().unwrap_err().is_configuration());
    }

    #[test]
    fn test_compile_reports_stats() {
        let plan = Pipeline::with_service(pong_service(1))
            .run_all(vec!["a".to_string(), "b".to_string()])
            .run_map(|p: &String| p.clone())
            .compile()
            .unwrap();
        assert_eq!(plan.stats.queries, 2);
        assert_eq!(plan.stats.stages, 2);
        assert_eq!(plan.queries, vec!["a".to_string(), "b".to_string()]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_compiled_queries_keep_builder_order(
            batches in prop::collection::vec(prop::collection::vec(0u32..1000, 0..4), 1..5)
        ) {
            let pool = Arc::new(WorkerPool::new(1).unwrap());
            let provider = Arc::new(provider_fn(|q: &u32| Ok(Some(*q))));
            let service: Arc<dyn ManagerService<u32, u32>> =
                Arc::new(ConcurrentManager::<u32, u32>::with_provider(pool, provider));

            let mut pipeline = Pipeline::with_service(service);
            for batch in &batches {
                pipeline = pipeline.run_all(batch.clone());
            }
            let expected: Vec<u32> = batches.into_iter().flatten().collect();

            match pipeline.compile() {
                Ok(plan) => {
                    prop_assert_eq!(plan.queries, expected);
                }
                Err(e) => {
                    prop_assert!(expected.is_empty());
                    prop_assert!(e.is_configuration());
                }
            }
        }

        #[test]
        fn prop_batch_products_match_as_set(
            queries in prop::collection::hash_set("[a-z]{1,8}", 1..12)
        ) {
            let products: HashSet<String> = Pipeline::with_service(pong_service(4))
                .run_all(queries.iter().cloned())
                .products()
                .unwrap()
                .into_iter()
                .collect();
            let expected: HashSet<String> = queries.iter().map(|q| format!("{}_pong", q)).collect();
            prop_assert_eq!(products, expected);
        }
    }
}
