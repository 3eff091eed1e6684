use crate::service::ManagerService;
use crate::types::{Callback, Mapper};
use std::fmt;
use std::sync::Arc;

/// One backend round-trip in a query's evaluation.
pub enum Stage<T, H> {
    /// Run the dispatched query itself. Only ever the first stage.
    Fetch,
    /// Derive the next query from the previous product, then run it.
    Remap(Mapper<H, T>),
}

impl<T, H> Clone for Stage<T, H> {
    fn clone(&self) -> Self {
        match self {
            Stage::Fetch => Stage::Fetch,
            Stage::Remap(mapper) => Stage::Remap(mapper.clone()),
        }
    }
}

impl<T, H> fmt::Debug for Stage<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "Fetch"),
            Stage::Remap(_) => write!(f, "Remap"),
        }
    }
}

/// Everything a dispatched query needs to walk its stages.
///
/// Shared by every in-flight evaluation of one terminal call.
pub struct StageChain<T, H> {
    pub stages: Vec<Stage<T, H>>,
    pub callbacks: Vec<Callback<T, H>>,
    pub service: Arc<dyn ManagerService<T, H>>,
}

impl<T, H> StageChain<T, H> {
    /// Invoke every callback for one stage completion
    pub fn notify(&self, query: &T, product: Option<&H>) {
        for callback in &self.callbacks {
            callback(query, product);
        }
    }

    /// The remap following stage `index`, or `None` if `index` is the last stage
    pub fn remap_after(&self, index: usize) -> Option<&Mapper<H, T>> {
        match self.stages.get(index + 1) {
            Some(Stage::Remap(mapper)) => Some(mapper),
            Some(Stage::Fetch) | None => None,
        }
    }
}

/// Resolved form of a pipeline chain, ready to execute
pub struct CompiledPlan<T, H> {
    /// Queries in root-to-head order
    pub queries: Vec<T>,
    pub chain: Arc<StageChain<T, H>>,
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Nodes walked, root included
    pub nodes: usize,

    /// Queries dispatched by one execution
    pub queries: usize,

    /// Backend round-trips per query
    pub stages: usize,

    /// Callbacks invoked on every stage completion
    pub callbacks: usize,

    /// Compilation time in microseconds (deferred sources included)
    pub compile_time_us: u64,
}

impl<T, H> CompiledPlan<T, H> {
    /// Total number of backend calls one execution makes if every stage yields a product
    pub fn max_submissions(&self) -> usize {
        self.stats.queries * self.stats.stages
    }
}

impl<T, H> fmt::Debug for CompiledPlan<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPlan")
            .field("stages", &self.chain.stages)
            .field("stats", &self.stats)
            .finish()
    }
}
