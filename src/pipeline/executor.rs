//! Plan executor: fans queries out onto the backend and fans products back in.
//!
//! Every query of a compiled plan walks its stages as a chain of
//! submissions. A stage's completion callback notifies the pipeline
//! callbacks, applies the next remap, and submits the follow-up query from
//! the worker it runs on. No worker ever waits for another, so a pool of
//! any size makes progress. The calling thread blocks on a [`FanIn`]
//! barrier until every chain has returned its permit.

use crate::error::{QpipeError, Result};
use crate::pipeline::barrier::{FanIn, Permit};
use crate::pipeline::compiled_plan::{CompiledPlan, StageChain};
use crate::types::Completion;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Runs compiled plans against their backend service
pub struct PlanExecutor;

impl PlanExecutor {
    /// Execute `plan` and return the products of every chain that reached
    /// its last stage with a product, in completion order.
    ///
    /// Blocks until all dispatched chains finished.
    ///
    /// # Errors
    /// `Lifecycle` if called from one of the service's own workers, or if
    /// the service refuses any stage of any query because it is shutting
    /// down. Chains dispatched before the refusal are still awaited and
    /// their products discarded.
    pub fn execute<T, H>(plan: CompiledPlan<T, H>) -> Result<Vec<H>>
    where
        T: Send + 'static,
        H: Send + 'static,
    {
        let CompiledPlan {
            queries,
            chain,
            stats,
        } = plan;

        if chain.service.is_shutting_down() {
            return Err(QpipeError::Lifecycle(
                "backend service is in shutdown state, pipeline cannot execute".to_string(),
            ));
        }
        if chain.service.is_worker_thread() {
            return Err(QpipeError::Lifecycle(
                "pipeline cannot wait for its backend from one of the backend's own workers"
                    .to_string(),
            ));
        }

        let start_time = Instant::now();
        let (fan_in, permits) = FanIn::new(queries.len());
        let (product_tx, product_rx) = unbounded();

        let late_refusal: Refusal = Arc::new(Mutex::new(None));

        let mut refused = None;
        for (query, permit) in queries.into_iter().zip(permits) {
            let dispatched = dispatch(
                chain.clone(),
                0,
                query,
                product_tx.clone(),
                Arc::new(permit),
                late_refusal.clone(),
            );
            if let Err(e) = dispatched {
                refused = Some(e);
                break;
            }
        }
        drop(product_tx);

        fan_in.wait();
        let products: Vec<H> = product_rx.try_iter().collect();

        tracing::debug!(
            "Plan executed: {} of {} queries produced, {:?}",
            products.len(),
            stats.queries,
            start_time.elapsed()
        );

        match refused.or_else(|| late_refusal.lock().take()) {
            Some(e) => Err(e.with_context("pipeline dispatch was refused")),
            None => Ok(products),
        }
    }
}

/// First refusal of a follow-up stage, reported once the barrier opens
type Refusal = Arc<Mutex<Option<QpipeError>>>;

/// Submit stage `stage` of one chain. The completion schedules the next stage.
fn dispatch<T, H>(
    chain: Arc<StageChain<T, H>>,
    stage: usize,
    query: T,
    sink: Sender<H>,
    permit: Arc<Permit>,
    refusal: Refusal,
) -> Result<()>
where
    T: Send + 'static,
    H: Send + 'static,
{
    let service = chain.service.clone();
    let completion: Completion<T, H> = Box::new(move |query: &T, product: Option<H>| {
        chain.notify(query, product.as_ref());

        let Some(product) = product else {
            tracing::debug!("Stage {} yielded no product, chain ends", stage);
            return;
        };

        match chain.remap_after(stage) {
            Some(mapper) => {
                let next = mapper(&product);
                // This closure keeps its own permit handle, so the barrier
                // stays closed until the refusal is recorded.
                let dispatched = dispatch(
                    chain.clone(),
                    stage + 1,
                    next,
                    sink,
                    permit.clone(),
                    refusal.clone(),
                );
                if let Err(e) = dispatched {
                    tracing::warn!("Stage {} could not be scheduled, chain ends: {}", stage + 1, e);
                    let mut first = refusal.lock();
                    if first.is_none() {
                        *first = Some(e);
                    }
                }
            }
            None => {
                // The receiver outlives every permit, so this cannot fail.
                let _ = sink.send(product);
            }
        }
    });

    service.submit(query, Some(completion)).map(|_| ())
}
