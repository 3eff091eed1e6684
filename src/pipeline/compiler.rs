use super::compiled_plan::{CompiledPlan, PlanStats, Stage, StageChain};
use super::node::Node;
use crate::error::{QpipeError, Result, ResultExt};
use crate::service::ManagerService;
use std::sync::Arc;

/// Resolves a node chain into a [`CompiledPlan`]
pub struct PlanCompiler;

impl PlanCompiler {
    /// Compile the chain ending at `head`.
    ///
    /// Walks the lineage root-to-head, collecting queries (concatenated),
    /// callbacks (encounter order), mappers (one remap stage each) and the
    /// backend service. The service is validated before any deferred query
    /// source runs, so a misconfigured downstream never executes its upstream.
    ///
    /// # Errors
    /// `Configuration` if the chain has zero or several services, or no queries.
    /// Errors from deferred sources are propagated with added context.
    pub fn compile<T, H>(head: &Arc<Node<T, H>>) -> Result<CompiledPlan<T, H>>
    where
        T: Clone,
    {
        let start_time = std::time::Instant::now();
        let lineage = Node::lineage(head);

        let service = Self::unique_service(&lineage)?;

        let mut stages = vec![Stage::Fetch];
        stages.extend(
            lineage
                .iter()
                .filter_map(|node| node.mapper.clone())
                .map(Stage::Remap),
        );

        let callbacks: Vec<_> = lineage
            .iter()
            .filter_map(|node| node.callback.clone())
            .collect();

        let mut queries = Vec::new();
        for source in lineage.iter().filter_map(|node| node.queries.as_ref()) {
            queries.extend(
                source
                    .resolve()
                    .context("failed to resolve queries from upstream pipeline")?,
            );
        }

        if queries.is_empty() {
            return Err(QpipeError::Configuration(
                "at least one query must be specified".to_string(),
            ));
        }

        let stats = PlanStats {
            nodes: lineage.len(),
            queries: queries.len(),
            stages: stages.len(),
            callbacks: callbacks.len(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        tracing::debug!(
            "Compiled plan: {} queries x {} stages, {} callbacks ({} nodes, {}us)",
            stats.queries,
            stats.stages,
            stats.callbacks,
            stats.nodes,
            stats.compile_time_us
        );

        Ok(CompiledPlan {
            queries,
            chain: Arc::new(StageChain {
                stages,
                callbacks,
                service,
            }),
            stats,
        })
    }

    fn unique_service<T, H>(
        lineage: &[&Arc<Node<T, H>>],
    ) -> Result<Arc<dyn ManagerService<T, H>>> {
        let mut services = lineage.iter().filter_map(|node| node.service.as_ref());
        let first = services.next().ok_or_else(|| {
            QpipeError::Configuration(
                "a backend service must be specified with 'using()'".to_string(),
            )
        })?;

        let extra = services.count();
        if extra > 0 {
            return Err(QpipeError::Configuration(format!(
                "only one backend service may be specified per pipeline, found {}",
                extra + 1
            )));
        }

        Ok(first.clone())
    }
}
