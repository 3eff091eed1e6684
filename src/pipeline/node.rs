//! Persistent configuration nodes.
//!
//! A pipeline is a parent-linked chain of immutable nodes shared through
//! `Arc`. Every builder call allocates one new node pointing at its
//! predecessor and carrying only the field that call supplies. Nodes are
//! never mutated, so chains can be shared across threads and extended from
//! any point without affecting other branches.

use crate::error::Result;
use crate::service::ManagerService;
use crate::types::{Callback, Mapper};
use std::fmt;
use std::sync::Arc;

/// Lazily produced queries, resolved when a terminal call compiles the chain.
pub type DeferredQueries<T> = Arc<dyn Fn() -> Result<Vec<T>> + Send + Sync>;

/// Where a node's queries come from.
pub enum QuerySource<T> {
    /// Queries given directly to `run` / `run_all`.
    Ready(Vec<T>),
    /// Queries derived from another pipeline's products (cross-pipeline hop).
    Deferred(DeferredQueries<T>),
}

impl<T: Clone> QuerySource<T> {
    /// Materialize the queries. Deferred sources run their upstream pipeline.
    pub fn resolve(&self) -> Result<Vec<T>> {
        match self {
            QuerySource::Ready(queries) => Ok(queries.clone()),
            QuerySource::Deferred(produce) => produce(),
        }
    }
}

impl<T> fmt::Debug for QuerySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuerySource::Ready(queries) => write!(f, "Ready({} queries)", queries.len()),
            QuerySource::Deferred(_) => write!(f, "Deferred"),
        }
    }
}

/// One link in a pipeline chain.
pub struct Node<T, H> {
    pub parent: Option<Arc<Node<T, H>>>,
    pub queries: Option<QuerySource<T>>,
    pub callback: Option<Callback<T, H>>,
    pub service: Option<Arc<dyn ManagerService<T, H>>>,
    pub mapper: Option<Mapper<H, T>>,
}

impl<T, H> Node<T, H> {
    /// The empty root of a new chain.
    pub fn root() -> Self {
        Self {
            parent: None,
            queries: None,
            callback: None,
            service: None,
            mapper: None,
        }
    }

    pub fn with_queries(queries: QuerySource<T>) -> Self {
        Self {
            queries: Some(queries),
            ..Self::root()
        }
    }

    pub fn with_callback(callback: Callback<T, H>) -> Self {
        Self {
            callback: Some(callback),
            ..Self::root()
        }
    }

    pub fn with_service(service: Arc<dyn ManagerService<T, H>>) -> Self {
        Self {
            service: Some(service),
            ..Self::root()
        }
    }

    pub fn with_mapper(mapper: Mapper<H, T>) -> Self {
        Self {
            mapper: Some(mapper),
            ..Self::root()
        }
    }

    /// Attach this node under `parent`.
    pub fn under(mut self, parent: Arc<Node<T, H>>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Nodes from the root down to `head`, in builder-call order.
    pub fn lineage(head: &Arc<Node<T, H>>) -> Vec<&Arc<Node<T, H>>> {
        let mut chain = Vec::new();
        let mut current = Some(head);
        while let Some(node) = current {
            chain.push(node);
            current = node.parent.as_ref();
        }
        chain.reverse();
        chain
    }
}

impl<T, H> fmt::Debug for Node<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("root", &self.is_root())
            .field("queries", &self.queries)
            .field("callback", &self.callback.is_some())
            .field("service", &self.service.is_some())
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}
