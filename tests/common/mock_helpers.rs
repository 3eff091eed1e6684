//! Mock providers and payload types

use qpipe::Product;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Text query payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextQuery(pub String);

/// Text product, remembering the query it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextProduct {
    pub value: String,
    pub query: TextQuery,
}

impl Product<TextQuery> for TextProduct {
    fn query(&self) -> Option<&TextQuery> {
        Some(&self.query)
    }
}

/// Integer query payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntQuery(pub i64);

/// Integer product, remembering the query it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntProduct {
    pub value: i64,
    pub query: IntQuery,
}

impl Product<IntQuery> for IntProduct {
    fn query(&self) -> Option<&IntQuery> {
        Some(&self.query)
    }
}

/// Text backend appending `_pong`, optionally slow, counting its calls
#[derive(Debug, Default)]
pub struct PongProvider {
    delay: Option<Duration>,
    /// Queries whose product is withheld
    empty_for: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl PongProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Produce nothing for `query`
    pub fn empty_for(mut self, query: &str) -> Self {
        self.empty_for.push(query.to_string());
        self
    }

    /// Shared call counter, readable after the provider moved into a service
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl qpipe::Provider<TextQuery, TextProduct> for PongProvider {
    fn fetch(&self, query: &TextQuery) -> anyhow::Result<Option<TextProduct>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.empty_for.contains(&query.0) {
            return Ok(None);
        }
        Ok(Some(TextProduct {
            value: format!("{}_pong", query.0),
            query: query.clone(),
        }))
    }
}

/// Integer backend multiplying by 1000
#[derive(Debug, Default)]
pub struct ThousandProvider;

impl qpipe::Provider<IntQuery, IntProduct> for ThousandProvider {
    fn fetch(&self, query: &IntQuery) -> anyhow::Result<Option<IntProduct>> {
        Ok(Some(IntProduct {
            value: query.0 * 1000,
            query: *query,
        }))
    }
}

/// Text backend failing for queries starting with `fail`, panicking for `panic`
#[derive(Debug, Default)]
pub struct FlakyProvider;

impl qpipe::Provider<TextQuery, TextProduct> for FlakyProvider {
    fn fetch(&self, query: &TextQuery) -> anyhow::Result<Option<TextProduct>> {
        if query.0.starts_with("fail") {
            anyhow::bail!("backend rejected {}", query.0);
        }
        if query.0 == "panic" {
            panic!("backend crashed");
        }
        Ok(Some(TextProduct {
            value: format!("{}_pong", query.0),
            query: query.clone(),
        }))
    }
}
