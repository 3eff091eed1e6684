//! Provider trait: the user-supplied backend that turns a query into a product
//!
//! A provider is invoked concurrently from several worker threads with no
//! serialization by the engine, so implementations must be `Send + Sync`
//! and handle their own interior synchronization if they keep state.

use std::fmt;
use std::marker::PhantomData;

/// Executes one query and produces at most one product.
///
/// `Ok(None)` means the provider ran but produced nothing. An `Err` is
/// contained by the manager service and also treated as "no product".
pub trait Provider<T, H>: Send + Sync {
    /// Fetch the product for `query`
    fn fetch(&self, query: &T) -> anyhow::Result<Option<H>>;
}

/// Adapter that turns a closure into a [`Provider`]
pub struct FnProvider<F, T, H> {
    f: F,
    _marker: PhantomData<fn(&T) -> H>,
}

impl<F, T, H> Provider<T, H> for FnProvider<F, T, H>
where
    F: Fn(&T) -> anyhow::Result<Option<H>> + Send + Sync,
{
    fn fetch(&self, query: &T) -> anyhow::Result<Option<H>> {
        (self.f)(query)
    }
}

impl<F, T, H> fmt::Debug for FnProvider<F, T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider").finish_non_exhaustive()
    }
}

/// Build a provider from a closure
///
/// ```
/// use qpipe::{provider_fn, Provider};
///
/// let pong = provider_fn(|q: &String| Ok(Some(format!("{}_pong", q))));
/// assert_eq!(pong.fetch(&"ping".to_string()).unwrap(), Some("ping_pong".to_string()));
/// ```
pub fn provider_fn<F, T, H>(f: F) -> FnProvider<F, T, H>
where
    F: Fn(&T) -> anyhow::Result<Option<H>> + Send + Sync,
{
    FnProvider {
        f,
        _marker: PhantomData,
    }
}
