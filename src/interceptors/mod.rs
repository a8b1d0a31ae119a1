//! Request, response and error interceptor chains.
//!
//! Each registry is an ordered list of id-keyed entries. A stage folds the
//! value through a snapshot of its registry taken when the stage starts, so
//! removing an entry affects the next call but never one already running that
//! stage.

use crate::types::{RawResponse, RequestConfig};
use crate::{ApiError, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// One link of an interceptor chain.
///
/// Returning `Err` from a request or response interceptor fails the call.
/// In the error chain the returned error, `Ok` or `Err`, replaces the
/// current one.
#[async_trait]
pub trait Interceptor<T>: Send + Sync {
    async fn intercept(&self, value: T) -> Result<T>;
}

/// Adapter for synchronous closures.
pub struct FnInterceptor<F>(F);

#[async_trait]
impl<T, F> Interceptor<T> for FnInterceptor<F>
where
    T: Send + 'static,
    F: Fn(T) -> Result<T> + Send + Sync,
{
    async fn intercept(&self, value: T) -> Result<T> {
        (self.0)(value)
    }
}

/// Adapter for closures returning a future.
pub struct AsyncFnInterceptor<F>(F);

#[async_trait]
impl<T, F, Fut> Interceptor<T> for AsyncFnInterceptor<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async fn intercept(&self, value: T) -> Result<T> {
        (self.0)(value).await
    }
}

pub fn interceptor_fn<T, F>(f: F) -> FnInterceptor<F>
where
    F: Fn(T) -> Result<T> + Send + Sync,
{
    FnInterceptor(f)
}

pub fn async_interceptor<T, F, Fut>(f: F) -> AsyncFnInterceptor<F>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    AsyncFnInterceptor(f)
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a registered interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(u64);

impl InterceptorId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interceptor#{}", self.0)
    }
}

type Entries<T> = RwLock<Vec<(InterceptorId, Arc<dyn Interceptor<T>>)>>;

trait RemoveEntry: Send + Sync {
    fn remove_entry(&self, id: InterceptorId) -> bool;
}

impl<T: Send + 'static> RemoveEntry for Entries<T> {
    fn remove_entry(&self, id: InterceptorId) -> bool {
        let mut entries = self.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Returned by registration; `remove()` deletes exactly the entries it was
/// issued for. Dropping the handle keeps them registered.
#[derive(Clone, Default)]
pub struct InterceptorHandle {
    entries: Vec<(Weak<dyn RemoveEntry>, InterceptorId)>,
}

impl InterceptorHandle {
    /// Ids covered by this handle, in registration order.
    pub fn ids(&self) -> Vec<InterceptorId> {
        self.entries.iter().map(|(_, id)| *id).collect()
    }

    /// Merge two handles so one `remove()` covers both.
    pub fn combine(mut self, other: InterceptorHandle) -> Self {
        self.entries.extend(other.entries);
        self
    }

    /// Returns true if anything was still registered.
    pub fn remove(&self) -> bool {
        let mut removed = false;
        for (registry, id) in &self.entries {
            if let Some(registry) = registry.upgrade() {
                removed |= registry.remove_entry(*id);
            }
        }
        removed
    }
}

impl fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorHandle")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Ordered interceptors for one stage.
pub struct InterceptorRegistry<T> {
    entries: Arc<Entries<T>>,
}

impl<T> Clone for InterceptorRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: Send + 'static> Default for InterceptorRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T: Send + 'static> InterceptorRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I: Interceptor<T> + 'static>(&self, interceptor: I) -> InterceptorHandle {
        self.add_shared(Arc::new(interceptor))
    }

    /// Register an interceptor that may also be registered elsewhere.
    pub fn add_shared(&self, interceptor: Arc<dyn Interceptor<T>>) -> InterceptorHandle {
        let id = InterceptorId::next();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, interceptor));
        let entries: Arc<dyn RemoveEntry> = self.entries.clone();
        InterceptorHandle {
            entries: vec![(Arc::downgrade(&entries), id)],
        }
    }

    pub fn remove(&self, id: InterceptorId) -> bool {
        self.entries.remove_entry(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn Interceptor<T>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, ic)| Arc::clone(ic))
            .collect()
    }

    /// Fold `value` through every interceptor in registration order.
    pub async fn apply(&self, value: T) -> Result<T> {
        let mut value = value;
        for ic in self.snapshot() {
            value = ic.intercept(value).await?;
        }
        Ok(value)
    }
}

impl InterceptorRegistry<ApiError> {
    /// Error-stage fold: an interceptor's failure replaces the error.
    pub async fn apply_error(&self, error: ApiError) -> ApiError {
        let mut error = error;
        for ic in self.snapshot() {
            error = match ic.intercept(error).await {
                Ok(e) | Err(e) => e,
            };
        }
        error
    }
}

/// The three chains a transport runs.
#[derive(Clone, Default)]
pub struct InterceptorSet {
    pub request: InterceptorRegistry<RequestConfig>,
    pub response: InterceptorRegistry<RawResponse>,
    pub error: InterceptorRegistry<ApiError>,
}

impl InterceptorSet {
    pub fn new() -> Self {
        Self::default()
    }
}
