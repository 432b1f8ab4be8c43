//! Coalescing of concurrent identical requests.

use crate::errors::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

type SharedResult<V> = Shared<BoxFuture<'static, Result<V>>>;

/// Runs at most one request per key at a time.
///
/// Callers arriving while a request for the same key is in flight await the
/// same result. The entry is dropped once the request settles, so the next
/// call starts a fresh request.
pub struct MemoizeUntilSettled<K, V> {
    inflight: Arc<Mutex<HashMap<K, SharedResult<V>>>>,
}

impl<K, V> fmt::Debug for MemoizeUntilSettled<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizeUntilSettled")
            .field("inflight", &self.inflight.lock().len())
            .finish()
    }
}

impl<K, V> Default for MemoizeUntilSettled<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Clone for MemoizeUntilSettled<K, V> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<K, V> MemoizeUntilSettled<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty memoizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the in-flight request for `key`, or starts one with `request`.
    pub async fn run<F, Fut>(&self, key: K, request: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock();
            if let Some(existing) = inflight.get(&key) {
                existing.clone()
            } else {
                let pending = request();
                let registry = Arc::clone(&self.inflight);
                let settled_key = key.clone();
                let shared = async move {
                    let result = pending.await;
                    registry.lock().remove(&settled_key);
                    result
                }
                .boxed()
                .shared();
                inflight.insert(key, shared.clone());
                shared
            }
        };
        shared.await
    }

    /// Returns the number of requests in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Returns true if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
