//! In-flight load coalescing.
//!
//! Concurrent callers asking for the same key share one pending future, so a
//! burst of cache misses costs a single load. Unrelated keys never wait on
//! each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::Result;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T>>>;
type PendingMap<T> = HashMap<String, (u64, SharedLoad<T>)>;

/// Map from key to the load currently running for it.
///
/// A load removes its own entry in the same poll that produces its result,
/// so waiters never touch the map after the result exists. Dropping a
/// waiter at any point cannot strand a finished load in the map.
pub struct InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pending: Arc<Mutex<PendingMap<T>>>,
    next_id: AtomicU64,
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Awaits the load for `key`, starting it with `load` if none is running.
    ///
    /// Returns the shared result and whether this caller joined a load
    /// started by someone else. `load` is only called by the first caller.
    pub async fn run<F, Fut>(&self, key: &str, load: F) -> (Result<T>, bool)
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (flight, joined) = {
            let mut pending = lock(&self.pending);
            match pending.get(key) {
                Some((_, flight)) => (flight.clone(), true),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let flight = self.track(key, id, load());
                    pending.insert(key.to_string(), (id, flight.clone()));
                    (flight, false)
                }
            }
        };

        (flight.await, joined)
    }

    /// Wraps `load` so it unregisters itself on completion.
    fn track<Fut>(&self, key: &str, id: u64, load: Fut) -> SharedLoad<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        let key = key.to_string();
        async move {
            let result = load.await;
            let mut pending = lock(&pending);
            // A newer load may already own the slot.
            if pending.get(&key).is_some_and(|(current, _)| *current == id) {
                pending.remove(&key);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Number of keys with a load in progress.
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }
}

// The map holds no invariant a panicking holder could break.
fn lock<T>(pending: &Mutex<PendingMap<T>>) -> MutexGuard<'_, PendingMap<T>>
where
    T: Clone + Send + Sync + 'static,
{
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Default for InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
