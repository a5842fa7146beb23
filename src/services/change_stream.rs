//! Live change notifications and the subscription handles shared by every
//! listener-style service.
//!
//! A [`Subscription`] is the only way to stop a listener. It releases itself
//! when dropped, so a view that owns its subscriptions cannot leak them past
//! its own lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;

use crate::types::errors::RemoteRequestError;

/// Invoked on any insert, update or delete in the watched collection. Carries
/// no payload; it is only a refresh trigger.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Subscribes to change notifications for a collection.
#[async_trait]
pub trait ChangeStream: Send + Sync {
    /// Starts delivering notifications for every row of `collection`, without
    /// any row filter. Delivery stops once the returned handle is released.
    async fn subscribe(
        &self,
        collection: &str,
        on_change: ChangeCallback,
    ) -> Result<Subscription, RemoteRequestError>;
}

/// Handle to a registered listener. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(id: u64, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Releases the listener now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.release.is_some())
            .finish()
    }
}

struct RegistryInner<C: ?Sized> {
    next_id: u64,
    entries: HashMap<u64, Arc<C>>,
}

/// Set of callbacks keyed by subscription id. Used by backends to fan a
/// single event out to every current listener.
pub struct SubscriberRegistry<C: ?Sized> {
    inner: Arc<Mutex<RegistryInner<C>>>,
}

impl<C: ?Sized> Clone for SubscriberRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ?Sized + Send + Sync + 'static> Default for SubscriberRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized + Send + Sync + 'static> SubscriberRegistry<C> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 1,
                entries: HashMap::new(),
            })),
        }
    }

    fn lock(inner: &Mutex<RegistryInner<C>>) -> MutexGuard<'_, RegistryInner<C>> {
        inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a callback. The registry only holds a weak link back from the
    /// handle, so dropping the registry first is fine.
    pub fn register(&self, callback: Arc<C>) -> Subscription {
        let id = {
            let mut inner = Self::lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.insert(id, callback);
            id
        };

        let weak: Weak<Mutex<RegistryInner<C>>> = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                Self::lock(&inner).entries.remove(&id);
                tracing::debug!(subscription = id, "listener released");
            }
        })
    }

    /// Current callbacks, cloned out so they can run without the lock held.
    pub fn snapshot(&self) -> Vec<Arc<C>> {
        let inner = Self::lock(&self.inner);
        let mut ids: Vec<&u64> = inner.entries.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| inner.entries.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        Self::lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
