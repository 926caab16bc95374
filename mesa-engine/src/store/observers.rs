//! Observer registry
//!
//! Views register callbacks per entity kind and get a [`Subscription`] back;
//! dropping the subscription unregisters the callback. Callbacks run on the
//! publishing task after the store lock has been released, so they may read
//! the store.

use parking_lot::Mutex;
use shared::message::{ChangeNotice, EntityKind, SyncFailure};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Event delivered to change observers
pub type StoreEvent = ChangeNotice;

type ChangeCallback = Arc<dyn Fn(&StoreEvent) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(&SyncFailure) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    change: BTreeMap<u64, (EntityKind, ChangeCallback)>,
    failure: BTreeMap<u64, FailureCallback>,
}

/// Explicit publish/subscribe registry owned by the store
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ObserverRegistry")
            .field("change_observers", &inner.change.len())
            .field("failure_observers", &inner.failure.len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe changes to one entity kind
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn subscribe<F>(&self, kind: EntityKind, callback: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.change.insert(id, (kind, Arc::new(callback)));
        Subscription {
            id,
            slot: Slot::Change,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Observe remote write failures
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn subscribe_sync_errors<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncFailure) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.failure.insert(id, Arc::new(callback));
        Subscription {
            id,
            slot: Slot::Failure,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, event: &StoreEvent) {
        let callbacks: Vec<ChangeCallback> = {
            let inner = self.inner.lock();
            inner
                .change
                .values()
                .filter(|(kind, _)| *kind == event.kind)
                .map(|(_, cb)| cb.clone())
                .collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn publish_sync_failure(&self, failure: &SyncFailure) {
        let callbacks: Vec<FailureCallback> = self.inner.lock().failure.values().cloned().collect();
        for callback in callbacks {
            callback(failure);
        }
    }

    /// Number of live observers (change + failure)
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.change.len() + inner.failure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Change,
    Failure,
}

/// Registration handle; unregisters on drop
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    slot: Slot,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut inner = registry.lock();
            match self.slot {
                Slot::Change => {
                    inner.change.remove(&self.id);
                }
                Slot::Failure => {
                    inner.failure.remove(&self.id);
                }
            }
        }
    }
}
