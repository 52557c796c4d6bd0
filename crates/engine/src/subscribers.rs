use std::sync::{Arc, Mutex, Weak};

use crate::sync::lock;

pub(crate) type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Listeners of one store, called in subscription order.
pub(crate) struct Subscribers<S> {
    inner: Mutex<Registry<S>>,
}

struct Registry<S> {
    next_id: u64,
    listeners: Vec<(u64, Listener<S>)>,
}

impl<S: 'static> Subscribers<S> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            }),
        })
    }

    pub(crate) fn add(self: &Arc<Self>, listener: Listener<S>) -> Subscription {
        let mut reg = lock(&self.inner);
        let id = reg.next_id;
        reg.next_id += 1;
        reg.listeners.push((id, listener));
        let registry: Weak<dyn Detach> = Arc::downgrade(self) as Weak<dyn Detach>;
        Subscription { id, registry }
    }

    /// Calls every listener outside the registry lock, so a listener may
    /// subscribe or unsubscribe while being notified.
    pub(crate) fn notify(&self, state: &S) {
        let listeners: Vec<Listener<S>> = lock(&self.inner)
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    pub(crate) fn clear(&self) {
        lock(&self.inner).listeners.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<S: 'static> Detach for Subscribers<S> {
    fn detach(&self, id: u64) {
        lock(&self.inner).listeners.retain(|(lid, _)| *lid != id);
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Unsubscribes now. Same as dropping.
    pub fn cancel(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}
