//! Observer Registry
//!
//! A single-threaded event with an explicit subscriber registry
//! (`SubscriberId → callback`). Subscribing returns a [`Subscription`]
//! guard; dropping the guard removes the callback. Owners therefore cannot
//! leave dangling callbacks behind, whatever order things are torn down in.
//!
//! ```text
//! RenderTexture::resize ──emit──▶ Event<TextureResized>
//!                                   ├─ id 1 → RenderTarget A (dirty = true)
//!                                   └─ id 2 → RenderTarget B (dirty = true)
//! drop(RenderTarget A) ── drops Subscription(1) ── unregisters id 1
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

/// Identifier of one registered callback.
pub type SubscriberId = u64;

type Callback<T> = Rc<dyn Fn(&T)>;

struct Registry<T> {
    next_id: Cell<SubscriberId>,
    callbacks: RefCell<FxHashMap<SubscriberId, Callback<T>>>,
}

trait Unsubscribe {
    fn unsubscribe(&self, id: SubscriberId);
}

impl<T> Unsubscribe for Registry<T> {
    fn unsubscribe(&self, id: SubscriberId) {
        self.callbacks.borrow_mut().remove(&id);
    }
}

/// Event carrying a payload of type `T`.
pub struct Event<T> {
    registry: Rc<Registry<T>>,
}

impl<T: 'static> Event<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Rc::new(Registry {
                next_id: Cell::new(1),
                callbacks: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    /// Registers `callback`. It stays registered for as long as the returned
    /// guard is alive.
    #[must_use = "dropping the subscription unregisters the callback immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = self.registry.next_id.get();
        self.registry.next_id.set(id + 1);
        self.registry
            .callbacks
            .borrow_mut()
            .insert(id, Rc::new(callback));

        let registry = Rc::downgrade(&self.registry) as Weak<dyn Unsubscribe>;
        Subscription { registry, id }
    }

    /// Invokes every registered callback.
    ///
    /// Callbacks are snapshotted first, so a callback may drop subscriptions
    /// (including its own) without re-entrancy issues.
    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<Callback<T>> =
            self.registry.callbacks.borrow().values().cloned().collect();
        for callback in snapshot {
            callback(payload);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.callbacks.borrow().len()
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII registration handle returned by [`Event::subscribe`].
pub struct Subscription {
    registry: Weak<dyn Unsubscribe>,
    id: SubscriberId,
}

impl Subscription {
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The event may already be gone; nothing to unregister then.
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_live_subscribers_only() {
        let event = Event::<u32>::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let first = event.subscribe(move |v| h.set(h.get() + *v));
        let h = hits.clone();
        let second = event.subscribe(move |v| h.set(h.get() + *v * 10));

        event.emit(&1);
        assert_eq!(hits.get(), 11);

        drop(second);
        event.emit(&1);
        assert_eq!(hits.get(), 12);
        assert_eq!(event.subscriber_count(), 1);

        drop(first);
        assert_eq!(event.subscriber_count(), 0);
    }

    #[test]
    fn subscription_outliving_event_is_harmless() {
        let event = Event::<()>::new();
        let sub = event.subscribe(|()| {});
        drop(event);
        drop(sub);
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let event = Event::<()>::new();
        let a = event.subscribe(|()| {});
        let b = event.subscribe(|()| {});
        assert_ne!(a.id(), b.id());
    }
}
