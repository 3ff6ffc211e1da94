//! Callback registry with copy-on-iterate delivery.
//!
//! The mutex guarding the list is held only while the list is cloned or
//! mutated, never while callbacks run, so a callback may subscribe or
//! unsubscribe (itself or others) without deadlocking or disturbing the
//! delivery in progress.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

impl<T> Detach for Mutex<Entries<T>> {
    fn detach(&self, id: u64) -> bool {
        let mut entries = lock(self);
        let before = entries.callbacks.len();
        entries.callbacks.retain(|(entry_id, _)| *entry_id != id);
        entries.callbacks.len() != before
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared list of listeners for values of type `T`.
pub struct SubscriberRegistry<T> {
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T> Clone for SubscriberRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }
}

impl<T> SubscriberRegistry<T> {
    pub fn len(&self) -> usize {
        lock(&self.entries).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for SubscriberRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<T: 'static> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it stays registered until the returned
    /// [`Subscription`] is unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut entries = lock(&self.entries);
            entries.next_id += 1;
            let id = entries.next_id;
            entries.callbacks.push((id, Arc::new(callback)));
            id
        };
        let registry: Weak<dyn Detach> = Arc::downgrade(&self.entries) as Weak<dyn Detach>;
        Subscription { id, registry }
    }

    /// Call every listener registered when delivery starts.
    ///
    /// Returns the number of listeners called.
    pub fn deliver(&self, value: &T) -> usize {
        let snapshot: Vec<Callback<T>> = lock(&self.entries)
            .callbacks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in &snapshot {
            callback(value);
        }
        snapshot.len()
    }

}

/// Handle returned by [`SubscriberRegistry::subscribe`].
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Remove the listener. Safe to call repeatedly and from inside a
    /// callback; returns true only on the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.detach(self.id))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    use super::*;

    #[test]
    fn delivers_to_every_subscriber() {
        let registry = SubscriberRegistry::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = Arc::clone(&total);
            registry.subscribe(move |value: &u32| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }
        assert_eq!(registry.deliver(&2), 3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = SubscriberRegistry::<u32>::new();
        let subscription = registry.subscribe(|_| {});
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(registry.is_empty());
    }

    #[test]
    fn self_unsubscribe_during_delivery_does_not_skip_others() {
        let registry = SubscriberRegistry::<&'static str>::new();
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let own: Arc<OnceLock<Subscription>> = Arc::new(OnceLock::new());
        let handle = Arc::clone(&own);
        let counter = Arc::clone(&first_calls);
        let subscription = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = handle.get() {
                subscription.unsubscribe();
            }
        });
        own.set(subscription).expect("set once");

        let counter = Arc::clone(&second_calls);
        registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.deliver(&"alert"), 2);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);

        assert_eq!(registry.deliver(&"alert"), 1);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribing_during_delivery_takes_effect_next_time() {
        let registry = SubscriberRegistry::<u32>::new();
        let late_calls = Arc::new(AtomicUsize::new(0));

        let inner_registry = registry.clone();
        let counter = Arc::clone(&late_calls);
        let added = Arc::new(AtomicUsize::new(0));
        let added_flag = Arc::clone(&added);
        registry.subscribe(move |_| {
            if added_flag.fetch_add(1, Ordering::SeqCst) == 0 {
                let counter = Arc::clone(&counter);
                inner_registry.subscribe(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(registry.deliver(&1), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.deliver(&2), 2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_reports_subscriber_count() {
        struct Opaque;
        let registry = SubscriberRegistry::<Opaque>::new();
        registry.subscribe(|_| {});
        assert_eq!(
            format!("{registry:?}"),
            "SubscriberRegistry { subscribers: 1 }"
        );
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let registry = SubscriberRegistry::<u32>::new();
        let subscription = registry.subscribe(|_| {});
        drop(registry);
        assert!(!subscription.unsubscribe());
    }
}
