//! Observable values with replay-on-subscribe observers.
//!
//! Session and connectivity state are both published through
//! [`Observable`]: callers can read the latest value synchronously, register
//! callbacks that fire on every change, or await changes through a
//! `tokio::sync::watch` receiver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Shared<T> {
    sender: watch::Sender<T>,
    observers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

/// A shared value with an observer list.
pub struct Observable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                sender,
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Latest published value.
    pub fn get(&self) -> T {
        self.shared.sender.borrow().clone()
    }

    /// Publish a new value and notify every observer.
    ///
    /// Observers run on the caller's task, outside the observer lock, so a
    /// callback may subscribe or unsubscribe without deadlocking.
    pub fn set(&self, value: T) {
        self.shared.sender.send_replace(value.clone());
        let observers: Vec<Callback<T>> = self
            .shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in observers {
            callback(&value);
        }
    }

    /// Publish only when the value differs from the current one.
    ///
    /// Returns whether observers were notified.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        if *self.shared.sender.borrow() == value {
            return false;
        }
        self.set(value);
        true
    }

    /// Register `callback`; it is invoked immediately with the current value.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<T> = Arc::new(callback);
        let current = {
            let mut observers = self
                .shared
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            observers.push((id, Arc::clone(&callback)));
            self.get()
        };
        callback(&current);

        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared
                        .observers
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(observer_id, _)| *observer_id != id);
                }
            })),
        }
    }

    /// Async receiver that starts at the current value.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.shared.sender.subscribe()
    }

    /// Number of registered callbacks.
    pub fn observer_count(&self) -> usize {
        self.shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by [`Observable::subscribe`]; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn subscribe_replays_current_value() {
        let observable = Observable::new(7_u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = observable.subscribe(move |value| sink.lock().unwrap().push(*value));

        observable.set(8);
        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }

    #[test]
    fn dropping_subscription_stops_notifications() {
        let observable = Observable::new(0_u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = observable.subscribe(move |value| sink.lock().unwrap().push(*value));
        assert_eq!(observable.observer_count(), 1);

        subscription.unsubscribe();
        observable.set(1);

        assert_eq!(observable.observer_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn set_if_changed_skips_identical_values() {
        let observable = Observable::new("a".to_string());
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let _subscription = observable.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        assert!(!observable.set_if_changed("a".to_string()));
        assert!(observable.set_if_changed("b".to_string()));
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn watch_receiver_sees_updates() {
        let observable = Observable::new(1_u8);
        let mut receiver = observable.watch();
        observable.set(2);
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), 2);
    }
}
