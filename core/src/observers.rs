//! Explicit observer registration with unsubscribe-on-drop.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ObserverList<T> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

/// A set of callbacks for values of type `T`.
///
/// Handlers are called on the notifying thread, outside the internal lock,
/// so a handler may subscribe or drop subscriptions.
pub struct Observers<T> {
    inner: Arc<Mutex<ObserverList<T>>>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ObserverList {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> Observers<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` until the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut list = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = list.next_id;
            list.next_id += 1;
            list.handlers.push((id, Arc::new(handler)));
            id
        };
        let weak: Weak<Mutex<ObserverList<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut list = inner.lock().unwrap_or_else(PoisonError::into_inner);
                    list.handlers.retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }

    pub fn notify(&self, value: &T) {
        let handlers: Vec<Handler<T>> = {
            let list = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            list.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in handlers {
            handler(value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps a handler registered; dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unsubscribe now rather than at drop.
    pub fn cancel(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
