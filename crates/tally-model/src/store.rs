use std::sync::Mutex;

/// Handle returned by [`Store::subscribe`]; pass back to
/// [`Store::unsubscribe`] to stop receiving notifications.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn Fn(&T) + Send>;

/// Injectable shared-state container with subscription-based change
/// notification.
///
/// Independent view components that previously read an ambient module-level
/// value (the current account filter) share a `Store` explicitly instead:
/// whoever owns the value passes the store to every consumer, and consumers
/// subscribe for changes rather than re-reading on their own schedule.
///
/// Listeners run synchronously on the updating thread, in subscription
/// order, after the value has been replaced.
pub struct Store<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    value: T,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_id: u64,
}

impl<T: Clone> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                value,
                listeners: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Replace the value and notify every subscriber.
    pub fn set(&self, value: T) {
        let mut inner = self.lock();
        inner.value = value;
        inner.notify();
    }

    /// Update the value in place and notify every subscriber.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut inner = self.lock();
        f(&mut inner.value);
        inner.notify();
    }

    /// Register a change listener; it is *not* called with the current value.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + 'static) -> SubscriptionId {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().listeners.retain(|(lid, _)| *lid != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        // A poisoned store only means a listener panicked; the value itself
        // is still coherent.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Inner<T> {
    fn notify(&self) {
        for (_, listener) in &self.listeners {
            listener(&self.value);
        }
    }
}
