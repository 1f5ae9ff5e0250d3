use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Teardown = Box<dyn FnOnce() + Send>;

struct SubscriptionInner {
    disposed: AtomicBool,
    teardowns: Mutex<Vec<Teardown>>,
}

/// Handle that releases a subscription exactly once.
///
/// Cloning a `Subscription` creates a new handle to the **same** resource:
/// disposing any clone disposes all of them.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Create a live subscription with no teardown attached yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                disposed: AtomicBool::new(false),
                teardowns: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a subscription that runs `teardown` when disposed.
    pub fn from_fn<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let subscription = Self::new();
        subscription.add(teardown);
        subscription
    }

    /// Create a subscription that is already disposed.
    pub fn disposed() -> Self {
        let subscription = Self::new();
        subscription.dispose();
        subscription
    }

    /// Attach a teardown. Runs it immediately if already disposed.
    pub fn add<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut teardowns = self.inner.teardowns.lock();
            if !self.is_disposed() {
                teardowns.push(Box::new(teardown));
                return;
            }
        }
        teardown();
    }

    /// Create a subscription that is disposed together with this one.
    ///
    /// Disposing the child does not affect the parent.
    pub fn child(&self) -> Subscription {
        let child = Subscription::new();
        let handle = child.clone();
        self.add(move || {
            handle.dispose();
        });
        child
    }

    /// Release the resource. Returns `true` only for the call that actually
    /// performed the disposal.
    pub fn dispose(&self) -> bool {
        let teardowns = {
            let mut teardowns = self.inner.teardowns.lock();
            if self.inner.disposed.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *teardowns)
        };
        // Teardowns run outside the lock so they may touch this subscription.
        for teardown in teardowns {
            teardown();
        }
        true
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same subscription.
    pub fn ptr_eq(&self, other: &Subscription) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Holds at most one subscription, disposing the previous one on replacement.
#[derive(Clone, Default)]
pub struct SerialSubscription {
    current: Arc<Mutex<Option<Subscription>>>,
    closed: Subscription,
}

impl SerialSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in `next`, disposing whatever was held before.
    ///
    /// Once this serial subscription is disposed, `next` is disposed
    /// immediately instead of being stored.
    pub fn replace(&self, next: Subscription) {
        if self.closed.is_disposed() {
            next.dispose();
            return;
        }
        let previous = self.current.lock().replace(next);
        if let Some(previous) = previous {
            previous.dispose();
        }
        // Lost a race with `dispose`.
        if self.closed.is_disposed() {
            self.clear();
        }
    }

    /// Dispose the held subscription but keep accepting new ones.
    pub fn clear(&self) {
        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// Whether a live subscription is currently held.
    pub fn is_holding(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|current| !current.is_disposed())
    }

    /// Dispose the held subscription and refuse any further ones.
    pub fn dispose(&self) {
        if self.closed.dispose() {
            self.clear();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.closed.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dispose_runs_teardown_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let subscription = Subscription::from_fn(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.dispose());
        assert!(!subscription.clone().dispose());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(subscription.is_disposed());
    }

    #[test]
    fn add_after_dispose_runs_immediately() {
        let subscription = Subscription::disposed();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        subscription.add(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn child_follows_parent_but_not_the_other_way() {
        let parent = Subscription::new();
        let child = parent.child();
        child.dispose();
        assert!(!parent.is_disposed());

        let child = parent.child();
        parent.dispose();
        assert!(child.is_disposed());
    }

    #[test]
    fn serial_replaces_previous() {
        let serial = SerialSubscription::new();
        let first = Subscription::new();
        let second = Subscription::new();

        serial.replace(first.clone());
        assert!(serial.is_holding());
        serial.replace(second.clone());
        assert!(first.is_disposed());
        assert!(!second.is_disposed());

        serial.dispose();
        assert!(second.is_disposed());

        let late = Subscription::new();
        serial.replace(late.clone());
        assert!(late.is_disposed());
    }
}
