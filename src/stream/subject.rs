use super::observer::Terminal;
use super::{Observable, Observer};
use crate::error::Error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

struct SubjectInner<T> {
    observers: Mutex<Vec<(u64, Observer<T>)>>,
    terminal: Mutex<Option<Terminal>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> SubjectInner<T> {
    fn attach(self: &Arc<Self>, observer: Observer<T>) {
        if let Some(terminal) = self.terminal.lock().clone() {
            observer.terminate(terminal);
            return;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push((id, observer.clone()));

        let weak: Weak<Self> = Arc::downgrade(self);
        observer.subscription().add(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.lock().retain(|(other, _)| *other != id);
            }
        });
    }

    fn snapshot(&self) -> Vec<Observer<T>> {
        self.observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }
}

/// Hot stream that pushes every value to its current observers, in
/// subscription order, synchronously on the calling thread.
///
/// Late observers only see values emitted after they subscribed.
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                observers: Mutex::new(Vec::new()),
                terminal: Mutex::new(None),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Push a value to every current observer.
    pub fn next(&self, value: T) {
        self.try_next(value);
    }

    /// Push a value to every current observer and report whether at least
    /// one of them received it.
    pub fn try_next(&self, value: T) -> bool {
        let mut delivered = false;
        // Observers are called outside the lock so they may (un)subscribe.
        for observer in self.inner.snapshot() {
            delivered |= observer.try_next(value.clone());
        }
        delivered
    }

    /// Fail every current and future observer.
    pub fn error(&self, error: Error) {
        self.finish(Terminal::Failed(error));
    }

    /// Complete every current and future observer.
    pub fn complete(&self) {
        self.finish(Terminal::Completed);
    }

    fn finish(&self, terminal: Terminal) {
        {
            let mut current = self.inner.terminal.lock();
            if current.is_some() {
                return;
            }
            *current = Some(terminal.clone());
        }
        let observers = std::mem::take(&mut *self.inner.observers.lock());
        for (_, observer) in observers {
            observer.terminate(terminal.clone());
        }
    }

    pub fn has_observers(&self) -> bool {
        !self.inner.observers.lock().is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    pub(crate) fn attach(&self, observer: Observer<T>) {
        self.inner.attach(observer);
    }

    pub fn as_observable(&self) -> Observable<T> {
        let inner = Arc::clone(&self.inner);
        Observable::create(move |observer| inner.attach(observer))
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_subscription_order() {
        let subject = Subject::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        let _a = subject.as_observable().subscribe(move |v: i32| first.lock().push(("a", v)));
        let second = seen.clone();
        let _b = subject.as_observable().subscribe(move |v: i32| second.lock().push(("b", v)));

        subject.next(1);
        subject.next(2);

        assert_eq!(*seen.lock(), vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn dispose_removes_observer() {
        let subject = Subject::<i32>::new();
        let subscription = subject.as_observable().subscribe(|_| {});
        assert!(subject.has_observers());
        subscription.dispose();
        assert!(!subject.has_observers());
    }

    #[test]
    fn try_next_reports_delivery() {
        let subject = Subject::<i32>::new();
        assert!(!subject.try_next(1));

        let subscription = subject.as_observable().subscribe(|_| {});
        assert!(subject.try_next(2));

        subscription.dispose();
        assert!(!subject.try_next(3));
    }

    #[test]
    fn late_subscriber_sees_completion() {
        let subject = Subject::<i32>::new();
        subject.complete();
        let subscription = subject.as_observable().subscribe(|_| {});
        assert!(subscription.is_disposed());
    }
}
