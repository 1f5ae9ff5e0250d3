use super::Subscription;
use crate::error::Error;
use std::sync::Arc;

/// How a stream ended.
#[derive(Debug, Clone)]
pub(crate) enum Terminal {
    Completed,
    Failed(Error),
}

/// Receiving end of an [`Observable`](super::Observable).
///
/// An observer owns the [`Subscription`] of the stream it is attached to.
/// Terminal events are delivered at most once, and nothing is delivered
/// after a terminal event or after the subscription has been disposed.
pub struct Observer<T> {
    on_next: Arc<dyn Fn(T) + Send + Sync>,
    on_error: Arc<dyn Fn(Error) + Send + Sync>,
    on_complete: Arc<dyn Fn() + Send + Sync>,
    subscription: Subscription,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            on_next: Arc::clone(&self.on_next),
            on_error: Arc::clone(&self.on_error),
            on_complete: Arc::clone(&self.on_complete),
            subscription: self.subscription.clone(),
        }
    }
}

impl<T: 'static> Observer<T> {
    /// Create an observer with a fresh subscription.
    pub fn new<N, E, C>(next: N, error: E, complete: C) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(Error) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        Self::with_subscription(Subscription::new(), next, error, complete)
    }

    /// Create an observer bound to an existing subscription.
    pub fn with_subscription<N, E, C>(subscription: Subscription, next: N, error: E, complete: C) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(Error) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        Self {
            on_next: Arc::new(next),
            on_error: Arc::new(error),
            on_complete: Arc::new(complete),
            subscription,
        }
    }

    pub fn next(&self, value: T) {
        self.try_next(value);
    }

    /// [`next`](Observer::next), reporting whether the value was delivered.
    pub(crate) fn try_next(&self, value: T) -> bool {
        if self.subscription.is_disposed() {
            return false;
        }
        (self.on_next)(value);
        true
    }

    pub fn error(&self, error: Error) {
        if self.subscription.dispose() {
            (self.on_error)(error);
        }
    }

    pub fn complete(&self) {
        if self.subscription.dispose() {
            (self.on_complete)();
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn is_closed(&self) -> bool {
        self.subscription.is_disposed()
    }

    pub(crate) fn terminate(&self, terminal: Terminal) {
        match terminal {
            Terminal::Completed => self.complete(),
            Terminal::Failed(error) => self.error(error),
        }
    }

    /// Build an upstream observer that feeds this one.
    ///
    /// Its subscription is a child of this observer's subscription, and its
    /// terminal events are forwarded here.
    pub fn relay<S, N>(&self, next: N) -> Observer<S>
    where
        S: 'static,
        N: Fn(S) + Send + Sync + 'static,
    {
        let on_error = self.clone();
        let on_complete = self.clone();
        Observer::with_subscription(
            self.subscription.child(),
            next,
            move |error| on_error.error(error),
            move || on_complete.complete(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn terminal_is_delivered_once() {
        let completions = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let nexts = Arc::new(AtomicUsize::new(0));
        let observer = Observer::new(
            {
                let nexts = nexts.clone();
                move |_: i32| {
                    nexts.fetch_add(1, Ordering::SeqCst);
                }
            },
            {
                let errors = errors.clone();
                move |_| {
                    errors.fetch_add(1, Ordering::SeqCst);
                }
            },
            {
                let completions = completions.clone();
                move || {
                    completions.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        observer.next(1);
        observer.complete();
        observer.complete();
        observer.error(Error::msg("late"));
        observer.next(2);

        assert_eq!(nexts.load(Ordering::SeqCst), 1);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn relay_forwards_terminal_events() {
        let completions = Arc::new(AtomicUsize::new(0));
        let completions_clone = completions.clone();
        let downstream = Observer::new(|_: i32| {}, |_| {}, move || {
            completions_clone.fetch_add(1, Ordering::SeqCst);
        });

        let sink = downstream.clone();
        let upstream = downstream.relay(move |v: i32| sink.next(v * 2));
        upstream.complete();

        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(upstream.is_closed());
        assert!(downstream.is_closed());
    }

    #[test]
    fn disposing_downstream_closes_relay() {
        let downstream = Observer::new(|_: i32| {}, |_| {}, || {});
        let upstream = downstream.relay(|_: i32| {});
        downstream.subscription().dispose();
        assert!(upstream.is_closed());
    }
}
