use super::{Observer, Subscription};
use crate::error::Error;
use std::fmt;
use std::sync::Arc;

/// A cold, cloneable stream of values.
///
/// Nothing happens until [`subscribe`](Observable::subscribe) is called; each
/// subscription runs the stream's subscribe function once with its own
/// [`Observer`]. Cloning an `Observable` shares the subscribe function, not
/// any running state.
pub struct Observable<T> {
    on_subscribe: Arc<dyn Fn(Observer<T>) + Send + Sync>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: Arc::clone(&self.on_subscribe),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Create a stream from a subscribe function.
    ///
    /// The function pushes values into the observer and attaches any cleanup
    /// to [`Observer::subscription`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rx_viewmodel::Observable;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let numbers = Observable::create(|observer| {
    ///     observer.next(1);
    ///     observer.next(2);
    ///     observer.complete();
    /// });
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = seen.clone();
    /// numbers.subscribe(move |v| sink.lock().unwrap().push(v));
    /// assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    /// ```
    pub fn create<F>(subscribe: F) -> Self
    where
        F: Fn(Observer<T>) + Send + Sync + 'static,
    {
        Self {
            on_subscribe: Arc::new(subscribe),
        }
    }

    /// Build a new stream per subscription.
    pub fn defer<F>(factory: F) -> Self
    where
        F: Fn() -> Observable<T> + Send + Sync + 'static,
    {
        Self::create(move |observer| {
            factory().subscribe_observer(observer);
        })
    }

    pub fn just(value: T) -> Self {
        Self::create(move |observer| {
            observer.next(value.clone());
            observer.complete();
        })
    }

    pub fn from_iter<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Arc<[T]> = values.into_iter().collect();
        Self::create(move |observer| {
            for value in values.iter() {
                if observer.is_closed() {
                    return;
                }
                observer.next(value.clone());
            }
            observer.complete();
        })
    }

    pub fn empty() -> Self {
        Self::create(|observer| observer.complete())
    }

    pub fn never() -> Self {
        Self::create(|_| {})
    }

    pub fn error(error: Error) -> Self {
        Self::create(move |observer| observer.error(error.clone()))
    }

    /// Attach `observer` and return its subscription.
    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        let subscription = observer.subscription().clone();
        if !subscription.is_disposed() {
            (self.on_subscribe)(observer);
        }
        subscription
    }

    /// Subscribe to values only. Errors are logged and end the subscription.
    pub fn subscribe<N>(&self, next: N) -> Subscription
    where
        N: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_observer(Observer::new(
            next,
            |error| tracing::warn!(%error, "stream failed without an error observer"),
            || {},
        ))
    }

    pub fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> Subscription
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(Error) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe_observer(Observer::new(next, error, complete))
    }
}
