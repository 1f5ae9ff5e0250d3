use super::ErrorHandler;
use crate::error::{Error, Result};
use crate::property::Property;
use crate::stream::{Observable, Observer, Subscription};
use std::sync::Arc;

/// Binds a stream to actions.
///
/// Every action runs inside a guard: an `Err` or a panic is routed to the
/// binder's [`ErrorHandler`] and the binding keeps running. When the handler
/// has no sink, the error ends the binding instead.
///
/// # Examples
///
/// ```
/// use rx_viewmodel::{ErrorHandler, ObservableBinder, Property, ReactiveProperty};
///
/// let clicks = Property::new(0);
/// let total = Property::new(0);
/// let sum = total.clone();
/// let _binding = ObservableBinder::new(clicks.as_observable(), ErrorHandler::unhandled())
///     .filter(|n| *n > 0)
///     .then_consume(move |n| sum.update_value(|t| t.unwrap_or(0) + n));
///
/// clicks.set_value(2).unwrap();
/// clicks.set_value(3).unwrap();
/// assert_eq!(total.value(), Some(5));
/// ```
#[derive(Clone)]
pub struct ObservableBinder<T> {
    source: Observable<T>,
    handler: ErrorHandler,
}

impl<T: Clone + Send + Sync + 'static> ObservableBinder<T> {
    pub fn new(source: Observable<T>, handler: ErrorHandler) -> Self {
        Self { source, handler }
    }

    pub fn source(&self) -> &Observable<T> {
        &self.source
    }

    pub fn handler(&self) -> &ErrorHandler {
        &self.handler
    }

    /// Only pass values matching `predicate` to the actions.
    pub fn filter<P>(&self, predicate: P) -> ObservableBinder<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        ObservableBinder::new(self.source.filter(predicate), self.handler.clone())
    }

    /// Pass `f(value)` to the actions instead of `value`.
    pub fn map<U, F>(&self, f: F) -> ObservableBinder<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        ObservableBinder::new(self.source.map(f), self.handler.clone())
    }

    /// Run `action` on every value, ignoring the value itself.
    pub fn then<F>(&self, action: F) -> Subscription
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.then_consume(move |_| action())
    }

    /// Run `action` with every value.
    pub fn then_consume<F>(&self, action: F) -> Subscription
    where
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        let binding = Subscription::new();
        let handler = self.handler.clone();
        let terminate = binding.clone();
        let on_error = self.source_error_route();
        self.source.subscribe_observer(Observer::with_subscription(
            binding,
            move |value| {
                if let Err(error) = handler.guard(|| action(value)) {
                    tracing::warn!(%error, "binding ended by an unhandled action error");
                    terminate.dispose();
                }
            },
            on_error,
            || {},
        ))
    }

    /// Start the stream returned by `action` for every value.
    ///
    /// A new value disposes the stream started for the previous one, so at
    /// most one derived stream is live. Errors of a derived stream are routed
    /// to the handler without ending the binding.
    pub fn then_switch<U, F>(&self, action: F) -> Subscription
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Observable<U> + Send + Sync + 'static,
    {
        let handler = self.handler.clone();
        let action = Arc::new(action);
        let derived = self.source.switch_map(move |value| {
            let action = Arc::clone(&action);
            match handler.guard(move || Ok(action(value))) {
                Ok(Some(stream)) => {
                    let handler = handler.clone();
                    stream.catch_error(move |error| match handler.handle(error) {
                        Ok(()) => Observable::empty(),
                        Err(error) => Observable::error(error),
                    })
                }
                Ok(None) => Observable::empty(),
                Err(error) => Observable::error(error),
            }
        });
        derived.subscribe_all(|_| {}, self.source_error_route(), || {})
    }

    /// Write every value into `target`.
    ///
    /// Rejected writes, such as into a read-only property, are routed to the
    /// handler.
    pub fn to_property(&self, target: &Property<T>) -> Subscription {
        let target = target.clone();
        self.then_consume(move |value| target.set_value(value))
    }

    fn source_error_route(&self) -> impl Fn(Error) + Send + Sync + 'static {
        let handler = self.handler.clone();
        move |error| {
            if let Err(error) = handler.handle(error) {
                tracing::warn!(%error, "bound stream failed with no error handler");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::ReactiveProperty;
    use crate::stream::Subject;
    use parking_lot::Mutex;

    fn collecting() -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        (ErrorHandler::new(move |e| sink.lock().push(e.to_string())), errors)
    }

    #[test]
    fn action_errors_are_routed_and_binding_survives() {
        let (handler, errors) = collecting();
        let source = Subject::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let binding = ObservableBinder::new(source.as_observable(), handler).then_consume(move |n: i32| {
            if n == 2 {
                return Err(Error::msg("two is not allowed"));
            }
            if n == 3 {
                panic!("three");
            }
            sink.lock().push(n);
            Ok(())
        });

        for n in 1..=4 {
            source.next(n);
        }

        assert!(!binding.is_disposed());
        assert_eq!(*seen.lock(), vec![1, 4]);
        assert_eq!(errors.lock().len(), 2);
        assert_eq!(errors.lock()[0], "two is not allowed");
    }

    #[test]
    fn without_sink_an_error_ends_the_binding() {
        let source = Subject::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let binding = ObservableBinder::new(source.as_observable(), ErrorHandler::unhandled()).then_consume(
            move |n: i32| {
                sink.lock().push(n);
                if n == 2 {
                    Err(Error::msg("stop"))
                } else {
                    Ok(())
                }
            },
        );

        source.next(1);
        source.next(2);
        source.next(3);

        assert!(binding.is_disposed());
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert!(!source.has_observers());
    }

    #[test]
    fn then_ignores_values() {
        let source = Subject::new();
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let _binding = ObservableBinder::new(source.as_observable(), ErrorHandler::unhandled()).then(move || {
            *counter.lock() += 1;
            Ok(())
        });
        source.next("a");
        source.next("b");
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn switch_cancels_previous_derived_stream() {
        let (handler, _) = collecting();
        let source = Subject::new();
        let inners: Arc<Mutex<Vec<Subject<i32>>>> = Arc::new(Mutex::new(Vec::new()));
        let created = inners.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let _binding = ObservableBinder::new(source.as_observable(), handler).then_switch(move |_: ()| {
            let inner = Subject::new();
            created.lock().push(inner.clone());
            let sink = sink.clone();
            inner.as_observable().do_on_next(move |v| sink.lock().push(*v))
        });

        source.next(());
        source.next(());
        let inners = inners.lock().clone();
        assert!(!inners[0].has_observers());
        inners[0].next(1);
        inners[1].next(2);

        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn derived_stream_errors_do_not_end_binding() {
        let (handler, errors) = collecting();
        let source = Subject::new();
        let runs = Arc::new(Mutex::new(0));
        let counter = runs.clone();

        let binding = ObservableBinder::new(source.as_observable(), handler).then_switch(move |n: i32| {
            *counter.lock() += 1;
            if n % 2 == 0 {
                Observable::<()>::error(Error::msg("even"))
            } else {
                Observable::just(())
            }
        });

        source.next(1);
        source.next(2);
        source.next(3);

        assert!(!binding.is_disposed());
        assert_eq!(*runs.lock(), 3);
        assert_eq!(*errors.lock(), vec!["even".to_string()]);
    }

    #[test]
    fn to_property_routes_read_only_rejection() {
        let (handler, errors) = collecting();
        let base = Property::new(1);
        let derived = base.map(|v| v * 10);
        let source = Subject::new();

        let _binding = ObservableBinder::new(source.as_observable(), handler).to_property(&derived);
        source.next(5);

        assert_eq!(derived.value(), Some(10));
        assert_eq!(errors.lock().len(), 1);
    }
}
