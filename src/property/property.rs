use super::ReactiveProperty;
use crate::error::{Error, Result};
use crate::stream::{Observable, Observer, Subject, Subscription};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

struct PropertyInner<T> {
    value: RwLock<Option<T>>,
    subject: Subject<T>,
    read_only: bool,
    // Serializes emissions across threads; the flag marks an emission in
    // progress on the owning thread so reentrant updates can be rejected.
    emitting: ReentrantMutex<Cell<bool>>,
    // Internal writes made during an emission, delivered once it returns.
    queued: Mutex<VecDeque<T>>,
    sources: Mutex<Vec<Subscription>>,
}

/// Marks an emission in progress and restores the previous flag even if an
/// observer panics.
struct EmitScope<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> EmitScope<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for EmitScope<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// What to do with a write that arrives while the property is notifying.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Reentry {
    Reject,
    Queue,
}

impl<T: Clone + Send + Sync + 'static> PropertyInner<T> {
    fn new(value: Option<T>, read_only: bool) -> Arc<Self> {
        Arc::new(Self {
            value: RwLock::new(value),
            subject: Subject::new(),
            read_only,
            emitting: ReentrantMutex::new(Cell::new(false)),
            queued: Mutex::new(VecDeque::new()),
            sources: Mutex::new(Vec::new()),
        })
    }

    fn emit(&self, value: T, reentry: Reentry) -> Result<()> {
        let emitting = self.emitting.lock();
        if emitting.get() {
            if reentry == Reentry::Queue {
                self.queued.lock().push_back(value);
                return Ok(());
            }
            tracing::warn!("rejected property update made while notifying its observers");
            return Err(Error::ReentrantUpdate);
        }
        let _scope = EmitScope::enter(&emitting);
        self.deliver(value);
        self.drain();
        Ok(())
    }

    fn deliver(&self, value: T) {
        *self.value.write() = Some(value.clone());
        tracing::trace!(observers = self.subject.observer_count(), "property emitting");
        self.subject.next(value);
    }

    fn drain(&self) {
        loop {
            let next = self.queued.lock().pop_front();
            match next {
                Some(value) => self.deliver(value),
                None => break,
            }
        }
    }

    fn attach(&self, observer: Observer<T>) {
        // Holding the emission lock keeps the replayed value and the live
        // values in order. The replay counts as an emission, so writes made
        // from it are rejected like any other reentrant update.
        let emitting = self.emitting.lock();
        let outermost = !emitting.get();
        let _scope = EmitScope::enter(&emitting);
        let current = self.value.read().clone();
        if let Some(value) = current {
            observer.next(value);
        }
        self.subject.attach(observer);
        if outermost {
            self.drain();
        }
    }

    fn release_sources(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources {
            source.dispose();
        }
    }
}

impl<T> Drop for PropertyInner<T> {
    fn drop(&mut self) {
        for source in self.sources.get_mut().drain(..) {
            source.dispose();
        }
    }
}

/// A single-value container that is also a stream source.
///
/// A property is either *writable* (created with [`new`](Property::new) or
/// [`empty`](Property::empty)) or *read-only*, in which case its value is a
/// projection of one or more sources and direct mutation fails with
/// [`Error::ReadOnlyProperty`].
///
/// Every call to [`set_value`](Property::set_value) is pushed to all
/// observers in subscription order, including repeats of the current value.
/// Subscribing through [`as_observable`](ReactiveProperty::as_observable)
/// first replays the current value, if there is one.
///
/// Cloning a `Property` creates a new handle to the **same** value.
///
/// # Examples
///
/// ```
/// use rx_viewmodel::{Property, ReactiveProperty};
///
/// let count = Property::new(5);
/// let doubled = count.map(|n| n * 2);
/// assert_eq!(doubled.value(), Some(10));
///
/// count.set_value(7).unwrap();
/// assert_eq!(doubled.value(), Some(14));
/// assert!(doubled.set_value(0).is_err());
/// ```
pub struct Property<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.inner.value.read())
            .field("read_only", &self.inner.read_only)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    /// Create a writable property holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            inner: PropertyInner::new(Some(initial), false),
        }
    }

    /// Create a writable property without a value.
    pub fn empty() -> Self {
        Self {
            inner: PropertyInner::new(None, false),
        }
    }

    /// Create a read-only property mirroring the latest value of `source`.
    ///
    /// The property has no value until `source` emits.
    pub fn from_observable(source: &Observable<T>) -> Self {
        let inner = PropertyInner::new(None, true);
        let weak: Weak<PropertyInner<T>> = Arc::downgrade(&inner);
        let subscription = source.subscribe_all(
            move |value| {
                if let Some(inner) = weak.upgrade() {
                    // Queued writes never fail.
                    let _ = inner.emit(value, Reentry::Queue);
                }
            },
            |error| tracing::warn!(%error, "source of a derived property failed"),
            || {},
        );
        inner.sources.lock().push(subscription);
        Self { inner }
    }

    /// Create a read-only property that copies the current value of
    /// `source`, if any, and mirrors its future values.
    pub fn from_property<P>(source: &P) -> Self
    where
        P: ReactiveProperty<T> + ?Sized,
    {
        Self::from_observable(&source.as_observable())
    }

    /// Read-only property holding `f` applied to each value of `self`.
    pub fn map<U, F>(&self, f: F) -> Property<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Property::from_observable(&self.as_observable().map(f))
    }

    /// Read-only property combining the latest values of `sources`.
    ///
    /// Has no value until every source has a value; afterwards it is
    /// recomputed on every emission of any source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `sources` is empty.
    pub fn combine<S, P, F>(sources: &[P], combiner: F) -> Result<Property<T>>
    where
        S: Clone + Send + Sync + 'static,
        P: ReactiveProperty<S>,
        F: Fn(&[S]) -> T + Send + Sync + 'static,
    {
        if sources.is_empty() {
            return Err(Error::InvalidArgument(
                "combine needs at least one source property".to_string(),
            ));
        }
        let streams = sources.iter().map(|source| source.as_observable()).collect();
        Ok(Property::from_observable(&Observable::combine_latest(streams, combiner)))
    }

    /// [`combine`](Property::combine) over two properties of any types.
    pub fn combine2<A, B, PA, PB, F>(first: &PA, second: &PB, combiner: F) -> Property<T>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        PA: ReactiveProperty<A> + ?Sized,
        PB: ReactiveProperty<B> + ?Sized,
        F: Fn(A, B) -> T + Send + Sync + 'static,
    {
        Property::from_observable(&Observable::combine_latest2(
            &first.as_observable(),
            &second.as_observable(),
            combiner,
        ))
    }

    /// Push `value` to every observer.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnlyProperty`] if the property is derived.
    /// - [`Error::ReentrantUpdate`] if called from within one of this
    ///   property's own notifications on the same thread.
    pub fn set_value(&self, value: T) -> Result<()> {
        if self.inner.read_only {
            return Err(Error::ReadOnlyProperty);
        }
        self.inner.emit(value, Reentry::Reject)
    }

    /// `set_value(f(value()))`.
    pub fn update_value<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(Option<T>) -> T,
    {
        if self.inner.read_only {
            return Err(Error::ReadOnlyProperty);
        }
        let current = self.value();
        self.inner.emit(f(current), Reentry::Reject)
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// Release the subscriptions a derived property holds on its sources.
    ///
    /// The property keeps its last value but no longer follows its sources.
    /// Does nothing for writable properties.
    pub fn unbind(&self) {
        self.inner.release_sources();
    }

    /// Write into a property regardless of the read-only flag.
    ///
    /// A write made while the property is notifying is delivered after the
    /// current emission returns instead of being rejected.
    pub(crate) fn publish(&self, value: T) {
        // Queued writes never fail.
        let _ = self.inner.emit(value, Reentry::Queue);
    }
}

impl<T: Clone + Send + Sync + 'static> ReactiveProperty<T> for Property<T> {
    fn value(&self) -> Option<T> {
        self.inner.value.read().clone()
    }

    fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    fn as_observable(&self) -> Observable<T> {
        let inner = Arc::clone(&self.inner);
        Observable::create(move |observer| inner.attach(observer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record<T: Clone + Send + Sync + 'static>(property: &Property<T>) -> Arc<Mutex<Vec<T>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        property.as_observable().subscribe(move |v| sink.lock().push(v));
        seen
    }

    #[test]
    fn replays_current_value_then_every_set() {
        let property = Property::new(5);
        let seen = record(&property);
        property.set_value(7).unwrap();
        property.set_value(7).unwrap();
        assert_eq!(*seen.lock(), vec![5, 7, 7]);
    }

    #[test]
    fn empty_property_has_no_value() {
        let property = Property::<String>::empty();
        assert!(!property.has_value());
        assert_eq!(property.value(), None);
        let seen = record(&property);
        assert!(seen.lock().is_empty());
        property.set_value("hi".to_string()).unwrap();
        assert_eq!(*seen.lock(), vec!["hi".to_string()]);
    }

    #[test]
    fn update_value_sees_current() {
        let property = Property::new(1);
        property.update_value(|v| v.unwrap_or(0) + 41).unwrap();
        assert_eq!(property.value(), Some(42));

        let empty = Property::<i32>::empty();
        empty.update_value(|v| v.map_or(-1, |v| v + 1)).unwrap();
        assert_eq!(empty.value(), Some(-1));
    }

    #[test]
    fn derived_properties_reject_mutation() {
        let source = Property::new(1);
        let mapped = source.map(|v| v + 1);
        let mirrored = Property::from_property(&source);
        let combined = Property::combine2(&source, &mapped, |a: i32, b: i32| a + b);

        for derived in [&mapped, &mirrored, &combined] {
            assert!(derived.is_read_only());
            assert!(matches!(derived.set_value(0), Err(Error::ReadOnlyProperty)));
            assert!(matches!(derived.update_value(|_| 0), Err(Error::ReadOnlyProperty)));
        }
        assert_eq!(combined.value(), Some(3));
    }

    #[test]
    fn map_waits_for_source_value() {
        let source = Property::<i32>::empty();
        let mapped = source.map(|v| v.to_string());
        assert!(!mapped.has_value());
        source.set_value(3).unwrap();
        assert_eq!(mapped.value(), Some("3".to_string()));
    }

    #[test]
    fn combine_rejects_empty_sources() {
        let sources: Vec<Property<i32>> = Vec::new();
        let result = Property::combine(&sources, |values: &[i32]| values.len());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn combine_emits_once_all_sources_have_values() {
        let sources = vec![Property::empty(), Property::empty(), Property::empty()];
        let sum = Property::combine(&sources, |values: &[i32]| values.iter().sum::<i32>()).unwrap();
        let seen = record(&sum);

        sources[0].set_value(5).unwrap();
        sources[1].set_value(7).unwrap();
        assert!(!sum.has_value());
        sources[2].set_value(9).unwrap();

        assert_eq!(sum.value(), Some(21));
        assert_eq!(*seen.lock(), vec![21]);
    }

    #[test]
    fn reentrant_set_is_rejected() {
        let property = Property::new(0);
        let failures = Arc::new(AtomicUsize::new(0));
        let target = property.clone();
        let failures_clone = failures.clone();
        property.as_observable().skip(1).subscribe(move |v| {
            if target.set_value(v + 1).is_err() {
                failures_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        property.set_value(1).unwrap();
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(property.value(), Some(1));
    }

    #[test]
    fn set_from_replay_is_rejected() {
        let property = Property::new(1);
        let target = property.clone();
        let outcome = Arc::new(Mutex::new(None));
        let outcome_sink = outcome.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        property.as_observable().subscribe(move |v| {
            sink.lock().push(v);
            if v == 1 {
                *outcome_sink.lock() = Some(target.set_value(2));
            }
        });

        assert!(matches!(*outcome.lock(), Some(Err(Error::ReentrantUpdate))));
        assert_eq!(property.value(), Some(1));

        property.set_value(3).unwrap();
        assert_eq!(*seen.lock(), vec![1, 3]);
    }

    #[test]
    fn internal_writes_during_emission_are_delivered_afterwards() {
        let property = Property::new(0);
        let writer = property.clone();
        property.as_observable().subscribe(move |v| {
            if v == 1 {
                writer.publish(2);
            }
        });
        let seen = record(&property);

        property.set_value(1).unwrap();
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        assert_eq!(property.value(), Some(2));
    }

    #[test]
    fn unbind_stops_following_source() {
        let source = Property::new(1);
        let mapped = source.map(|v| v * 10);
        mapped.unbind();
        source.set_value(2).unwrap();
        assert_eq!(mapped.value(), Some(10));
    }

    #[test]
    fn dropping_derived_property_releases_source() {
        let source = Property::new(1);
        let mapped = source.map(|v| v * 10);
        assert_eq!(source.inner.subject.observer_count(), 1);
        drop(mapped);
        assert_eq!(source.inner.subject.observer_count(), 0);
    }

    #[test]
    fn setters_on_other_threads_are_serialized() {
        let property = Property::new(0usize);
        let seen = record(&property);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let property = property.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        property.set_value(t * 100 + i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seen.lock().len(), 201);
    }
}
