use super::Activable;
use crate::stream::{SerialSubscription, Subscription};
use std::fmt;
use std::sync::Arc;

struct SerialInner {
    activation: Box<dyn Fn() -> Subscription + Send + Sync>,
    current: SerialSubscription,
    view: Subscription,
}

/// Activable backed by a single subscription factory.
///
/// `activate` disposes the held subscription, if any, then calls the factory
/// and holds the result. `deactivate` disposes the held subscription and
/// keeps the factory.
///
/// # Examples
///
/// ```
/// use rx_viewmodel::{Activable, Property, ReactiveProperty, SerialActivable};
///
/// let source = Property::new(1);
/// let target = Property::new(0);
/// let (from, to) = (source.clone(), target.clone());
/// let binding = SerialActivable::new(move || {
///     let to = to.clone();
///     from.as_observable().subscribe(move |v| {
///         let _ = to.set_value(v);
///     })
/// });
///
/// binding.activate();
/// source.set_value(2).unwrap();
/// binding.deactivate();
/// source.set_value(3).unwrap();
/// assert_eq!(target.value(), Some(2));
/// ```
#[derive(Clone)]
pub struct SerialActivable {
    inner: Arc<SerialInner>,
}

impl SerialActivable {
    pub fn new<F>(activation: F) -> Self
    where
        F: Fn() -> Subscription + Send + Sync + 'static,
    {
        let current = SerialSubscription::new();
        let view = Subscription::new();
        {
            let current = current.clone();
            view.add(move || current.dispose());
        }
        Self {
            inner: Arc::new(SerialInner {
                activation: Box::new(activation),
                current,
                view,
            }),
        }
    }
}

impl Activable for SerialActivable {
    fn activate(&self) {
        if self.inner.view.is_disposed() {
            tracing::debug!("activate ignored on a disposed activable");
            return;
        }
        self.inner.current.clear();
        let subscription = (self.inner.activation)();
        self.inner.current.replace(subscription);
        tracing::debug!("activable activated");
    }

    fn deactivate(&self) {
        if self.inner.current.is_holding() {
            tracing::debug!("activable deactivated");
        }
        self.inner.current.clear();
    }

    fn is_activated(&self) -> bool {
        self.inner.current.is_holding()
    }

    fn as_subscription(&self) -> Subscription {
        self.inner.view.clone()
    }
}

impl fmt::Debug for SerialActivable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialActivable")
            .field("activated", &self.is_activated())
            .field("disposed", &self.inner.view.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (SerialActivable, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let disposed = Arc::new(AtomicUsize::new(0));
        let (c, d) = (created.clone(), disposed.clone());
        let activable = SerialActivable::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            let d = d.clone();
            Subscription::from_fn(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })
        });
        (activable, created, disposed)
    }

    #[test]
    fn starts_deactivated() {
        let (activable, created, _) = counting();
        assert!(!activable.is_activated());
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn activate_twice_keeps_one_live_subscription() {
        let (activable, created, disposed) = counting();
        activable.activate();
        activable.activate();

        assert!(activable.is_activated());
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deactivate_then_activate_creates_fresh_subscription() {
        let (activable, created, disposed) = counting();
        activable.activate();
        activable.deactivate();
        assert!(!activable.is_activated());
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        activable.activate();
        assert!(activable.is_activated());
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn finished_subscription_reads_as_deactivated() {
        let activable = SerialActivable::new(Subscription::disposed);
        activable.activate();
        assert!(!activable.is_activated());
    }

    #[test]
    fn disposed_view_is_permanent() {
        let (activable, created, disposed) = counting();
        activable.activate();
        activable.as_subscription().dispose();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        activable.activate();
        assert!(!activable.is_activated());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }
}
