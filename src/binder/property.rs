use super::{ErrorHandler, ObservableBinder};
use crate::property::{Property, ReactiveProperty};
use crate::stream::{Observable, Observer, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Binds a property to another property or to actions.
#[derive(Clone)]
pub struct PropertyBinder<T> {
    property: Property<T>,
    handler: ErrorHandler,
}

impl<T: Clone + Send + Sync + 'static> PropertyBinder<T> {
    pub fn new(property: &Property<T>, handler: ErrorHandler) -> Self {
        Self {
            property: property.clone(),
            handler,
        }
    }

    /// Keep this property and `other` in sync in both directions.
    ///
    /// `other` first takes this property's current value. When this property
    /// has no value yet, it takes `other`'s current value instead. Values
    /// propagated by the binding are not echoed back to their origin.
    /// Disposing the returned subscription severs both directions.
    ///
    /// # Examples
    ///
    /// ```
    /// use rx_viewmodel::{ErrorHandler, Property, PropertyBinder, ReactiveProperty};
    ///
    /// let name = Property::new("Ada".to_string());
    /// let field = Property::empty();
    /// let binding = PropertyBinder::new(&name, ErrorHandler::unhandled()).to(&field);
    /// assert_eq!(field.value().as_deref(), Some("Ada"));
    ///
    /// field.set_value("Grace".to_string()).unwrap();
    /// assert_eq!(name.value().as_deref(), Some("Grace"));
    ///
    /// binding.dispose();
    /// field.set_value("Linus".to_string()).unwrap();
    /// assert_eq!(name.value().as_deref(), Some("Grace"));
    /// ```
    pub fn to(&self, other: &Property<T>) -> Subscription {
        let binding = Subscription::new();
        let syncing = Arc::new(AtomicBool::new(false));
        let seeded = self.property.has_value();

        self.sync_into(&self.property.as_observable(), other, &syncing, &binding);
        // A seeded `other` would only replay our own value back.
        let replayed = usize::from(seeded);
        self.sync_into(&other.as_observable().skip(replayed), &self.property, &syncing, &binding);
        binding
    }

    /// One-way binder over the property's values.
    pub fn observe(&self) -> ObservableBinder<T> {
        ObservableBinder::new(self.property.as_observable(), self.handler.clone())
    }

    fn sync_into(&self, source: &Observable<T>, target: &Property<T>, syncing: &Arc<AtomicBool>, binding: &Subscription) {
        let target = target.clone();
        let syncing = Arc::clone(syncing);
        let handler = self.handler.clone();
        let terminate = binding.clone();
        source.subscribe_observer(Observer::with_subscription(
            binding.child(),
            move |value| {
                if syncing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return;
                }
                let result = handler.guard(|| target.set_value(value));
                syncing.store(false, Ordering::Release);
                if let Err(error) = result {
                    tracing::warn!(%error, "two-way binding ended by an unhandled error");
                    terminate.dispose();
                }
            },
            |_| {},
            || {},
        ));
    }
}
