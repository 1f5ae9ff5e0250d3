use super::{ErrorHandler, ObservableBinder};
use crate::activable::{CompositeActivable, SerialActivable};
use crate::error::Result;
use crate::property::Property;
use crate::stream::Observable;
use std::sync::Arc;

/// Binder whose bindings follow a lifecycle.
///
/// Each `then*` call declares a binding eagerly but returns it as a
/// [`SerialActivable`] registered in the lifecycle group: the binding is
/// subscribed while the group is activated and released while it is not.
#[derive(Clone)]
pub struct LifecycleBinder<T> {
    binder: ObservableBinder<T>,
    lifecycle: CompositeActivable,
}

impl<T: Clone + Send + Sync + 'static> LifecycleBinder<T> {
    pub fn new(source: Observable<T>, handler: ErrorHandler, lifecycle: CompositeActivable) -> Self {
        Self {
            binder: ObservableBinder::new(source, handler),
            lifecycle,
        }
    }

    pub fn filter<P>(&self, predicate: P) -> LifecycleBinder<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        LifecycleBinder {
            binder: self.binder.filter(predicate),
            lifecycle: self.lifecycle.clone(),
        }
    }

    pub fn map<U, F>(&self, f: F) -> LifecycleBinder<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        LifecycleBinder {
            binder: self.binder.map(f),
            lifecycle: self.lifecycle.clone(),
        }
    }

    pub fn then<F>(&self, action: F) -> SerialActivable
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let action = Arc::new(action);
        let binder = self.binder.clone();
        self.register(SerialActivable::new(move || {
            let action = Arc::clone(&action);
            binder.then(move || action())
        }))
    }

    pub fn then_consume<F>(&self, action: F) -> SerialActivable
    where
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        let action = Arc::new(action);
        let binder = self.binder.clone();
        self.register(SerialActivable::new(move || {
            let action = Arc::clone(&action);
            binder.then_consume(move |value| action(value))
        }))
    }

    pub fn then_switch<U, F>(&self, action: F) -> SerialActivable
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Observable<U> + Send + Sync + 'static,
    {
        let action = Arc::new(action);
        let binder = self.binder.clone();
        self.register(SerialActivable::new(move || {
            let action = Arc::clone(&action);
            binder.then_switch(move |value| action(value))
        }))
    }

    pub fn to_property(&self, target: &Property<T>) -> SerialActivable {
        let target = target.clone();
        let binder = self.binder.clone();
        self.register(SerialActivable::new(move || binder.to_property(&target)))
    }

    fn register(&self, activable: SerialActivable) -> SerialActivable {
        self.lifecycle.add(activable.clone());
        activable
    }
}
