use crate::activable::{Activable, CompositeActivable};
use crate::binder::{ErrorHandler, LifecycleBinder, ObservableBinder, PropertyBinder};
use crate::command::{CommandBuilder, CompositeCommand, ReactiveCommand};
use crate::error::{Error, Result};
use crate::interaction::Interaction;
use crate::property::{Property, ReactiveProperty};
use crate::stream::Observable;
use std::fmt;

/// Factory and lifecycle owner for the parts of a view-model.
///
/// Every binder created through a `ViewModel` routes the errors its actions
/// raise to [`handle_error`](ViewModel::handle_error). Bindings declared with
/// [`when`](ViewModel::when) are live only between
/// [`activate`](ViewModel::activate) and [`deactivate`](ViewModel::deactivate),
/// which a view calls when it attaches and detaches.
///
/// # Examples
///
/// ```
/// use rx_viewmodel::{Error, Observable, ReactiveProperty, ViewModel};
/// use std::sync::{Arc, Mutex};
///
/// let errors = Arc::new(Mutex::new(Vec::new()));
/// let sink = errors.clone();
/// let vm = ViewModel::with_error_handler(move |e| sink.lock().unwrap().push(e.to_string()));
///
/// let name = vm.create_property(String::new());
/// let greeting = name.map(|n| format!("Hello, {n}!"));
/// let save = vm.create_command(|_: Option<()>| Observable::<()>::error(Error::msg("disk full")));
///
/// let _on_save = vm.when(save.error()).then_consume(|e| Err(e));
/// vm.activate();
///
/// name.set_value("Ada".to_string()).unwrap();
/// save.execute().subscribe(|_| {});
///
/// assert_eq!(greeting.value().as_deref(), Some("Hello, Ada!"));
/// assert_eq!(*errors.lock().unwrap(), vec!["disk full".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct ViewModel {
    handler: ErrorHandler,
    lifecycle: CompositeActivable,
}

impl ViewModel {
    /// A view-model whose binder errors end the binding that raised them.
    pub fn new() -> Self {
        Self::default()
    }

    /// A view-model whose binder errors go to `sink`.
    pub fn with_error_handler<F>(sink: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        Self {
            handler: ErrorHandler::new(sink),
            lifecycle: CompositeActivable::new(),
        }
    }

    /// Route `error` to this view-model's error handler.
    pub fn handle_error(&self, error: Error) {
        if let Err(error) = self.handler.handle(error) {
            tracing::warn!(%error, "view-model error with no error handler");
        }
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.handler
    }

    pub fn create_property<T>(&self, initial: T) -> Property<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Property::new(initial)
    }

    pub fn create_empty_property<T>(&self) -> Property<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Property::empty()
    }

    /// Read-only property mirroring `source`.
    pub fn create_property_from<T, P>(&self, source: &P) -> Property<T>
    where
        T: Clone + Send + Sync + 'static,
        P: ReactiveProperty<T> + ?Sized,
    {
        Property::from_property(source)
    }

    /// Read-only property holding the latest value of `source`.
    pub fn create_property_from_stream<T>(&self, source: &Observable<T>) -> Property<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Property::from_observable(source)
    }

    pub fn create_command<I, R, F>(&self, execution: F) -> ReactiveCommand<I, R>
    where
        I: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(Option<I>) -> Observable<R> + Send + Sync + 'static,
    {
        ReactiveCommand::new(execution)
    }

    /// Builder for commands with a gate, progress source or scheduler.
    pub fn command_builder<I, R>(&self) -> CommandBuilder<I, R>
    where
        I: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        CommandBuilder::new()
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `children` is empty.
    pub fn create_composite_command<I, R>(&self, children: Vec<ReactiveCommand<I, R>>) -> Result<CompositeCommand<I, R>>
    where
        I: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        CompositeCommand::new(children)
    }

    pub fn create_interaction<T, R>(&self) -> Interaction<T, R>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
    {
        Interaction::new()
    }

    /// Bind `source` to actions now, for as long as the returned
    /// subscriptions are kept.
    pub fn bind<T>(&self, source: Observable<T>) -> ObservableBinder<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        ObservableBinder::new(source, self.binder_handler())
    }

    pub fn bind_property<T>(&self, property: &Property<T>) -> PropertyBinder<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        PropertyBinder::new(property, self.binder_handler())
    }

    /// Bind `source` to actions while this view-model is activated.
    pub fn when<T>(&self, source: Observable<T>) -> LifecycleBinder<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        LifecycleBinder::new(source, self.binder_handler(), self.lifecycle.clone())
    }

    /// Subscribe every binding declared with [`when`](ViewModel::when).
    pub fn activate(&self) {
        self.lifecycle.activate();
    }

    /// Release every binding declared with [`when`](ViewModel::when).
    pub fn deactivate(&self) {
        self.lifecycle.deactivate();
    }

    pub fn is_activated(&self) -> bool {
        self.lifecycle.is_activated()
    }

    /// Group holding the lifecycle bindings.
    pub fn lifecycle(&self) -> &CompositeActivable {
        &self.lifecycle
    }

    fn binder_handler(&self) -> ErrorHandler {
        // Same sink as `handle_error`. Holding the view-model itself would
        // make its lifecycle group own itself.
        self.handler.clone()
    }
}

impl fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("handler", &self.handler)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_view_model() -> (ViewModel, Arc<Mutex<Vec<Error>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        (ViewModel::with_error_handler(move |e| sink.lock().push(e)), errors)
    }

    #[test]
    fn binder_errors_reach_handle_error() {
        let (vm, errors) = recording_view_model();
        let source = vm.create_property(1);
        let _binding = vm
            .bind(source.as_observable())
            .then_consume(|v| if v > 1 { Err(Error::msg("too big")) } else { Ok(()) });

        source.set_value(2).unwrap();
        source.set_value(3).unwrap();
        assert_eq!(errors.lock().len(), 2);
    }

    #[test]
    fn lifecycle_bindings_follow_activation() {
        let vm = ViewModel::new();
        let source = vm.create_property(0);
        let mirror = vm.create_property(-1);
        let binding = vm.when(source.as_observable()).to_property(&mirror);

        source.set_value(1).unwrap();
        assert_eq!(mirror.value(), Some(-1));

        vm.activate();
        assert!(vm.is_activated());
        assert!(binding.is_activated());
        assert_eq!(mirror.value(), Some(1));

        vm.deactivate();
        source.set_value(2).unwrap();
        assert_eq!(mirror.value(), Some(1));
        assert!(!vm.is_activated());
    }

    #[test]
    fn derived_properties_are_read_only() {
        let vm = ViewModel::new();
        let source = vm.create_property(2);
        let copy = vm.create_property_from(&source);
        let empty = vm.create_empty_property::<i32>();
        let from_stream = vm.create_property_from_stream(&empty.as_observable());

        assert_eq!(copy.value(), Some(2));
        assert!(matches!(copy.set_value(3), Err(Error::ReadOnlyProperty)));
        assert!(!from_stream.has_value());
        empty.set_value(8).unwrap();
        assert_eq!(from_stream.value(), Some(8));
    }

    #[test]
    fn composite_factory_rejects_empty_children() {
        let vm = ViewModel::new();
        let result = vm.create_composite_command::<(), ()>(Vec::new());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn handle_error_without_sink_does_not_panic() {
        ViewModel::new().handle_error(Error::msg("ignored"));
    }
}
