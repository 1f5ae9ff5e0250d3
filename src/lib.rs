//! # rx-viewmodel
//!
//! Reactive building blocks for view-models that UI widgets bind to.
//!
//! The crate is organised in layers, each built on the one before:
//!
//! ## Streams
//!
//! Push-based streams with explicit cancellation:
//! - `Observable<T>` - Cold stream, subscribed with closures
//! - `Subject<T>` - Hot stream with an ordered observer list
//! - `Subscription` - Releases a subscription exactly once
//!
//! ## Properties and commands
//!
//! The state a view-model exposes:
//! - `Property<T>` - Observable value, writable or derived (read-only)
//! - `ReactiveCommand<I, R>` - Guarded unit of work with execution state and progress
//! - `CompositeCommand<I, R>` - Several commands executed as one
//! - `Interaction<T, R>` - One-shot request answered by the view
//!
//! ## Bindings
//!
//! Wiring from streams to effects:
//! - `ObservableBinder<T>` / `PropertyBinder<T>` - Guarded actions, two-way sync
//! - `SerialActivable` / `CompositeActivable` - Bindings that can be suspended and resumed
//! - `ViewModel` - Factory for all of the above, with a shared error handler

pub mod activable;
pub mod binder;
pub mod command;
pub mod error;
pub mod interaction;
pub mod property;
pub mod stream;
pub mod view_model;

// Re-export main types for convenience
pub use activable::{Activable, CompositeActivable, SerialActivable};
pub use binder::{ErrorHandler, LifecycleBinder, ObservableBinder, PropertyBinder};
pub use command::{CommandBuilder, CompositeCommand, ProgressContext, ReactiveCommand};
pub use error::{Error, Result};
pub use interaction::{Interaction, InteractionContext};
pub use property::{Property, ReactiveProperty};
pub use stream::{Observable, Observer, Subject, Subscription};
pub use view_model::ViewModel;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let property = Property::new(0);
        assert_eq!(property.value(), Some(0));
        property.set_value(42).unwrap();
        assert_eq!(property.value(), Some(42));
    }
}
