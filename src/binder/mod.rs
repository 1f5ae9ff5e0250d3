//! Wiring from streams and properties to side effects.
//!
//! - [`ObservableBinder`]: stream to action, with guarded dispatch
//! - [`PropertyBinder`]: two-way property synchronization
//! - [`LifecycleBinder`]: bindings that follow an activation lifecycle
//! - [`ErrorHandler`]: where every binder routes the errors its actions raise

mod error_handler;
mod lifecycle;
mod observable;
mod property;

pub use error_handler::ErrorHandler;
pub use lifecycle::LifecycleBinder;
pub use observable::ObservableBinder;
pub use property::PropertyBinder;
