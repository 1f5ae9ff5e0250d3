//! Observable single-value properties.
//!
//! - [`ReactiveProperty`]: the read side every widget adapter consumes
//! - [`Property`]: writable or derived (read-only) implementation

mod property;

pub use property::Property;

use crate::stream::Observable;

/// Read access to a value that changes over time.
pub trait ReactiveProperty<T>: Send + Sync {
    /// Current value, or `None` if nothing has been set yet.
    fn value(&self) -> Option<T>;

    fn has_value(&self) -> bool;

    /// Stream of values: the current one first, if any, then every update.
    fn as_observable(&self) -> Observable<T>;
}
