//! Lifecycle-scoped subscriptions.
//!
//! An activable turns a "create subscription" factory into an
//! activate/deactivate pair that can be driven repeatedly:
//! - [`SerialActivable`]: one factory, at most one live subscription
//! - [`CompositeActivable`]: a group activated and deactivated together

mod composite;
mod serial;

pub use composite::CompositeActivable;
pub use serial::SerialActivable;

use crate::stream::Subscription;

/// A resource that can be acquired and released repeatedly.
pub trait Activable: Send + Sync {
    /// Acquire the resource, releasing any previous acquisition first.
    fn activate(&self);

    /// Release the resource. It can be acquired again later.
    fn deactivate(&self);

    fn is_activated(&self) -> bool;

    /// A subscription view of this activable. Disposing it deactivates the
    /// activable for good: later `activate` calls do nothing.
    fn as_subscription(&self) -> Subscription;
}
