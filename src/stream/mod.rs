//! Push-based streams underlying properties, commands and bindings.
//!
//! This module provides the building blocks the rest of the crate is made of:
//! - [`Subscription`]: releases one subscription exactly once
//! - [`Observer`] and [`Observable`]: cold streams with synchronous dispatch
//! - [`Subject`]: hot stream with an ordered observer list
//! - [`Scheduler`]: where subscription work runs

mod observable;
mod observer;
mod operators;
mod replay;
mod scheduler;
mod subject;
mod subscription;

pub use observable::Observable;
pub use observer::Observer;
pub use scheduler::{ImmediateScheduler, Scheduler, Task, ThreadScheduler};
pub use subject::Subject;
pub use subscription::{SerialSubscription, Subscription};
