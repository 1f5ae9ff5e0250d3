//! Commands: guarded, observable units of work.
//!
//! - [`ReactiveCommand`]: single execution function with state tracking
//! - [`CompositeCommand`]: runs several commands as one
//! - [`ProgressContext`]: progress reporting handle for execution functions

mod command;
mod composite;
mod progress;

pub use command::{CommandBuilder, ReactiveCommand};
pub use composite::CompositeCommand;
pub use progress::ProgressContext;
