//! One-shot request/response between a view-model and its view.

mod context;
mod interaction;

pub use context::InteractionContext;
pub use interaction::Interaction;
