//! Error types shared by properties, commands, bindings and interactions.

use std::fmt;
use std::sync::Arc;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the reactive core.
///
/// Errors travel through streams and are delivered to every observer of a
/// failing stream, so the type is cheap to clone.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A mutation was attempted on a derived, read-only property.
    #[error("property is read-only")]
    ReadOnlyProperty,

    /// `execute` was called while the command could not execute.
    #[error("command cannot be executed")]
    CannotExecuteCommand,

    /// An interaction was invoked while nothing was handling it.
    #[error("interaction has no handler")]
    UnhandledInteraction,

    /// An interaction context was handled more than once.
    #[error("interaction has already been handled")]
    AlreadyHandledInteraction,

    /// A constructor received an argument it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A property was set from within one of its own notifications.
    #[error("property updated while notifying its observers")]
    ReentrantUpdate,

    /// A binder action panicked.
    #[error("action panicked: {0}")]
    Panicked(String),

    /// A failure raised by user code, typically an execution function.
    #[error(transparent)]
    Failed(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary error raised by user code.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Failed(Arc::from(error.into()))
    }

    /// Build a user failure from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Error::failed(message.to_string())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Error::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_keeps_message() {
        let err = Error::msg("disk on fire");
        assert_eq!(err.to_string(), "disk on fire");
        assert!(matches!(err, Error::Failed(_)));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let err = Error::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "action panicked: boom");

        let err = Error::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "action panicked: owned boom");
    }
}
