use crate::error::{Error, Result};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Shared destination for errors raised by binder actions.
///
/// A handler with a sink swallows every routed error into it. A handler
/// without one hands the error back so the caller can end the binding.
#[derive(Clone, Default)]
pub struct ErrorHandler {
    sink: Option<Arc<dyn Fn(Error) + Send + Sync>>,
}

impl ErrorHandler {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// Handler with no sink.
    pub fn unhandled() -> Self {
        Self::default()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Send `error` to the sink.
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged when there is no sink.
    pub fn handle(&self, error: Error) -> Result<()> {
        match &self.sink {
            Some(sink) => {
                tracing::debug!(%error, "binder error routed to handler");
                sink(error);
                Ok(())
            }
            None => Err(error),
        }
    }

    /// Run `action`, routing its error or panic to the sink.
    ///
    /// Returns `Ok(None)` when the action failed and the sink took the error.
    pub(crate) fn guard<T, F>(&self, action: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(error)) => self.handle(error).map(|()| None),
            Err(payload) => self.handle(Error::from_panic(payload)).map(|()| None),
        }
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("has_sink", &self.has_sink())
            .finish()
    }
}
