use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Completion<R> = Box<dyn FnOnce(R) + Send>;

struct ContextInner<T, R> {
    input: Option<T>,
    handled: AtomicBool,
    completion: Mutex<Option<Completion<R>>>,
}

/// A pending interaction request, handed to handlers.
///
/// Exactly one [`handle`](InteractionContext::handle) call succeeds.
pub struct InteractionContext<T, R> {
    inner: Arc<ContextInner<T, R>>,
}

impl<T, R> Clone for InteractionContext<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R> InteractionContext<T, R> {
    pub(crate) fn new<F>(input: Option<T>, completion: F) -> Self
    where
        F: FnOnce(R) + Send + 'static,
    {
        Self {
            inner: Arc::new(ContextInner {
                input,
                handled: AtomicBool::new(false),
                completion: Mutex::new(Some(Box::new(completion))),
            }),
        }
    }

    pub fn input(&self) -> Option<&T> {
        self.inner.input.as_ref()
    }

    pub fn is_handled(&self) -> bool {
        self.inner.handled.load(Ordering::Acquire)
    }

    /// Answer the request with `result`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyHandledInteraction`] if the request was
    /// already answered.
    pub fn handle(&self, result: R) -> Result<()> {
        if self
            .inner
            .handled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyHandledInteraction);
        }
        let completion = self.inner.completion.lock().take();
        if let Some(completion) = completion {
            completion(result);
        }
        Ok(())
    }
}

impl<T: fmt::Debug, R> fmt::Debug for InteractionContext<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionContext")
            .field("input", &self.inner.input)
            .field("handled", &self.is_handled())
            .finish()
    }
}
