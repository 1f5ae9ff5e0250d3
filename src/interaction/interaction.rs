use super::InteractionContext;
use crate::error::{Error, Result};
use crate::stream::{Observable, Observer, Subject};
use std::fmt;

/// Request/response channel from a view-model to whatever handles it.
///
/// Handlers subscribe to [`as_observable`](Interaction::as_observable) and
/// answer each [`InteractionContext`] they receive. Requests are not queued:
/// invoking with no handler subscribed fails immediately. Every subscribed
/// handler receives the context and the first to answer wins.
///
/// # Examples
///
/// ```
/// use rx_viewmodel::Interaction;
/// use std::sync::{Arc, Mutex};
///
/// let confirm: Interaction<String, bool> = Interaction::new();
/// let _handler = confirm.as_observable().subscribe(|request| {
///     let yes = request.input().is_some_and(|q| q.starts_with("Delete"));
///     request.handle(yes).unwrap();
/// });
///
/// let answer = Arc::new(Mutex::new(None));
/// let sink = answer.clone();
/// confirm
///     .invoke("Delete file?".to_string(), move |yes| *sink.lock().unwrap() = Some(yes))
///     .unwrap();
/// assert_eq!(*answer.lock().unwrap(), Some(true));
/// ```
pub struct Interaction<T, R> {
    requests: Subject<InteractionContext<T, R>>,
}

impl<T, R> Clone for Interaction<T, R> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<T, R> Default for Interaction<T, R>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> Interaction<T, R>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            requests: Subject::new(),
        }
    }

    /// Send a request and call `callback` with the answer.
    ///
    /// The callback runs on the thread that answers the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnhandledInteraction`] if no handler received the
    /// request. The callback is then dropped without running.
    pub fn invoke<F>(&self, input: impl Into<Option<T>>, callback: F) -> Result<()>
    where
        F: FnOnce(R) + Send + 'static,
    {
        if self.requests.try_next(InteractionContext::new(input.into(), callback)) {
            Ok(())
        } else {
            tracing::debug!("interaction invoked with no handler");
            Err(Error::UnhandledInteraction)
        }
    }

    pub fn has_handlers(&self) -> bool {
        self.requests.has_observers()
    }

    /// Stream of requests, for handlers.
    pub fn as_observable(&self) -> Observable<InteractionContext<T, R>> {
        self.requests.as_observable()
    }
}

impl<T, R> Interaction<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Stream form of [`invoke`](Interaction::invoke): sends the request on
    /// subscription, then emits the answer and completes.
    ///
    /// Fails with [`Error::UnhandledInteraction`] if no handler is
    /// subscribed at that point.
    pub fn request(&self, input: impl Into<Option<T>>) -> Observable<R> {
        let interaction = self.clone();
        let input = input.into();
        Observable::create(move |observer: Observer<R>| {
            let answer = observer.clone();
            let sent = interaction.invoke(input.clone(), move |result| {
                answer.next(result);
                answer.complete();
            });
            if let Err(error) = sent {
                observer.error(error);
            }
        })
    }
}

impl<T, R> fmt::Debug for Interaction<T, R>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interaction")
            .field("handlers", &self.requests.observer_count())
            .finish()
    }
}
