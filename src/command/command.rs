use super::ProgressContext;
use crate::error::{Error, Result};
use crate::property::{Property, ReactiveProperty};
use crate::stream::{Observable, Scheduler, SerialSubscription, Subject};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Execution<I, R> = dyn Fn(Option<I>, ProgressContext) -> Observable<R> + Send + Sync;

/// Deduplicated, read-only views handed out to observers of a command.
struct CommandViews {
    is_executing: Property<bool>,
    can_execute: Property<bool>,
    progress: Property<f64>,
    execution_count: Property<u64>,
}

struct CommandInner<I, R> {
    execution: Box<Execution<I, R>>,
    results: Subject<R>,
    errors: Subject<Error>,
    executing: Property<bool>,
    count: Property<u64>,
    progress: Property<f64>,
    executable: Property<bool>,
    // Claimed by the execution that passed the guard.
    running: AtomicBool,
    progress_source: Option<Observable<f64>>,
    progress_link: SerialSubscription,
    scheduler: Option<Arc<dyn Scheduler>>,
    views: CommandViews,
}

impl<I, R> CommandInner<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn begin(&self) -> bool {
        if !self.executable.value().unwrap_or(false) {
            return false;
        }
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn start(&self, input: Option<I>) -> Observable<R> {
        tracing::debug!(count = self.count.value().unwrap_or(0), "command execution started");
        self.progress.publish(0.0);
        self.executing.publish(true);
        if let Some(source) = &self.progress_source {
            let progress = self.progress.clone();
            self.progress_link
                .replace(source.subscribe(move |value| progress.publish(value)));
        }
        let body = (self.execution)(input, ProgressContext::new(self.progress.clone()));
        match &self.scheduler {
            Some(scheduler) => body.subscribe_on(Arc::clone(scheduler)),
            None => body,
        }
    }

    fn route_error(&self, error: Error) -> Observable<R> {
        if self.errors.has_observers() {
            tracing::debug!(%error, "command execution failed, routed to error stream");
            self.errors.next(error);
            Observable::empty()
        } else {
            tracing::debug!(%error, "command execution failed with no error observer");
            Observable::error(error)
        }
    }

    fn finish(&self) {
        self.progress_link.clear();
        self.progress.publish(1.0);
        let count = self.count.value().unwrap_or(0) + 1;
        self.count.publish(count);
        // Released after the idle emission returns: an `execute` issued by
        // one of its observers is rejected.
        self.executing.publish(false);
        self.running.store(false, Ordering::Release);
        tracing::debug!(count, "command execution finished");
    }
}

/// Guarded, observable unit of work.
///
/// A command is idle until [`execute`](ReactiveCommand::execute) (or
/// [`execute_with`](ReactiveCommand::execute_with)) is subscribed. Each
/// execution then:
///
/// 1. fails with [`Error::CannotExecuteCommand`] without touching any state
///    if [`can_execute`](ReactiveCommand::can_execute) is `false`;
/// 2. resets progress to `0`, marks the command executing and starts the
///    auxiliary progress source, if any;
/// 3. runs the execution function, pushing every value to
///    [`result`](ReactiveCommand::result);
/// 4. sends a failure to [`error`](ReactiveCommand::error) when that stream
///    is observed and completes normally, or fails the execution stream when
///    it is not;
/// 5. on termination or disposal, sets progress to `1`, increments the
///    execution count and marks the command idle.
///
/// All subscribers of one `execute` stream share a single run.
///
/// # Examples
///
/// ```
/// use rx_viewmodel::{ReactiveCommand, ReactiveProperty};
///
/// let double = ReactiveCommand::from_fn(|input: Option<i32>| Ok(input.unwrap_or(0) * 2));
/// double.execute_with(21).subscribe(|value| assert_eq!(value, 42));
///
/// assert_eq!(double.execution_count().value(), Some(1));
/// assert_eq!(double.progress().value(), Some(1.0));
/// ```
pub struct ReactiveCommand<I, R> {
    inner: Arc<CommandInner<I, R>>,
}

impl<I, R> Clone for ReactiveCommand<I, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, R> fmt::Debug for ReactiveCommand<I, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveCommand")
            .field("running", &self.inner.running.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<I, R> ReactiveCommand<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Command whose execution function maps the input to a stream.
    pub fn new<F>(execution: F) -> Self
    where
        F: Fn(Option<I>) -> Observable<R> + Send + Sync + 'static,
    {
        CommandBuilder::new().build(execution)
    }

    /// Command running a synchronous, fallible function.
    pub fn from_fn<F>(execution: F) -> Self
    where
        F: Fn(Option<I>) -> Result<R> + Send + Sync + 'static,
    {
        CommandBuilder::new().build_fn(execution)
    }

    /// Command whose execution function reports progress.
    pub fn progressive<F>(execution: F) -> Self
    where
        F: Fn(Option<I>, ProgressContext) -> Observable<R> + Send + Sync + 'static,
    {
        CommandBuilder::new().build_progressive(execution)
    }

    pub fn builder() -> CommandBuilder<I, R> {
        CommandBuilder::new()
    }

    /// Stream of one execution without input. Nothing runs until it is
    /// subscribed.
    pub fn execute(&self) -> Observable<R> {
        self.run(None)
    }

    /// Stream of one execution with `input`. Nothing runs until it is
    /// subscribed.
    pub fn execute_with(&self, input: I) -> Observable<R> {
        self.run(Some(input))
    }

    fn run(&self, input: Option<I>) -> Observable<R> {
        let inner = Arc::clone(&self.inner);
        Observable::defer(move || {
            if !inner.begin() {
                tracing::debug!("command execution rejected");
                return Observable::error(Error::CannotExecuteCommand);
            }
            let results = inner.results.clone();
            let router = Arc::clone(&inner);
            let finisher = Arc::clone(&inner);
            inner
                .start(input.clone())
                .do_on_next(move |value| results.next(value.clone()))
                .catch_error(move |error| router.route_error(error))
                .finally(move || finisher.finish())
        })
        .share_replay()
    }

    /// Every value produced by every execution.
    pub fn result(&self) -> Observable<R> {
        self.inner.results.as_observable()
    }

    /// Failures of executions, while observed.
    pub fn error(&self) -> Observable<Error> {
        self.inner.errors.as_observable()
    }

    pub fn is_executing(&self) -> Property<bool> {
        self.inner.views.is_executing.clone()
    }

    /// `false` while executing or while the external gate is closed.
    pub fn can_execute(&self) -> Property<bool> {
        self.inner.views.can_execute.clone()
    }

    /// Progress of the current or last execution, in `[0, 1]`.
    pub fn progress(&self) -> Property<f64> {
        self.inner.views.progress.clone()
    }

    pub fn execution_count(&self) -> Property<u64> {
        self.inner.views.execution_count.clone()
    }
}

/// Configures a [`ReactiveCommand`] before it is built.
///
/// # Examples
///
/// ```
/// use rx_viewmodel::{CommandBuilder, Observable, Property, ReactiveProperty};
///
/// let enabled = Property::new(false);
/// let save = CommandBuilder::<(), &str>::new()
///     .can_execute(enabled.as_observable())
///     .build(|_| Observable::just("saved"));
///
/// assert_eq!(save.can_execute().value(), Some(false));
/// enabled.set_value(true).unwrap();
/// assert_eq!(save.can_execute().value(), Some(true));
/// ```
pub struct CommandBuilder<I, R> {
    can_execute: Option<Observable<bool>>,
    progress: Option<Observable<f64>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    errors: Option<Subject<Error>>,
    _marker: PhantomData<fn(I) -> R>,
}

impl<I, R> Default for CommandBuilder<I, R> {
    fn default() -> Self {
        Self {
            can_execute: None,
            progress: None,
            scheduler: None,
            errors: None,
            _marker: PhantomData,
        }
    }
}

impl<I, R> CommandBuilder<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// External gate. Treated as open until it first emits.
    pub fn can_execute(mut self, gate: Observable<bool>) -> Self {
        self.can_execute = Some(gate);
        self
    }

    /// Source that overwrites progress while an execution runs.
    pub fn progress(mut self, source: Observable<f64>) -> Self {
        self.progress = Some(source);
        self
    }

    /// Run execution streams on `scheduler` instead of the caller's thread.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub(crate) fn take_can_execute(&mut self) -> Option<Observable<bool>> {
        self.can_execute.take()
    }

    pub(crate) fn errors(mut self, errors: Subject<Error>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn build<F>(self, execution: F) -> ReactiveCommand<I, R>
    where
        F: Fn(Option<I>) -> Observable<R> + Send + Sync + 'static,
    {
        self.assemble(Box::new(move |input, _| execution(input)))
    }

    pub fn build_progressive<F>(self, execution: F) -> ReactiveCommand<I, R>
    where
        F: Fn(Option<I>, ProgressContext) -> Observable<R> + Send + Sync + 'static,
    {
        self.assemble(Box::new(execution))
    }

    pub fn build_fn<F>(self, execution: F) -> ReactiveCommand<I, R>
    where
        F: Fn(Option<I>) -> Result<R> + Send + Sync + 'static,
    {
        let execution = Arc::new(execution);
        self.build(move |input| {
            let execution = Arc::clone(&execution);
            Observable::create(move |observer| match execution(input.clone()) {
                Ok(value) => {
                    observer.next(value);
                    observer.complete();
                }
                Err(error) => observer.error(error),
            })
        })
    }

    fn assemble(self, execution: Box<Execution<I, R>>) -> ReactiveCommand<I, R> {
        let executing = Property::new(false);
        let count = Property::new(0u64);
        let progress = Property::new(0.0);

        let gate = match self.can_execute {
            Some(gate) => gate.start_with(true),
            None => Observable::just(true),
        };
        let executable = Property::from_observable(&Observable::combine_latest2(
            &executing.as_observable(),
            &gate,
            |executing: bool, open: bool| !executing && open,
        ));

        let views = CommandViews {
            is_executing: Property::from_observable(&executing.as_observable().distinct_until_changed()),
            can_execute: Property::from_observable(&executable.as_observable().distinct_until_changed()),
            progress: Property::from_observable(&progress.as_observable().distinct_until_changed()),
            execution_count: Property::from_observable(&count.as_observable().distinct_until_changed()),
        };

        ReactiveCommand {
            inner: Arc::new(CommandInner {
                execution,
                results: Subject::new(),
                errors: self.errors.unwrap_or_default(),
                executing,
                count,
                progress,
                executable,
                running: AtomicBool::new(false),
                progress_source: self.progress,
                progress_link: SerialSubscription::new(),
                scheduler: self.scheduler,
                views,
            }),
        }
    }
}
