use super::{CommandBuilder, ReactiveCommand};
use crate::error::{Error, Result};
use crate::property::{Property, ReactiveProperty};
use crate::stream::{Observable, Observer, Subject};
use parking_lot::Mutex;
use std::sync::Arc;

struct CompositeRun<R> {
    results: Vec<Option<R>>,
    received: usize,
    finished: usize,
}

/// Command that executes several child commands together.
///
/// - It can execute only when every child can, and its own gate is open.
/// - An execution starts every child with the same input and emits one
///   `Vec` holding the first result of each child, in declaration order.
/// - The first error of each child is forwarded to the composite's
///   [`error`](CompositeCommand::error) stream without cancelling siblings.
///   While that stream is unobserved, the error fails the execution instead
///   and the remaining children are cancelled.
/// - Progress is the mean of the children's progress, a child counting as
///   `0` while it is not executing.
/// - The composite returns to idle once every child has.
pub struct CompositeCommand<I, R> {
    command: ReactiveCommand<I, Vec<R>>,
    children: Arc<[ReactiveCommand<I, R>]>,
}

impl<I, R> Clone for CompositeCommand<I, R> {
    fn clone(&self) -> Self {
        Self {
            command: self.command.clone(),
            children: Arc::clone(&self.children),
        }
    }
}

impl<I, R> CompositeCommand<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `children` is empty.
    pub fn new(children: Vec<ReactiveCommand<I, R>>) -> Result<Self> {
        Self::build(CommandBuilder::new(), children)
    }

    /// Build from a configured builder. The builder's gate and scheduler
    /// apply; its progress source is replaced by the children's mean.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `children` is empty.
    pub fn build(mut builder: CommandBuilder<I, Vec<R>>, children: Vec<ReactiveCommand<I, R>>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::InvalidArgument(
                "a composite command needs at least one child".to_string(),
            ));
        }
        let children: Arc<[ReactiveCommand<I, R>]> = children.into();

        let mut gates: Vec<Observable<bool>> = children
            .iter()
            .map(|child| child.can_execute().as_observable())
            .collect();
        if let Some(external) = builder.take_can_execute() {
            gates.push(external.start_with(true));
        }
        let gate = Observable::combine_latest(gates, |open: &[bool]| open.iter().all(|open| *open));

        let contributions: Vec<Observable<f64>> = children
            .iter()
            .map(|child| {
                Observable::combine_latest2(
                    &child.is_executing().as_observable(),
                    &child.progress().as_observable(),
                    |executing: bool, progress: f64| if executing { progress } else { 0.0 },
                )
            })
            .collect();
        let mean = Observable::combine_latest(contributions, |values: &[f64]| {
            values.iter().sum::<f64>() / values.len() as f64
        });

        let errors = Subject::new();
        let run_children = Arc::clone(&children);
        let run_errors = errors.clone();
        let command = builder
            .can_execute(gate)
            .progress(mean)
            .errors(errors)
            .build(move |input| run_all(&run_children, &run_errors, input));

        Ok(Self { command, children })
    }

    pub fn children(&self) -> &[ReactiveCommand<I, R>] {
        &self.children
    }

    /// The composite viewed as a plain command.
    pub fn as_command(&self) -> &ReactiveCommand<I, Vec<R>> {
        &self.command
    }

    pub fn execute(&self) -> Observable<Vec<R>> {
        self.command.execute()
    }

    pub fn execute_with(&self, input: I) -> Observable<Vec<R>> {
        self.command.execute_with(input)
    }

    pub fn result(&self) -> Observable<Vec<R>> {
        self.command.result()
    }

    pub fn error(&self) -> Observable<Error> {
        self.command.error()
    }

    pub fn is_executing(&self) -> Property<bool> {
        self.command.is_executing()
    }

    pub fn can_execute(&self) -> Property<bool> {
        self.command.can_execute()
    }

    pub fn progress(&self) -> Property<f64> {
        self.command.progress()
    }

    pub fn execution_count(&self) -> Property<u64> {
        self.command.execution_count()
    }
}

impl<I, R> From<CompositeCommand<I, R>> for ReactiveCommand<I, Vec<R>> {
    fn from(composite: CompositeCommand<I, R>) -> Self {
        composite.command
    }
}

fn run_all<I, R>(children: &Arc<[ReactiveCommand<I, R>]>, errors: &Subject<Error>, input: Option<I>) -> Observable<Vec<R>>
where
    I: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    let children = Arc::clone(children);
    let errors = errors.clone();
    Observable::create(move |downstream: Observer<Vec<R>>| {
        let count = children.len();
        let state = Arc::new(Mutex::new(CompositeRun {
            results: vec![None; count],
            received: 0,
            finished: 0,
        }));

        let report = {
            let errors = errors.clone();
            let downstream = downstream.clone();
            Arc::new(move |error: Error| {
                if errors.has_observers() {
                    errors.next(error);
                } else {
                    downstream.error(error);
                }
            })
        };

        let child_done = {
            let state = Arc::clone(&state);
            let downstream = downstream.clone();
            Arc::new(move || {
                let all_done = {
                    let mut state = state.lock();
                    state.finished += 1;
                    state.finished == count
                };
                if all_done {
                    downstream.complete();
                }
            })
        };

        for (index, child) in children.iter().enumerate() {
            if downstream.is_closed() {
                return;
            }

            let forward = Arc::clone(&report);
            let first_error = child.error().take(1).subscribe(move |error| forward(error));
            downstream.subscription().add(move || {
                first_error.dispose();
            });

            let execution = match &input {
                Some(input) => child.execute_with(input.clone()),
                None => child.execute(),
            };

            let on_next = {
                let state = Arc::clone(&state);
                let downstream = downstream.clone();
                move |value: R| {
                    let ready = {
                        let mut state = state.lock();
                        if state.results[index].is_some() {
                            return;
                        }
                        state.results[index] = Some(value);
                        state.received += 1;
                        (state.received == count)
                            .then(|| state.results.iter().flatten().cloned().collect::<Vec<R>>())
                    };
                    if let Some(all) = ready {
                        downstream.next(all);
                    }
                }
            };
            let on_error = {
                let forward = Arc::clone(&report);
                let child_done = Arc::clone(&child_done);
                move |error: Error| {
                    forward(error);
                    child_done();
                }
            };
            let on_complete = {
                let child_done = Arc::clone(&child_done);
                move || child_done()
            };
            execution.subscribe_observer(Observer::with_subscription(
                downstream.subscription().child(),
                on_next,
                on_error,
                on_complete,
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProgressContext;

    type Slot = Arc<Mutex<Option<ProgressContext>>>;

    /// Child whose execution stays open until the returned subject emits.
    fn gated_child(name: &'static str) -> (ReactiveCommand<(), &'static str>, Subject<()>, Slot) {
        let gate = Subject::new();
        let slot: Slot = Arc::new(Mutex::new(None));
        let source = gate.clone();
        let progress_slot = slot.clone();
        let command = ReactiveCommand::progressive(move |_: Option<()>, progress| {
            *progress_slot.lock() = Some(progress);
            source.as_observable().take(1).map(move |_| name)
        });
        (command, gate, slot)
    }

    #[test]
    fn requires_at_least_one_child() {
        let result = CompositeCommand::<(), ()>::new(Vec::new());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn zips_first_results_in_declaration_order() {
        let (a, gate_a, _) = gated_child("a");
        let (b, gate_b, _) = gated_child("b");
        let composite = CompositeCommand::new(vec![a, b]).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        composite.execute().subscribe(move |v| sink.lock().push(v));

        gate_b.next(());
        assert!(seen.lock().is_empty());
        gate_a.next(());
        assert_eq!(*seen.lock(), vec![vec!["a", "b"]]);
        assert_eq!(composite.is_executing().value(), Some(false));
    }

    #[test]
    fn idle_only_after_every_child_and_progress_ends_at_one() {
        let (a, gate_a, progress_a) = gated_child("a");
        let (b, gate_b, progress_b) = gated_child("b");
        let composite = CompositeCommand::new(vec![a.clone(), b.clone()]).unwrap();

        let _run = composite.execute().subscribe(|_| {});
        assert_eq!(composite.is_executing().value(), Some(true));
        assert_eq!(composite.progress().value(), Some(0.0));

        progress_b.lock().as_ref().unwrap().set(0.5);
        assert_eq!(composite.progress().value(), Some(0.25));

        gate_a.next(());
        assert_eq!(a.is_executing().value(), Some(false));
        assert_eq!(composite.is_executing().value(), Some(true));

        progress_b.lock().as_ref().unwrap().set(1.0);
        gate_b.next(());
        assert_eq!(composite.is_executing().value(), Some(false));
        assert_eq!(composite.progress().value(), Some(1.0));
        assert_eq!(composite.execution_count().value(), Some(1));
        assert!(progress_a.lock().is_some());
    }

    #[test]
    fn gate_requires_every_child() {
        let closed = Property::new(false);
        let blocked = CommandBuilder::<(), ()>::new()
            .can_execute(closed.as_observable())
            .build(|_| Observable::just(()));
        let open = ReactiveCommand::<(), ()>::new(|_| Observable::just(()));
        let composite = CompositeCommand::new(vec![open, blocked]).unwrap();

        assert_eq!(composite.can_execute().value(), Some(false));
        closed.set_value(true).unwrap();
        assert_eq!(composite.can_execute().value(), Some(true));
    }

    #[test]
    fn external_gate_applies() {
        let external = Property::new(false);
        let child = ReactiveCommand::<(), ()>::new(|_| Observable::just(()));
        let composite = CompositeCommand::build(
            CommandBuilder::new().can_execute(external.as_observable()),
            vec![child],
        )
        .unwrap();
        assert_eq!(composite.can_execute().value(), Some(false));
        external.set_value(true).unwrap();
        assert_eq!(composite.can_execute().value(), Some(true));
    }

    #[test]
    fn silent_external_gate_counts_as_open() {
        let external = Subject::<bool>::new();
        let child = ReactiveCommand::<(), ()>::new(|_| Observable::just(()));
        let composite = CompositeCommand::build(
            CommandBuilder::new().can_execute(external.as_observable()),
            vec![child],
        )
        .unwrap();

        assert_eq!(composite.can_execute().value(), Some(true));
        external.next(false);
        assert_eq!(composite.can_execute().value(), Some(false));
    }

    #[test]
    fn child_errors_are_forwarded_without_cancelling_siblings() {
        let failing = ReactiveCommand::<(), i32>::from_fn(|_| Err(Error::msg("first child failed")));
        let (slow, gate, _) = gated_child("slow");
        let slow = {
            let slow = slow.clone();
            ReactiveCommand::<(), i32>::new(move |_| slow.execute().map(|_| 2))
        };
        let composite = CompositeCommand::new(vec![failing, slow.clone()]).unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        composite.error().subscribe(move |e| sink.lock().push(e.to_string()));
        let _run = composite.execute().subscribe(|_| {});

        assert_eq!(*errors.lock(), vec!["first child failed".to_string()]);
        assert_eq!(slow.is_executing().value(), Some(true));
        assert_eq!(composite.is_executing().value(), Some(true));

        gate.next(());
        assert_eq!(composite.is_executing().value(), Some(false));
    }

    #[test]
    fn unobserved_child_error_fails_the_execution() {
        let (slow, _gate, _) = gated_child("slow");
        let failing = ReactiveCommand::<(), &'static str>::from_fn(|_| Err(Error::msg("second child failed")));
        let composite = CompositeCommand::new(vec![slow.clone(), failing]).unwrap();

        let failure = Arc::new(Mutex::new(None));
        let sink = failure.clone();
        composite
            .execute()
            .subscribe_all(|_| {}, move |e| *sink.lock() = Some(e.to_string()), || {});

        assert_eq!(failure.lock().as_deref(), Some("second child failed"));
        assert_eq!(slow.is_executing().value(), Some(false));
        assert_eq!(slow.execution_count().value(), Some(1));
        assert_eq!(composite.is_executing().value(), Some(false));
        assert_eq!(composite.execution_count().value(), Some(1));
    }
}
