//! Stream operators.
//!
//! Every operator subscribes upstream through [`Observer::relay`] (or an
//! observer whose subscription is a child of the downstream one), so
//! disposing the downstream subscription always reaches the source.

use super::{Observable, Observer, Scheduler, SerialSubscription, Subscription};
use crate::error::Error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |downstream: Observer<U>| {
            let f = Arc::clone(&f);
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value| sink.next(f(value))));
        })
    }

    pub fn filter<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Observable::create(move |downstream: Observer<T>| {
            let predicate = Arc::clone(&predicate);
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value| {
                if predicate(&value) {
                    sink.next(value);
                }
            }));
        })
    }

    /// Emit the first `count` values, then complete and unsubscribe upstream.
    pub fn take(&self, count: usize) -> Observable<T> {
        let source = self.clone();
        Observable::create(move |downstream: Observer<T>| {
            if count == 0 {
                downstream.complete();
                return;
            }
            let remaining = Arc::new(AtomicUsize::new(count));
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value| {
                let claimed = remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                    left.checked_sub(1)
                });
                if let Ok(left) = claimed {
                    sink.next(value);
                    if left == 1 {
                        sink.complete();
                    }
                }
            }));
        })
    }

    /// Drop the first `count` values.
    pub fn skip(&self, count: usize) -> Observable<T> {
        let source = self.clone();
        Observable::create(move |downstream: Observer<T>| {
            let skipped = Arc::new(AtomicUsize::new(0));
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value| {
                let seen = skipped.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < count).then_some(n + 1)
                });
                if seen.is_err() {
                    sink.next(value);
                }
            }));
        })
    }

    pub fn start_with(&self, value: T) -> Observable<T> {
        let source = self.clone();
        Observable::create(move |downstream: Observer<T>| {
            downstream.next(value.clone());
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value| sink.next(value)));
        })
    }

    /// Suppress values equal to the one emitted just before.
    pub fn distinct_until_changed(&self) -> Observable<T>
    where
        T: PartialEq,
    {
        let source = self.clone();
        Observable::create(move |downstream: Observer<T>| {
            let last: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value: T| {
                {
                    let mut last = last.lock();
                    if last.as_ref() == Some(&value) {
                        return;
                    }
                    *last = Some(value.clone());
                }
                sink.next(value);
            }));
        })
    }

    /// Run `action` on each value before passing it on.
    pub fn do_on_next<F>(&self, action: F) -> Observable<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let source = self.clone();
        let action = Arc::new(action);
        Observable::create(move |downstream: Observer<T>| {
            let action = Arc::clone(&action);
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value| {
                action(&value);
                sink.next(value);
            }));
        })
    }

    /// Run `action` once the subscription ends: on completion, on error, or
    /// when the subscriber disposes it. Runs before the terminal event is
    /// delivered downstream.
    pub fn finally<F>(&self, action: F) -> Observable<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let source = self.clone();
        let action = Arc::new(action);
        Observable::create(move |downstream: Observer<T>| {
            let action = Arc::clone(&action);
            downstream.subscription().add(move || action());
            let sink = downstream.clone();
            source.subscribe_observer(downstream.relay(move |value| sink.next(value)));
        })
    }

    /// Replace an upstream error with the stream returned by `handler`.
    pub fn catch_error<F>(&self, handler: F) -> Observable<T>
    where
        F: Fn(Error) -> Observable<T> + Send + Sync + 'static,
    {
        let source = self.clone();
        let handler = Arc::new(handler);
        Observable::create(move |downstream: Observer<T>| {
            let handler = Arc::clone(&handler);
            let sink = downstream.clone();
            let fallback = downstream.clone();
            let done = downstream.clone();
            source.subscribe_observer(Observer::with_subscription(
                downstream.subscription().child(),
                move |value| sink.next(value),
                move |error| {
                    let relay_sink = fallback.clone();
                    handler(error).subscribe_observer(fallback.relay(move |value| relay_sink.next(value)));
                },
                move || done.complete(),
            ));
        })
    }

    /// Map each value to a stream and mirror only the most recent one.
    ///
    /// A new upstream value disposes the stream produced for the previous
    /// value. Completes once upstream and the current inner stream have both
    /// completed.
    pub fn switch_map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Observable<U> + Send + Sync + 'static,
    {
        #[derive(Default)]
        struct SwitchState {
            generation: u64,
            inner_active: bool,
            outer_done: bool,
        }

        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |downstream: Observer<U>| {
            let serial = SerialSubscription::new();
            {
                let serial = serial.clone();
                downstream.subscription().add(move || serial.dispose());
            }
            let state = Arc::new(Mutex::new(SwitchState::default()));

            let f = Arc::clone(&f);
            let on_value = {
                let downstream = downstream.clone();
                let state = Arc::clone(&state);
                let serial = serial.clone();
                move |value: T| {
                    let generation = {
                        let mut state = state.lock();
                        state.generation += 1;
                        state.inner_active = true;
                        state.generation
                    };
                    let inner_subscription = Subscription::new();
                    serial.replace(inner_subscription.clone());

                    let sink = downstream.clone();
                    let failed = downstream.clone();
                    let finished = downstream.clone();
                    let state = Arc::clone(&state);
                    f(value).subscribe_observer(Observer::with_subscription(
                        inner_subscription,
                        move |inner| sink.next(inner),
                        move |error| failed.error(error),
                        move || {
                            let complete = {
                                let mut state = state.lock();
                                if state.generation != generation {
                                    return;
                                }
                                state.inner_active = false;
                                state.outer_done
                            };
                            if complete {
                                finished.complete();
                            }
                        },
                    ));
                }
            };

            let failed = downstream.clone();
            let finished = downstream.clone();
            source.subscribe_observer(Observer::with_subscription(
                downstream.subscription().child(),
                on_value,
                move |error| failed.error(error),
                move || {
                    let complete = {
                        let mut state = state.lock();
                        state.outer_done = true;
                        !state.inner_active
                    };
                    if complete {
                        finished.complete();
                    }
                },
            ));
        })
    }

    /// Perform the subscription, and therefore the source's work, on
    /// `scheduler`. Fails with the scheduler's error if the work cannot be
    /// scheduled.
    pub fn subscribe_on(&self, scheduler: Arc<dyn Scheduler>) -> Observable<T> {
        let source = self.clone();
        Observable::create(move |downstream: Observer<T>| {
            let source = source.clone();
            let failed = downstream.clone();
            let scheduled = scheduler.schedule(Box::new(move || {
                source.subscribe_observer(downstream);
            }));
            if let Err(error) = scheduled {
                failed.error(error);
            }
        })
    }

    /// Interleave the values of every source. Completes when all complete.
    pub fn merge(sources: Vec<Observable<T>>) -> Observable<T> {
        let sources: Arc<[Observable<T>]> = sources.into();
        Observable::create(move |downstream: Observer<T>| {
            if sources.is_empty() {
                downstream.complete();
                return;
            }
            let remaining = Arc::new(AtomicUsize::new(sources.len()));
            for source in sources.iter() {
                if downstream.is_closed() {
                    return;
                }
                let sink = downstream.clone();
                let failed = downstream.clone();
                let finished = downstream.clone();
                let remaining = Arc::clone(&remaining);
                source.subscribe_observer(Observer::with_subscription(
                    downstream.subscription().child(),
                    move |value| sink.next(value),
                    move |error| failed.error(error),
                    move || {
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            finished.complete();
                        }
                    },
                ));
            }
        })
    }

    /// Combine the latest values of `sources`.
    ///
    /// Emits nothing until every source has emitted at least once, then
    /// emits on every emission from any source. Completes when every source
    /// has completed, or as soon as one completes without ever emitting.
    pub fn combine_latest<S, F>(sources: Vec<Observable<S>>, combiner: F) -> Observable<T>
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(&[S]) -> T + Send + Sync + 'static,
    {
        struct CombineState<S> {
            latest: Vec<Option<S>>,
            filled: usize,
            completed: usize,
        }

        let sources: Arc<[Observable<S>]> = sources.into();
        let combiner = Arc::new(combiner);
        Observable::create(move |downstream: Observer<T>| {
            let count = sources.len();
            if count == 0 {
                downstream.complete();
                return;
            }
            let state = Arc::new(Mutex::new(CombineState {
                latest: vec![None; count],
                filled: 0,
                completed: 0,
            }));

            for (index, source) in sources.iter().enumerate() {
                if downstream.is_closed() {
                    return;
                }
                let on_value = {
                    let state = Arc::clone(&state);
                    let combiner = Arc::clone(&combiner);
                    let sink = downstream.clone();
                    move |value: S| {
                        let snapshot: Option<Vec<S>> = {
                            let mut state = state.lock();
                            if state.latest[index].is_none() {
                                state.filled += 1;
                            }
                            state.latest[index] = Some(value);
                            (state.filled == count)
                                .then(|| state.latest.iter().flatten().cloned().collect())
                        };
                        if let Some(values) = snapshot {
                            sink.next(combiner(&values));
                        }
                    }
                };
                let on_complete = {
                    let state = Arc::clone(&state);
                    let finished = downstream.clone();
                    move || {
                        let done = {
                            let mut state = state.lock();
                            state.completed += 1;
                            state.completed == count || state.latest[index].is_none()
                        };
                        if done {
                            finished.complete();
                        }
                    }
                };
                let failed = downstream.clone();
                source.subscribe_observer(Observer::with_subscription(
                    downstream.subscription().child(),
                    on_value,
                    move |error| failed.error(error),
                    on_complete,
                ));
            }
        })
    }

    /// [`combine_latest`](Observable::combine_latest) over two sources of
    /// different types.
    pub fn combine_latest2<A, B, F>(first: &Observable<A>, second: &Observable<B>, combiner: F) -> Observable<T>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        F: Fn(A, B) -> T + Send + Sync + 'static,
    {
        #[derive(Clone)]
        enum Either<A, B> {
            First(A),
            Second(B),
        }

        let tagged = vec![
            first.map(Either::First),
            second.map(Either::Second),
        ];
        Observable::combine_latest(tagged, move |values: &[Either<A, B>]| {
            match (&values[0], &values[1]) {
                (Either::First(a), Either::Second(b)) => combiner(a.clone(), b.clone()),
                _ => unreachable!("combine_latest keeps source positions"),
            }
        })
    }
}
