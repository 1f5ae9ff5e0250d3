use super::observer::Terminal;
use super::{Observable, Observer, Subscription};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::{Arc, Weak};

struct ReplayState<T> {
    buffer: Vec<T>,
    terminal: Option<Terminal>,
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
    connection: Option<Subscription>,
}

/// One shared upstream run, multicast to every subscriber.
struct Replay<T> {
    source: Observable<T>,
    state: Mutex<ReplayState<T>>,
    // Serializes replay against live emissions so every observer sees values
    // in upstream order. Reentrant because synchronous sources emit while
    // the subscribing thread still holds it.
    gate: ReentrantMutex<()>,
}

impl<T: Clone + Send + Sync + 'static> Replay<T> {
    fn subscribe(self: &Arc<Self>, observer: Observer<T>) {
        let _gate = self.gate.lock();
        let (buffered, terminal, id, connection) = {
            let mut state = self.state.lock();
            let buffered = state.buffer.clone();
            let terminal = state.terminal.clone();
            let mut id = None;
            let mut connection = None;
            if terminal.is_none() {
                let next = state.next_id;
                state.next_id += 1;
                state.observers.push((next, observer.clone()));
                id = Some(next);
                if state.connection.is_none() {
                    let fresh = Subscription::new();
                    state.connection = Some(fresh.clone());
                    connection = Some(fresh);
                }
            }
            (buffered, terminal, id, connection)
        };

        for value in buffered {
            observer.next(value);
        }
        if let Some(terminal) = terminal {
            observer.terminate(terminal);
            return;
        }
        if let Some(id) = id {
            let weak: Weak<Self> = Arc::downgrade(self);
            observer.subscription().add(move || {
                if let Some(replay) = weak.upgrade() {
                    replay.release(id);
                }
            });
        }
        if let Some(connection) = connection {
            self.connect(connection);
        }
    }

    /// The upstream observer keeps the replay alive until the run ends or
    /// is cancelled, even once every handle to the shared stream is gone.
    fn connect(self: &Arc<Self>, connection: Subscription) {
        let on_next = Arc::clone(self);
        let on_error = Arc::clone(self);
        let on_complete = Arc::clone(self);
        self.source.subscribe_observer(Observer::with_subscription(
            connection,
            move |value| on_next.emit(value),
            move |error| on_error.finish(Terminal::Failed(error)),
            move || on_complete.finish(Terminal::Completed),
        ));
    }

    fn emit(&self, value: T) {
        let _gate = self.gate.lock();
        let observers: Vec<Observer<T>> = {
            let mut state = self.state.lock();
            state.buffer.push(value.clone());
            state.observers.iter().map(|(_, observer)| observer.clone()).collect()
        };
        for observer in observers {
            observer.next(value.clone());
        }
    }

    fn finish(&self, terminal: Terminal) {
        let _gate = self.gate.lock();
        let observers = {
            let mut state = self.state.lock();
            state.terminal = Some(terminal.clone());
            state.connection = None;
            std::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            observer.terminate(terminal.clone());
        }
    }

    /// Drop one subscriber; the last one out cancels an unfinished run.
    fn release(&self, id: u64) {
        let connection = {
            let mut state = self.state.lock();
            state.observers.retain(|(other, _)| *other != id);
            if state.observers.is_empty() && state.terminal.is_none() {
                state.buffer.clear();
                state.connection.take()
            } else {
                None
            }
        };
        if let Some(connection) = connection {
            connection.dispose();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Share one upstream run between all subscribers.
    ///
    /// The first subscriber starts the run; later ones receive every value
    /// emitted so far and then the live ones. If every subscriber leaves
    /// before the run ends, the run is disposed and the next subscriber
    /// starts a fresh one. Once the run has ended, new subscribers get the
    /// recorded values and terminal event without a new run.
    pub fn share_replay(&self) -> Observable<T> {
        let replay = Arc::new(Replay {
            source: self.clone(),
            state: Mutex::new(ReplayState {
                buffer: Vec::new(),
                terminal: None,
                observers: Vec::new(),
                next_id: 0,
                connection: None,
            }),
            gate: ReentrantMutex::new(()),
        });
        Observable::create(move |observer| replay.subscribe(observer))
    }
}
