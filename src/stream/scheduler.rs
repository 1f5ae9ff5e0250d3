use crate::error::{Error, Result};
use std::thread;

/// Unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Decides where subscription work runs.
pub trait Scheduler: Send + Sync {
    /// Hand `task` over for execution.
    ///
    /// # Errors
    ///
    /// Fails when the task could not be scheduled; it is dropped unrun.
    fn schedule(&self, task: Task) -> Result<()>;
}

/// Runs tasks inline on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, task: Task) -> Result<()> {
        task();
        Ok(())
    }
}

/// Runs each task on a freshly spawned thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadScheduler {
    name: Option<String>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the spawned threads, which shows up in panic messages and traces.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, task: Task) -> Result<()> {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        builder.spawn(task).map(drop).map_err(|error| {
            tracing::warn!(%error, "failed to spawn scheduler thread");
            Error::failed(error)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn immediate_runs_inline() {
        let (tx, rx) = mpsc::channel();
        ImmediateScheduler
            .schedule(Box::new(move || tx.send(thread::current().id()).unwrap()))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), thread::current().id());
    }

    #[test]
    fn thread_scheduler_runs_elsewhere() {
        let (tx, rx) = mpsc::channel();
        ThreadScheduler::named("worker").schedule(Box::new(move || {
            tx.send(thread::current().name().map(str::to_string)).unwrap()
        }))
        .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("worker"));
    }
}
