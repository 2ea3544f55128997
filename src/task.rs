use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use crate::error::{Error, Result};

type Job<R> = Box<dyn FnOnce() -> R + Send + 'static>;

enum Outcome<R> {
    Pending,
    Done(R),
    Panicked(String),
}

/// A unit of work: a callable and a slot for its result.
///
/// The slot is filled exactly once, when a worker thread runs the task.
/// A panicking callable fills the slot with the panic message instead.
///
/// ## Example
/// ```rust
/// use task_pool::Task;
///
/// let square = Task::with_arg(|n: u64| n * n, 12);
/// let greeting = Task::new(|| String::from("hello"));
/// assert!(!square.is_complete());
/// # drop(greeting);
/// ```
pub struct Task<R> {
    job: Option<Job<R>>,
    outcome: Outcome<R>,
}

impl<R> Task<R> {
    pub fn new<F>(f: F) -> Task<R>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Task {
            job: Some(Box::new(f)),
            outcome: Outcome::Pending,
        }
    }

    /// Create a task that calls `f` with `arg`.
    pub fn with_arg<A, F>(f: F, arg: A) -> Task<R>
    where
        A: Send + 'static,
        F: FnOnce(A) -> R + Send + 'static,
    {
        Task::new(move || f(arg))
    }

    /// Returns true once the task has been run, whether it returned or panicked.
    pub fn is_complete(&self) -> bool {
        !matches!(self.outcome, Outcome::Pending)
    }

    /// The result, if the task has run and returned.
    pub fn result(&self) -> Option<&R> {
        match &self.outcome {
            Outcome::Done(result) => Some(result),
            _ => None,
        }
    }

    /// Take the result out of the task.
    ///
    /// Returns [`Error::TaskPanicked`] if the callable panicked and
    /// [`Error::Incomplete`] if the task has not been run.
    pub fn into_result(self) -> Result<R> {
        match self.outcome {
            Outcome::Done(result) => Ok(result),
            Outcome::Panicked(msg) => Err(Error::TaskPanicked(msg)),
            Outcome::Pending => Err(Error::Incomplete),
        }
    }

    /// Run the callable and fill the result slot. Does nothing on a completed task.
    pub(crate) fn run(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };
        self.outcome = match catch_unwind(AssertUnwindSafe(job)) {
            Ok(result) => Outcome::Done(result),
            Err(payload) => Outcome::Panicked(panic_message(payload)),
        };
    }
}

impl<R: fmt::Debug> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut task = f.debug_struct("Task");
        match &self.outcome {
            Outcome::Pending => task.field("outcome", &"pending"),
            Outcome::Done(result) => task.field("result", result),
            Outcome::Panicked(msg) => task.field("panicked", msg),
        };
        task.finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A queue entry for the worker threads. [`Work::Shutdown`] makes the worker that
/// accepts it exit.
pub(crate) enum Work<T> {
    Task(T),
    Shutdown,
}
