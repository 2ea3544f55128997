use std::time::Duration;

use crate::{
    Task,
    config::PoolConfig,
    error::{Error, Result},
};

/// Methods for creating a pool.
pub trait PoolInit
where
    Self: Sized,
{
    /// Create a pool and spawn its worker threads.
    /// If a thread can not be spawned, the threads spawned so far are shut down
    /// and joined before the error is returned.
    fn with_config(config: PoolConfig) -> Result<Self>;

    /// Create a pool with a given number of worker threads and default settings otherwise.
    fn with_num_threads(num_worker_threads: usize) -> Result<Self> {
        Self::with_config(PoolConfig::builder().num_threads(num_worker_threads).build()?)
    }

    /// Create a pool with default settings.
    /// The number of worker threads will be set to the number of available logical cores minus one.
    fn new() -> Result<Self> {
        Self::with_config(PoolConfig::default())
    }
}

/// Methods for interacting with a pool.
pub trait PoolMethods<R> {
    /// Add a task to the end of the input queue.
    /// The task will be run by one of the worker threads.
    fn submit(&self, task: Task<R>) -> Result<()>;

    /// Add multiple tasks to the end of the input queue and return how many were added.
    fn submit_all(&self, tasks: impl IntoIterator<Item = Task<R>>) -> Result<usize> {
        let mut count = 0;
        for task in tasks {
            self.submit(task)?;
            count += 1;
        }
        Ok(count)
    }

    /// Return the next completed task. Blocks until one is available.
    /// Blocks forever if no task is pending.
    fn wait(&mut self) -> Result<Task<R>>;

    /// Return the next completed task or [`Error::Busy`] if none is ready.
    /// This function will not block.
    fn try_wait(&mut self) -> Result<Task<R>>;

    /// Like [`PoolMethods::wait`] but gives up with [`Error::Timeout`] after `timeout`.
    fn wait_timeout(&mut self, timeout: Duration) -> Result<Task<R>>;

    /// Number of submitted tasks that have not been returned yet.
    /// This includes queued, running and completed-but-unclaimed tasks.
    fn pending(&self) -> usize;

    /// Shut the pool down. Every queued task is run before the worker threads exit.
    /// Blocks until all worker threads have been joined.
    fn delete(self) -> Result<()>
    where
        Self: Sized;

    /// Return all completed tasks that are ready now.
    /// This function will not block.
    fn drain_ready(&mut self) -> Result<Vec<Task<R>>> {
        let mut tasks = Vec::new();
        loop {
            match self.try_wait() {
                Ok(task) => tasks.push(task),
                Err(Error::Busy) => return Ok(tasks),
                Err(err) => return Err(err),
            }
        }
    }

    /// Block until every pending task has been returned and return them in a vector.
    fn wait_all(&mut self) -> Result<Vec<Task<R>>> {
        let mut tasks = Vec::with_capacity(self.pending());
        while self.pending() > 0 {
            tasks.push(self.wait()?);
        }
        Ok(tasks)
    }
}
