use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread::JoinHandle,
    time::Duration,
};

use tracing::{debug, error};

use super::worker_thread::{InputQueue, shutdown_workers, spawn_workers};
use crate::{
    Task,
    config::PoolConfig,
    error::Result,
    pool_traits::{PoolInit, PoolMethods},
    queue::TaskQueue,
    task::Work,
};

/// A pool that runs tasks in parallel using multiple worker threads.
/// Completed tasks are returned in the order they finish, not in the order they were submitted.
pub struct UnorderedPool<R>
where
    R: Send + 'static,
{
    input: InputQueue<R>,
    output: TaskQueue<Task<R>>,
    workers: Vec<JoinHandle<()>>,
    pending: AtomicUsize,
}

impl<R> PoolInit for UnorderedPool<R>
where
    R: Send + 'static,
{
    fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let allocator = config.allocator();
        let input: InputQueue<R> = TaskQueue::with_capacity(allocator.clone(), config.num_threads)?;
        let output: TaskQueue<Task<R>> = TaskQueue::new(allocator);

        let workers = spawn_workers(&config, &input, {
            let output = output.clone();
            move |task, _index| output.push(task)
        })?;
        debug!(num_threads = workers.len(), "unordered pool started");

        Ok(UnorderedPool {
            input,
            output,
            workers,
            pending: AtomicUsize::new(0),
        })
    }
}

impl<R> PoolMethods<R> for UnorderedPool<R>
where
    R: Send + 'static,
{
    /// Fails with [`crate::Error::ResourceExhausted`] if the allocator can not provide
    /// room for the task in the input queue or for its result in the output.
    fn submit(&self, task: Task<R>) -> Result<()> {
        // Results never outnumber pending tasks, so reserving output room for
        // every pending task means a worker never has to grow the output.
        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        let submitted = self
            .output
            .reserve(pending)
            .and_then(|()| self.input.submit(Work::Task(task)));
        if submitted.is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        submitted
    }

    fn wait(&mut self) -> Result<Task<R>> {
        let (task, _) = self.output.accept()?;
        Ok(self.claim(task))
    }

    fn try_wait(&mut self) -> Result<Task<R>> {
        let (task, _) = self.output.try_accept()?;
        Ok(self.claim(task))
    }

    fn wait_timeout(&mut self, timeout: Duration) -> Result<Task<R>> {
        let (task, _) = self.output.accept_timeout(timeout)?;
        Ok(self.claim(task))
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn delete(mut self) -> Result<()> {
        self.shutdown()
    }
}

impl<R> UnorderedPool<R>
where
    R: Send + 'static,
{
    fn claim(&mut self, task: Task<R>) -> Task<R> {
        *self.pending.get_mut() -= 1;
        task
    }

    fn shutdown(&mut self) -> Result<()> {
        let workers = std::mem::take(&mut self.workers);
        if workers.is_empty() {
            return Ok(());
        }
        shutdown_workers(&self.input, workers)?;
        debug!("unordered pool stopped");
        Ok(())
    }
}

impl<R> Drop for UnorderedPool<R>
where
    R: Send + 'static,
{
    /// Drop the pool. Runs all queued tasks and joins the worker threads.
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!(error = %err, "failed to shut down unordered pool");
        }
    }
}
