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
    queue::{Index, TaskOrderer, TaskQueue},
    task::Work,
};

/// A pool that runs tasks in parallel using multiple worker threads.
/// Completed tasks are returned in the same order as they were submitted.
///
/// Every task is tagged with the index it was accepted under. Finished tasks
/// are buffered until all tasks submitted before them have been returned.
pub struct OrderedPool<R>
where
    R: Send + 'static,
{
    input: InputQueue<R>,
    output: TaskOrderer<Task<R>>,
    workers: Vec<JoinHandle<()>>,
    pending: AtomicUsize,
    next_index: Index,
}

impl<R> PoolInit for OrderedPool<R>
where
    R: Send + 'static,
{
    fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let allocator = config.allocator();
        let input: InputQueue<R> = TaskQueue::with_capacity(allocator.clone(), config.num_threads)?;
        let output: TaskOrderer<Task<R>> = TaskOrderer::new(allocator);

        let workers = spawn_workers(&config, &input, {
            let output = output.clone();
            move |task, index| output.push(task, index)
        })?;
        debug!(num_threads = workers.len(), "ordered pool started");

        Ok(OrderedPool {
            input,
            output,
            workers,
            pending: AtomicUsize::new(0),
            next_index: 0,
        })
    }
}

impl<R> PoolMethods<R> for OrderedPool<R>
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
        let (task, index) = self.output.accept(self.next_index)?;
        Ok(self.claim(task, index))
    }

    fn try_wait(&mut self) -> Result<Task<R>> {
        let (task, index) = self.output.try_accept(self.next_index)?;
        Ok(self.claim(task, index))
    }

    fn wait_timeout(&mut self, timeout: Duration) -> Result<Task<R>> {
        let (task, index) = self.output.accept_timeout(self.next_index, timeout)?;
        Ok(self.claim(task, index))
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn delete(mut self) -> Result<()> {
        self.shutdown()
    }
}

impl<R> OrderedPool<R>
where
    R: Send + 'static,
{
    /// Index of the next task [`PoolMethods::wait`] will return.
    pub fn next_index(&self) -> Index {
        self.next_index
    }

    fn claim(&mut self, task: Task<R>, index: Index) -> Task<R> {
        // Indices are gapless and each is published once, so the lowest
        // releasable index is always the expected one.
        debug_assert_eq!(index, self.next_index);
        self.next_index += 1;
        *self.pending.get_mut() -= 1;
        task
    }

    fn shutdown(&mut self) -> Result<()> {
        let workers = std::mem::take(&mut self.workers);
        if workers.is_empty() {
            return Ok(());
        }
        shutdown_workers(&self.input, workers)?;
        debug!("ordered pool stopped");
        Ok(())
    }
}

impl<R> Drop for OrderedPool<R>
where
    R: Send + 'static,
{
    /// Drop the pool. Runs all queued tasks and joins the worker threads.
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!(error = %err, "failed to shut down ordered pool");
        }
    }
}
