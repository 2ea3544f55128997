use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, trace, warn};

use crate::{
    Task,
    config::PoolConfig,
    error::{Error, Result},
    queue::{Index, Rejected, TaskQueue},
    task::Work,
};

/// Pause between attempts to queue an item while the allocator is exhausted.
const BACKOFF: Duration = Duration::from_millis(1);

pub(crate) type InputQueue<R> = TaskQueue<Work<Task<R>>>;

/// Spawn `config.num_threads` workers that run tasks from `input` and hand each
/// finished task to `publish` together with the index it was accepted under.
pub(crate) fn spawn_workers<R, P>(
    config: &PoolConfig,
    input: &InputQueue<R>,
    publish: P,
) -> Result<Vec<JoinHandle<()>>>
where
    R: Send + 'static,
    P: Fn(Task<R>, Index) -> std::result::Result<(), Rejected<Task<R>>> + Clone + Send + 'static,
{
    spawn_all(config.num_threads, input, |id| {
        let input = input.clone();
        let publish = publish.clone();
        config
            .thread_builder(id)
            .spawn(move || run_worker(id, input, publish))
    })
}

fn spawn_all<T>(
    count: usize,
    input: &TaskQueue<Work<T>>,
    mut spawn_one: impl FnMut(usize) -> io::Result<JoinHandle<()>>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut workers = Vec::with_capacity(count);
    for id in 0..count {
        match spawn_one(id) {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                warn!(
                    worker = id,
                    error = %err,
                    spawned = workers.len(),
                    "failed to spawn worker thread, shutting down spawned workers"
                );
                if let Err(shutdown_err) = shutdown_workers(input, workers) {
                    error!(error = %shutdown_err, "failed to shut down spawned workers");
                }
                return Err(Error::Spawn(err));
            }
        }
    }
    Ok(workers)
}

fn run_worker<R, P>(id: usize, input: InputQueue<R>, publish: P)
where
    P: Fn(Task<R>, Index) -> std::result::Result<(), Rejected<Task<R>>>,
{
    debug!(worker = id, "worker started");
    loop {
        match input.accept() {
            Ok((Work::Task(mut task), index)) => {
                trace!(worker = id, index, "running task");
                task.run();
                // Room for every pending result is reserved at submit time.
                if let Err((err, _)) = publish(task, index) {
                    error!(worker = id, index, error = %err, "failed to publish task, stopping worker");
                    break;
                }
            }
            Ok((Work::Shutdown, _)) => break,
            Err(err) => {
                error!(worker = id, error = %err, "failed to accept task, stopping worker");
                break;
            }
        }
    }
    debug!(worker = id, "worker stopped");
}

/// Retry `push` while the allocator is exhausted. Workers free room in the
/// input queue by taking items out, so the push eventually goes through.
fn push_with_backoff<T>(
    push: impl Fn(T) -> std::result::Result<(), Rejected<T>>,
    mut item: T,
) -> Result<()> {
    let mut warned = false;
    loop {
        match push(item) {
            Ok(()) => return Ok(()),
            Err((Error::ResourceExhausted { requested }, rejected)) => {
                if !warned {
                    warn!(requested, "allocator exhausted, retrying");
                    warned = true;
                }
                item = rejected;
                thread::sleep(BACKOFF);
            }
            Err((err, _)) => return Err(err),
        }
    }
}

/// Close `input`, queue one [`Work::Shutdown`] per worker behind all queued
/// tasks and join every worker.
///
/// The input queue is FIFO, so every task queued before this call runs before
/// any worker sees its shutdown entry. Every worker is joined even if closing
/// or queueing fails; the first error is returned.
pub(crate) fn shutdown_workers<T>(
    input: &TaskQueue<Work<T>>,
    workers: Vec<JoinHandle<()>>,
) -> Result<()> {
    debug!(workers = workers.len(), "shutting down worker threads");
    let mut result = input.close().and_then(|()| {
        (0..workers.len())
            .try_for_each(|_| push_with_backoff(|work| input.push_after_close(work), Work::Shutdown))
    });
    if let Err(err) = &result {
        // Closing and queueing only fail on a poisoned lock. Waking the
        // workers makes each of them fail its accept and exit.
        error!(error = %err, "failed to queue shutdown entries");
        input.wake_all();
    }

    for (id, handle) in workers.into_iter().enumerate() {
        if handle.join().is_err() {
            error!(worker = id, "worker thread panicked");
            if result.is_ok() {
                result = Err(Error::Join { worker: id });
            }
        }
    }
    result
}
