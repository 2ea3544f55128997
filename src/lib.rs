//! # Task Pool
//!
//! This crate provides a worker-thread pool built from three blocking primitives:
//! a counting [`sync::Semaphore`], a FIFO [`queue::TaskQueue`] and a reorder buffer, the [`queue::TaskOrderer`].
//! Submit [`Task`]s to a pool and wait for them to come back with their results filled in.
//!
//! ## Pools
//! There are two types of pools:
//! - [`OrderedPool`] returns completed tasks in the same order as they were submitted.
//! - [`UnorderedPool`] returns completed tasks as soon as they finish.
//!
//! [`Pool`] wraps both behind one type, with the [`Delivery`] order chosen at construction.
//!
//! ## Example
//! ```rust
//! use task_pool::prelude::*;
//!
//! fn main() -> task_pool::Result<()> {
//!     let mut pool = Pool::new(4, Delivery::Ordered, None)?;
//!
//!     for n in 0..10u64 {
//!         pool.submit(Task::with_arg(|n| n * n, n))?;
//!     }
//!
//!     let squares = pool
//!         .wait_all()?
//!         .into_iter()
//!         .map(Task::into_result)
//!         .collect::<task_pool::Result<Vec<_>>>()?;
//!     assert_eq!(squares, vec![0, 1, 4, 9, 16, 25, 36, 49, 64, 81]);
//!
//!     pool.delete()
//! }
//! ```
//!
//! ## Non-blocking polling
//! [`PoolMethods::try_wait`] returns [`Error::Busy`] while no completed task is ready.
//! ```rust
//! use task_pool::prelude::*;
//!
//! let mut pool = UnorderedPool::with_num_threads(2).unwrap();
//! assert!(matches!(pool.try_wait(), Err(Error::Busy)));
//!
//! pool.submit(Task::new(|| "done")).unwrap();
//! let task = pool.wait().unwrap();
//! assert_eq!(task.result(), Some(&"done"));
//! ```
//!
//! ## Shutdown
//! [`PoolMethods::delete`] runs every queued task, then joins all worker threads.
//! It consumes the pool, so submitting afterwards does not compile:
//! ```rust,compile_fail
//! use task_pool::prelude::*;
//!
//! let pool = UnorderedPool::<u32>::with_num_threads(2).unwrap();
//! pool.delete().unwrap();
//! pool.submit(Task::new(|| 1)).unwrap();
//! ```
//! Dropping a pool shuts it down the same way.

pub mod alloc;

pub mod config;
pub use config::{PoolConfig, PoolConfigBuilder};

mod error;
pub use error::{Error, Result};

mod internal;

pub mod pool_traits;

pub mod queue;

pub mod sync;

mod task;
pub use task::Task;

mod workers;
pub use workers::{Delivery, OrderedPool, Pool, UnorderedPool};

pub mod prelude {
    pub use crate::error::Error;
    pub use crate::pool_traits::{PoolInit, PoolMethods};
    pub use crate::task::Task;
    pub use crate::workers::{Delivery, OrderedPool, Pool, UnorderedPool};
}
