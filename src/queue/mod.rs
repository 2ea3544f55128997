//! Blocking queues shared between the pool and its worker threads.
//!
//! [`TaskQueue`] hands out items in submission order and tags each with a
//! sequence index. [`TaskOrderer`] takes items back in any order and releases
//! them in index order.

mod task_orderer;
mod task_queue;

pub use task_orderer::TaskOrderer;
pub use task_queue::TaskQueue;

/// Sequence index assigned by a [`TaskQueue`] when an item is accepted.
pub type Index = i64;

/// An item that could not be queued, handed back together with the reason.
pub(crate) type Rejected<T> = (crate::Error, T);
