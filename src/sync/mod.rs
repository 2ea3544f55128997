//! Synchronization primitives the queues are built from.

mod semaphore;
pub use semaphore::{Semaphore, SemaphoreGuard};
