use std::time::Duration;

use crate::{
    Task,
    alloc::AllocatorRef,
    config::PoolConfig,
    error::Result,
    pool_traits::{PoolInit, PoolMethods},
};

use super::{OrderedPool, UnorderedPool};

/// The order in which a [`Pool`] returns completed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Tasks are returned in submission order.
    Ordered,
    /// Tasks are returned as soon as they finish.
    CompletionOrder,
}

/// A pool whose delivery order is chosen at construction.
///
/// Both variants offer the same [`PoolMethods`]; the variant never changes
/// after construction.
pub enum Pool<R>
where
    R: Send + 'static,
{
    Ordered(OrderedPool<R>),
    Unordered(UnorderedPool<R>),
}

impl<R> Pool<R>
where
    R: Send + 'static,
{
    /// Create a pool with `num_threads` worker threads.
    /// `allocator` is charged for queue growth; `None` selects the platform default.
    pub fn new(
        num_threads: usize,
        delivery: Delivery,
        allocator: Option<AllocatorRef>,
    ) -> Result<Pool<R>> {
        let config = PoolConfig {
            num_threads,
            allocator,
            ..PoolConfig::default()
        };
        Pool::with_config(delivery, config)
    }

    pub fn with_config(delivery: Delivery, config: PoolConfig) -> Result<Pool<R>> {
        match delivery {
            Delivery::Ordered => OrderedPool::with_config(config).map(Pool::Ordered),
            Delivery::CompletionOrder => UnorderedPool::with_config(config).map(Pool::Unordered),
        }
    }

    pub fn delivery(&self) -> Delivery {
        match self {
            Pool::Ordered(_) => Delivery::Ordered,
            Pool::Unordered(_) => Delivery::CompletionOrder,
        }
    }
}

impl<R> PoolMethods<R> for Pool<R>
where
    R: Send + 'static,
{
    fn submit(&self, task: Task<R>) -> Result<()> {
        match self {
            Pool::Ordered(pool) => pool.submit(task),
            Pool::Unordered(pool) => pool.submit(task),
        }
    }

    fn wait(&mut self) -> Result<Task<R>> {
        match self {
            Pool::Ordered(pool) => pool.wait(),
            Pool::Unordered(pool) => pool.wait(),
        }
    }

    fn try_wait(&mut self) -> Result<Task<R>> {
        match self {
            Pool::Ordered(pool) => pool.try_wait(),
            Pool::Unordered(pool) => pool.try_wait(),
        }
    }

    fn wait_timeout(&mut self, timeout: Duration) -> Result<Task<R>> {
        match self {
            Pool::Ordered(pool) => pool.wait_timeout(timeout),
            Pool::Unordered(pool) => pool.wait_timeout(timeout),
        }
    }

    fn pending(&self) -> usize {
        match self {
            Pool::Ordered(pool) => pool.pending(),
            Pool::Unordered(pool) => pool.pending(),
        }
    }

    fn delete(self) -> Result<()> {
        match self {
            Pool::Ordered(pool) => pool.delete(),
            Pool::Unordered(pool) => pool.delete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_delivery_is_fixed_at_construction() {
        let pool = Pool::<u8>::new(2, Delivery::Ordered, None).unwrap();
        assert_eq!(pool.delivery(), Delivery::Ordered);
        pool.delete().unwrap();

        let pool = Pool::<u8>::new(2, Delivery::CompletionOrder, None).unwrap();
        assert_eq!(pool.delivery(), Delivery::CompletionOrder);
        pool.delete().unwrap();
    }

    #[test]
    fn test_zero_threads_is_rejected() {
        assert!(matches!(
            Pool::<u8>::new(0, Delivery::Ordered, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_pool_polling() {
        for delivery in [Delivery::Ordered, Delivery::CompletionOrder] {
            let mut pool = Pool::<u8>::new(2, delivery, None).unwrap();
            for _ in 0..10 {
                assert!(matches!(pool.try_wait(), Err(Error::Busy)));
            }
            assert!(matches!(
                pool.wait_timeout(Duration::from_millis(20)),
                Err(Error::Timeout)
            ));
            assert_eq!(pool.pending(), 0);
            assert!(pool.drain_ready().unwrap().is_empty());
            pool.delete().unwrap();
        }
    }
}
