use std::{collections::VecDeque, sync::Arc, time::Duration};

use super::{Index, Rejected};
use crate::{
    alloc::AllocatorRef,
    error::{Error, Result},
    internal::Reservation,
    sync::Semaphore,
};

struct Fifo<T> {
    items: VecDeque<T>,
    reservation: Reservation,
    next_index: Index,
    closed: bool,
}

impl<T> Fifo<T> {
    fn new(items: VecDeque<T>, reservation: Reservation) -> Fifo<T> {
        Fifo {
            items,
            reservation,
            next_index: 0,
            closed: false,
        }
    }

    fn reserve_slot(&mut self, after_close: bool) -> Result<()> {
        if self.closed && !after_close {
            return Err(Error::ShutDown);
        }
        let items = &mut self.items;
        self.reservation
            .reserve_one(items.len(), |extra| items.try_reserve(extra))
    }

    /// Only called with a permit taken, so an empty deque means the permit
    /// count and the contents have drifted apart.
    fn pop(&mut self) -> Result<(T, Index)> {
        let item = self.items.pop_front().ok_or(Error::Corrupted)?;
        let index = self.next_index;
        self.next_index += 1;
        Ok((item, index))
    }
}

/// A blocking FIFO queue.
///
/// Every accepted item is tagged with a sequence index. Indices start at 0 and
/// increase by one per accepted item for the lifetime of the queue, so they
/// record the submission order. Cloning a [`TaskQueue`] shares the queue.
pub struct TaskQueue<T> {
    inner: Arc<Semaphore<Fifo<T>>>,
}

impl<T> TaskQueue<T> {
    pub fn new(allocator: AllocatorRef) -> TaskQueue<T> {
        let fifo = Fifo::new(VecDeque::new(), Reservation::new::<T>(allocator));
        TaskQueue {
            inner: Arc::new(Semaphore::with_value(0, fifo)),
        }
    }

    /// Create a queue that holds `capacity` items before it has to grow.
    pub fn with_capacity(allocator: AllocatorRef, capacity: usize) -> Result<TaskQueue<T>> {
        let mut reservation = Reservation::new::<T>(allocator);
        let mut items = VecDeque::new();
        reservation.reserve_exact(capacity, 0, |extra| items.try_reserve_exact(extra))?;

        Ok(TaskQueue {
            inner: Arc::new(Semaphore::with_value(0, Fifo::new(items, reservation))),
        })
    }

    /// Add an item to the end of the queue and wake one blocked consumer.
    ///
    /// Fails with [`Error::ResourceExhausted`] if the queue can not grow and with
    /// [`Error::ShutDown`] after [`TaskQueue::close`]. The queue is unchanged on failure.
    pub fn submit(&self, item: T) -> Result<()> {
        self.push(item).map_err(|(err, _)| err)
    }

    /// Add multiple items to the end of the queue and return how many were added.
    /// Stops at the first item that can not be added.
    pub fn submit_all(&self, items: impl IntoIterator<Item = T>) -> Result<usize> {
        let mut count = 0;
        for item in items {
            self.submit(item)?;
            count += 1;
        }
        Ok(count)
    }

    /// Take the item at the front of the queue together with its sequence index.
    /// Blocks while the queue is empty.
    pub fn accept(&self) -> Result<(T, Index)> {
        self.inner.wait_and_lock()?.pop()
    }

    /// Like [`TaskQueue::accept`] but returns [`Error::Busy`] instead of blocking.
    pub fn try_accept(&self) -> Result<(T, Index)> {
        self.inner.try_wait_and_lock()?.pop()
    }

    /// Like [`TaskQueue::accept`] but gives up with [`Error::Timeout`] after `timeout`.
    pub fn accept_timeout(&self, timeout: Duration) -> Result<(T, Index)> {
        self.inner.wait_timeout_and_lock(timeout)?.pop()
    }

    /// Refuse all further submissions. Queued items can still be accepted.
    pub fn close(&self) -> Result<()> {
        self.inner.lock()?.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.inner.lock()?.closed)
    }

    /// Number of items waiting to be accepted.
    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.lock()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Like [`TaskQueue::submit`] but hands the item back on failure.
    pub(crate) fn push(&self, item: T) -> std::result::Result<(), Rejected<T>> {
        self.push_inner(item, false)
    }

    /// Like [`TaskQueue::push`] but also accepted after [`TaskQueue::close`].
    pub(crate) fn push_after_close(&self, item: T) -> std::result::Result<(), Rejected<T>> {
        self.push_inner(item, true)
    }

    /// Grow the queue so that it holds `capacity` items before a push has to grow it again.
    pub(crate) fn reserve(&self, capacity: usize) -> Result<()> {
        let mut fifo = self.inner.lock()?;
        let Fifo {
            items, reservation, ..
        } = &mut *fifo;
        reservation.reserve_for(capacity, items.len(), |extra| items.try_reserve(extra))
    }

    /// Wake every blocked consumer. Used when the queue lock has been poisoned,
    /// so that consumers stuck in [`TaskQueue::accept`] observe the failure.
    pub(crate) fn wake_all(&self) {
        self.inner.wake_all();
    }

    #[cfg(test)]
    pub(crate) fn poison(&self)
    where
        T: Send,
    {
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _fifo = self.inner.lock();
                    panic!("poison the queue lock");
                })
                .join();
        });
    }

    fn push_inner(&self, item: T, after_close: bool) -> std::result::Result<(), Rejected<T>> {
        let mut fifo = match self.inner.post_and_lock() {
            Ok(fifo) => fifo,
            Err(err) => return Err((err, item)),
        };
        match fifo.reserve_slot(after_close) {
            Ok(()) => {
                fifo.items.push_back(item);
                Ok(())
            }
            Err(err) => {
                fifo.revert_post();
                Err((err, item))
            }
        }
    }
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> TaskQueue<T> {
        TaskQueue {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread::{sleep, spawn},
    };

    use super::*;
    use crate::alloc::{BoundedAllocator, system};

    #[test]
    fn test_task_queue() {
        let task_queue = TaskQueue::new(system());
        assert_eq!(task_queue.len().unwrap(), 0);
        task_queue.submit(1).unwrap();
        assert_eq!(task_queue.len().unwrap(), 1);
        task_queue.submit(2).unwrap();
        assert_eq!(task_queue.len().unwrap(), 2);
        assert_eq!(task_queue.accept().unwrap(), (1, 0));
        assert_eq!(task_queue.len().unwrap(), 1);
        assert_eq!(task_queue.accept().unwrap(), (2, 1));
        assert!(task_queue.is_empty().unwrap());

        let task_queue_clone = task_queue.clone();
        let t = spawn(move || task_queue_clone.accept());

        sleep(Duration::from_millis(500));
        assert!(!t.is_finished());

        task_queue.submit(3).unwrap();
        assert_eq!(t.join().unwrap().unwrap(), (3, 2));

        let threads = (0..10)
            .map(|_| {
                let task_queue_clone = task_queue.clone();
                spawn(move || task_queue_clone.accept())
            })
            .collect::<Vec<_>>();

        sleep(Duration::from_millis(100));
        assert!(threads.iter().all(|t| !t.is_finished()));
        assert_eq!(task_queue.submit_all(0..1).unwrap(), 1);
        assert_eq!(task_queue.submit_all(0..0).unwrap(), 0);
        assert_eq!(task_queue.submit_all(0..9).unwrap(), 9);

        let mut indices = threads
            .into_iter()
            .map(|t| t.join().unwrap().unwrap().1)
            .collect::<Vec<_>>();
        indices.sort_unstable();
        assert_eq!(indices, (3..13).collect::<Vec<_>>());
    }

    #[test]
    fn test_fifo_order_and_indices() {
        let task_queue = TaskQueue::new(system());
        task_queue.submit_all((0..1000).map(|n| n * 3)).unwrap();

        for i in 0..1000 {
            assert_eq!(task_queue.accept().unwrap(), (i * 3, i as Index));
        }
    }

    #[test]
    fn test_try_accept() {
        let task_queue = TaskQueue::<u32>::new(system());
        for _ in 0..10 {
            assert!(matches!(task_queue.try_accept(), Err(Error::Busy)));
        }
        task_queue.submit(5).unwrap();
        assert_eq!(task_queue.try_accept().unwrap(), (5, 0));
        assert!(matches!(task_queue.try_accept(), Err(Error::Busy)));

        task_queue.submit(6).unwrap();
        assert_eq!(task_queue.accept().unwrap(), (6, 1));
    }

    #[test]
    fn test_accept_timeout() {
        let task_queue = TaskQueue::<u32>::new(system());
        assert!(matches!(
            task_queue.accept_timeout(Duration::from_millis(20)),
            Err(Error::Timeout)
        ));
        task_queue.submit(1).unwrap();
        assert_eq!(
            task_queue.accept_timeout(Duration::from_millis(20)).unwrap(),
            (1, 0)
        );
    }

    #[test]
    fn test_accept_with_unrepresentable_timeout() {
        let task_queue = TaskQueue::new(system());
        task_queue.submit(7).unwrap();
        assert_eq!(task_queue.accept_timeout(Duration::MAX).unwrap(), (7, 0));
    }

    #[test]
    fn test_push_after_close() {
        let task_queue = TaskQueue::new(system());
        task_queue.close().unwrap();
        assert!(matches!(task_queue.push(1), Err((Error::ShutDown, 1))));

        task_queue.push_after_close(2).unwrap();
        assert_eq!(task_queue.accept().unwrap(), (2, 0));
    }

    #[test]
    fn test_reserve_keeps_pushes_off_the_allocator() {
        let allocator = Arc::new(BoundedAllocator::new(8 * size_of::<u64>()));
        let task_queue = TaskQueue::new(allocator.clone());

        task_queue.reserve(6).unwrap();
        let charged = allocator.in_use();
        assert!(charged >= 6 * size_of::<u64>());

        assert_eq!(task_queue.submit_all(0..6u64).unwrap(), 6);
        assert_eq!(allocator.in_use(), charged);

        assert!(matches!(
            task_queue.reserve(9),
            Err(Error::ResourceExhausted { .. })
        ));
        assert_eq!(allocator.in_use(), charged);
    }

    #[test]
    fn test_closed_queue_refuses_submissions() {
        let task_queue = TaskQueue::new(system());
        task_queue.submit(1).unwrap();
        task_queue.close().unwrap();
        assert!(task_queue.is_closed().unwrap());

        assert!(matches!(task_queue.submit(2), Err(Error::ShutDown)));
        assert_eq!(task_queue.len().unwrap(), 1);

        assert_eq!(task_queue.accept().unwrap(), (1, 0));
        assert!(matches!(task_queue.try_accept(), Err(Error::Busy)));
    }

    #[test]
    fn test_exhausted_allocator_rolls_back() {
        let allocator = Arc::new(BoundedAllocator::new(4 * size_of::<u64>()));
        let task_queue = TaskQueue::new(allocator.clone());

        assert_eq!(task_queue.submit_all(0..4u64).unwrap(), 4);
        assert!(matches!(
            task_queue.submit(4),
            Err(Error::ResourceExhausted { .. })
        ));
        assert_eq!(task_queue.len().unwrap(), 4);
        assert!(matches!(task_queue.submit_all(4..6), Err(Error::ResourceExhausted { .. })));

        for i in 0..4 {
            assert_eq!(task_queue.accept().unwrap(), (i, i as Index));
        }
        assert!(matches!(task_queue.try_accept(), Err(Error::Busy)));

        // Capacity is kept, so a drained queue takes items again.
        task_queue.submit(10).unwrap();
        assert_eq!(task_queue.accept().unwrap(), (10, 4));

        drop(task_queue);
        assert_eq!(allocator.in_use(), 0);
    }

    #[test]
    fn test_with_capacity() {
        let allocator = Arc::new(BoundedAllocator::new(3 * size_of::<u32>()));
        let task_queue = TaskQueue::<u32>::with_capacity(allocator.clone(), 3).unwrap();
        assert_eq!(allocator.in_use(), 3 * size_of::<u32>());
        assert_eq!(task_queue.submit_all(0..3).unwrap(), 3);
        assert!(task_queue.submit(3).is_err());

        assert!(matches!(
            TaskQueue::<u32>::with_capacity(allocator.clone(), 1),
            Err(Error::ResourceExhausted { .. })
        ));
    }
}
