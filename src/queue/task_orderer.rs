use std::{
    collections::BinaryHeap,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use super::{Index, Rejected};
use crate::{
    alloc::AllocatorRef,
    error::{Error, Result},
    internal::{OrderedEntry, Reservation},
};

struct ReorderBuffer<T> {
    heap: BinaryHeap<OrderedEntry<T>>,
    reservation: Reservation,
    floor: Index,
}

impl<T> ReorderBuffer<T> {
    fn reserve_slot(&mut self) -> Result<()> {
        let heap = &mut self.heap;
        self.reservation
            .reserve_one(heap.len(), |extra| heap.try_reserve(extra))
    }

    /// Record `min_index` as the lowest index any later request may ask for.
    fn raise_floor(&mut self, min_index: Index) -> Result<()> {
        if min_index < self.floor {
            return Err(Error::OrderViolation {
                requested: min_index,
                floor: self.floor,
            });
        }
        self.floor = min_index;
        Ok(())
    }

    /// Pop the lowest entry if its index does not exceed `min_index`.
    /// The top of the heap holds the lowest index, so checking it is enough.
    fn pop_ready(&mut self, min_index: Index) -> Option<(T, Index)> {
        match self.heap.peek() {
            Some(entry) if entry.index <= min_index => self
                .heap
                .pop()
                .map(|OrderedEntry { item, index }| (item, index)),
            _ => None,
        }
    }
}

struct InnerTaskOrderer<T> {
    buffer: Mutex<ReorderBuffer<T>>,
    condvar: Condvar,
}

/// A blocking reorder buffer.
///
/// Producers hand in items tagged with the index they got from a
/// [`super::TaskQueue`], in any order. The consumer asks for the next index it
/// expects; an item is released only once it holds the lowest buffered index and
/// that index does not exceed the requested one. Items that arrive early wait in
/// the buffer until every lower index has been released.
///
/// The consumer side is meant for a single thread asking for non-decreasing
/// indices. Asking for an index lower than one asked for before fails with
/// [`Error::OrderViolation`]. Cloning a [`TaskOrderer`] shares the buffer.
///
/// ## Example
/// ```rust
/// use task_pool::{alloc, queue::TaskOrderer};
///
/// let orderer = TaskOrderer::new(alloc::system());
/// orderer.submit("c", 2).unwrap();
/// orderer.submit("a", 0).unwrap();
///
/// assert_eq!(orderer.accept(0).unwrap(), ("a", 0));
/// assert!(orderer.try_accept(1).is_err());
///
/// orderer.submit("b", 1).unwrap();
/// assert_eq!(orderer.accept(1).unwrap(), ("b", 1));
/// assert_eq!(orderer.accept(2).unwrap(), ("c", 2));
/// ```
pub struct TaskOrderer<T> {
    inner: Arc<InnerTaskOrderer<T>>,
}

impl<T> TaskOrderer<T> {
    pub fn new(allocator: AllocatorRef) -> TaskOrderer<T> {
        TaskOrderer {
            inner: Arc::new(InnerTaskOrderer {
                buffer: Mutex::new(ReorderBuffer {
                    heap: BinaryHeap::new(),
                    reservation: Reservation::new::<OrderedEntry<T>>(allocator),
                    floor: Index::MIN,
                }),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Add an item completed under `index` and wake the consumer.
    pub fn submit(&self, item: T, index: Index) -> Result<()> {
        self.push(item, index).map_err(|(err, _)| err)
    }

    /// Take the item with the lowest index once that index is at most `min_index`.
    /// Blocks until such an item is available.
    pub fn accept(&self, min_index: Index) -> Result<(T, Index)> {
        let mut buffer = self.lock()?;
        buffer.raise_floor(min_index)?;
        loop {
            if let Some(entry) = buffer.pop_ready(min_index) {
                return Ok(entry);
            }
            buffer = self.inner.condvar.wait(buffer)?;
        }
    }

    /// Like [`TaskOrderer::accept`] but returns [`Error::Busy`] instead of blocking.
    pub fn try_accept(&self, min_index: Index) -> Result<(T, Index)> {
        let mut buffer = self.lock()?;
        buffer.raise_floor(min_index)?;
        buffer.pop_ready(min_index).ok_or(Error::Busy)
    }

    /// Like [`TaskOrderer::accept`] but gives up with [`Error::Timeout`] after `timeout`.
    /// A timeout too large to be represented as a deadline blocks like [`TaskOrderer::accept`].
    pub fn accept_timeout(&self, min_index: Index, timeout: Duration) -> Result<(T, Index)> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.accept(min_index);
        };
        let mut buffer = self.lock()?;
        buffer.raise_floor(min_index)?;
        loop {
            if let Some(entry) = buffer.pop_ready(min_index) {
                return Ok(entry);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            buffer = self.inner.condvar.wait_timeout(buffer, deadline - now)?.0;
        }
    }

    /// Number of buffered items.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.heap.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The lowest buffered index, if any.
    pub fn lowest_index(&self) -> Result<Option<Index>> {
        Ok(self.lock()?.heap.peek().map(|entry| entry.index))
    }

    /// Grow the buffer so that it holds `capacity` items before a push has to grow it again.
    pub(crate) fn reserve(&self, capacity: usize) -> Result<()> {
        let mut buffer = self.lock()?;
        let ReorderBuffer {
            heap, reservation, ..
        } = &mut *buffer;
        reservation.reserve_for(capacity, heap.len(), |extra| heap.try_reserve(extra))
    }

    /// Like [`TaskOrderer::submit`] but hands the item back on failure.
    pub(crate) fn push(&self, item: T, index: Index) -> std::result::Result<(), Rejected<T>> {
        let mut buffer = match self.lock() {
            Ok(buffer) => buffer,
            Err(err) => return Err((err, item)),
        };
        if let Err(err) = buffer.reserve_slot() {
            return Err((err, item));
        }
        buffer.heap.push(OrderedEntry { item, index });
        self.inner.condvar.notify_one();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReorderBuffer<T>>> {
        Ok(self.inner.buffer.lock()?)
    }
}

impl<T> Clone for TaskOrderer<T> {
    fn clone(&self) -> TaskOrderer<T> {
        TaskOrderer {
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

    use rand::seq::SliceRandom;

    use super::*;
    use crate::alloc::{BoundedAllocator, system};

    #[test]
    fn test_releases_in_index_order() {
        let orderer = TaskOrderer::new(system());
        for index in [3, 1, 4, 0, 2] {
            orderer.submit(index * 10, index).unwrap();
        }
        assert_eq!(orderer.len().unwrap(), 5);

        for index in 0..5 {
            assert_eq!(orderer.accept(index).unwrap(), (index * 10, index));
        }
        assert!(orderer.is_empty().unwrap());
    }

    #[test]
    fn test_holds_back_later_indices() {
        let orderer = TaskOrderer::new(system());
        orderer.submit('a', 0).unwrap();
        orderer.submit('c', 2).unwrap();
        orderer.submit('d', 3).unwrap();

        assert_eq!(orderer.accept(0).unwrap(), ('a', 0));
        for _ in 0..10 {
            assert!(matches!(orderer.try_accept(0), Err(Error::Busy)));
        }
        assert!(matches!(orderer.try_accept(1), Err(Error::Busy)));
        assert_eq!(orderer.len().unwrap(), 2);
        assert_eq!(orderer.lowest_index().unwrap(), Some(2));

        orderer.submit('b', 1).unwrap();
        assert_eq!(orderer.try_accept(1).unwrap(), ('b', 1));
        assert_eq!(orderer.try_accept(2).unwrap(), ('c', 2));
        assert_eq!(orderer.try_accept(3).unwrap(), ('d', 3));
        assert_eq!(orderer.lowest_index().unwrap(), None);
    }

    #[test]
    fn test_blocked_consumer_waits_for_its_index() {
        let orderer = TaskOrderer::new(system());

        let orderer_clone = orderer.clone();
        let t = spawn(move || orderer_clone.accept(0));

        orderer.submit(1, 1).unwrap();
        orderer.submit(2, 2).unwrap();
        sleep(Duration::from_millis(200));
        assert!(!t.is_finished());

        orderer.submit(0, 0).unwrap();
        assert_eq!(t.join().unwrap().unwrap(), (0, 0));
        assert_eq!(orderer.len().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_producers() {
        const NUM_ITEMS: Index = 2000;
        let orderer = TaskOrderer::new(system());

        let mut indices = (0..NUM_ITEMS).collect::<Vec<_>>();
        indices.shuffle(&mut rand::thread_rng());

        let producers = indices
            .chunks(NUM_ITEMS as usize / 8)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let orderer = orderer.clone();
                spawn(move || {
                    for index in chunk {
                        orderer.submit(index * index, index).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();

        for index in 0..NUM_ITEMS {
            assert_eq!(orderer.accept(index).unwrap(), (index * index, index));
        }
        assert!(producers.into_iter().all(|t| t.join().is_ok()));
    }

    #[test]
    fn test_rejects_decreasing_min_index() {
        let orderer = TaskOrderer::<u8>::new(system());
        orderer.submit(0, 0).unwrap();
        orderer.submit(1, 1).unwrap();
        assert_eq!(orderer.accept(1).unwrap(), (0, 0));

        assert!(matches!(
            orderer.try_accept(0),
            Err(Error::OrderViolation { requested: 0, floor: 1 })
        ));
        assert!(matches!(
            orderer.accept(0),
            Err(Error::OrderViolation { .. })
        ));
        assert_eq!(orderer.accept(1).unwrap(), (1, 1));
    }

    #[test]
    fn test_accept_timeout() {
        let orderer = TaskOrderer::new(system());
        orderer.submit("late", 5).unwrap();

        assert!(matches!(
            orderer.accept_timeout(0, Duration::from_millis(30)),
            Err(Error::Timeout)
        ));
        assert_eq!(orderer.len().unwrap(), 1);
        assert_eq!(
            orderer.accept_timeout(5, Duration::from_millis(30)).unwrap(),
            ("late", 5)
        );
    }

    #[test]
    fn test_accept_with_unrepresentable_timeout() {
        let orderer = TaskOrderer::new(system());
        orderer.submit("ready", 0).unwrap();
        assert_eq!(orderer.accept_timeout(0, Duration::MAX).unwrap(), ("ready", 0));
    }

    #[test]
    fn test_reserved_room_is_not_charged_again() {
        let slot = size_of::<OrderedEntry<u64>>();
        let allocator = Arc::new(BoundedAllocator::new(8 * slot));
        let orderer = TaskOrderer::new(allocator.clone());

        orderer.reserve(8).unwrap();
        assert_eq!(allocator.in_use(), 8 * slot);
        for index in (0..8).rev() {
            orderer.submit(index as u64, index).unwrap();
        }
        assert_eq!(allocator.in_use(), 8 * slot);
        assert!(matches!(
            orderer.reserve(9),
            Err(Error::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_exhausted_allocator_keeps_item() {
        let allocator = Arc::new(BoundedAllocator::new(4 * size_of::<OrderedEntry<u64>>()));
        let orderer = TaskOrderer::new(allocator.clone());
        for index in 0..4 {
            orderer.submit(index as u64, index).unwrap();
        }

        match orderer.push(99, 4) {
            Err((Error::ResourceExhausted { .. }, item)) => assert_eq!(item, 99),
            _ => panic!("expected the item to be handed back"),
        }
        assert_eq!(orderer.len().unwrap(), 4);

        drop(orderer);
        assert_eq!(allocator.in_use(), 0);
    }
}
