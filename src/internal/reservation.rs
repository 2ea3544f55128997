use std::{collections::TryReserveError, mem::size_of};

use crate::{
    alloc::AllocatorRef,
    error::{Error, Result},
};

const MIN_CAPACITY: usize = 4;

/// Capacity of a growable container as charged to its allocator.
///
/// Grows by doubling and never shrinks. The whole charge is returned on drop.
pub struct Reservation {
    allocator: AllocatorRef,
    slot_size: usize,
    capacity: usize,
}

impl Reservation {
    pub fn new<T>(allocator: AllocatorRef) -> Self {
        Self {
            allocator,
            slot_size: size_of::<T>(),
            capacity: 0,
        }
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Make room for one more element in a container currently holding `len` elements.
    /// `grow` receives the number of additional slots to reserve in the real container.
    pub fn reserve_one(
        &mut self,
        len: usize,
        grow: impl FnOnce(usize) -> std::result::Result<(), TryReserveError>,
    ) -> Result<()> {
        self.reserve_for(len.saturating_add(1), len, grow)
    }

    /// Make room for `count` elements, growing by at least doubling.
    pub fn reserve_for(
        &mut self,
        count: usize,
        len: usize,
        grow: impl FnOnce(usize) -> std::result::Result<(), TryReserveError>,
    ) -> Result<()> {
        if count <= self.capacity {
            return Ok(());
        }
        let capacity = self
            .capacity
            .saturating_mul(2)
            .max(count)
            .max(MIN_CAPACITY);
        self.grow_to(capacity, len, grow)
    }

    /// Make room for at least `capacity` elements.
    pub fn reserve_exact(
        &mut self,
        capacity: usize,
        len: usize,
        grow: impl FnOnce(usize) -> std::result::Result<(), TryReserveError>,
    ) -> Result<()> {
        if capacity <= self.capacity {
            return Ok(());
        }
        self.grow_to(capacity, len, grow)
    }

    fn grow_to(
        &mut self,
        capacity: usize,
        len: usize,
        grow: impl FnOnce(usize) -> std::result::Result<(), TryReserveError>,
    ) -> Result<()> {
        let old_bytes = self.bytes(self.capacity)?;
        let new_bytes = self.bytes(capacity)?;
        self.allocator.reallocate(old_bytes, new_bytes)?;

        if grow(capacity.saturating_sub(len)).is_err() {
            self.allocator.deallocate(new_bytes - old_bytes);
            return Err(Error::ResourceExhausted {
                requested: new_bytes - old_bytes,
            });
        }
        self.capacity = capacity;
        Ok(())
    }

    fn bytes(&self, capacity: usize) -> Result<usize> {
        capacity
            .checked_mul(self.slot_size)
            .ok_or(Error::ResourceExhausted {
                requested: usize::MAX,
            })
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.allocator.deallocate(self.capacity * self.slot_size);
    }
}
