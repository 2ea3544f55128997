//! Pluggable allocators.
//!
//! The containers behind [`crate::queue::TaskQueue`] and [`crate::queue::TaskOrderer`]
//! grow by doubling. Every growth step is charged to the allocator the container
//! was created with and released again when the container is dropped.
//! An allocator that refuses a request makes the pushing call fail with
//! [`Error::ResourceExhausted`] without touching the container.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::error::{Error, Result};

/// Shared handle to an allocator.
pub type AllocatorRef = Arc<dyn Allocator>;

/// Accounts for the memory of growable containers, in bytes.
pub trait Allocator: Send + Sync + Debug {
    /// Request `bytes` more bytes.
    fn allocate(&self, bytes: usize) -> Result<()>;

    /// Return `bytes` bytes previously granted by [`Allocator::allocate`].
    fn deallocate(&self, bytes: usize);

    /// Resize a grant from `old_bytes` to `new_bytes`.
    /// Shrinking always succeeds.
    fn reallocate(&self, old_bytes: usize, new_bytes: usize) -> Result<()> {
        if new_bytes >= old_bytes {
            self.allocate(new_bytes - old_bytes)
        } else {
            self.deallocate(old_bytes - new_bytes);
            Ok(())
        }
    }
}

/// The platform default. Grants every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, _bytes: usize) -> Result<()> {
        Ok(())
    }

    fn deallocate(&self, _bytes: usize) {}
}

/// An allocator with a fixed limit. Requests beyond the limit are refused.
#[derive(Debug)]
pub struct BoundedAllocator {
    limit: usize,
    in_use: AtomicUsize,
}

impl BoundedAllocator {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: AtomicUsize::new(0),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently granted.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }
}

impl Allocator for BoundedAllocator {
    fn allocate(&self, bytes: usize) -> Result<()> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| {
                in_use
                    .checked_add(bytes)
                    .filter(|&total| total <= self.limit)
            })
            .map(|_| ())
            .map_err(|_| Error::ResourceExhausted { requested: bytes })
    }

    fn deallocate(&self, bytes: usize) {
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| {
                Some(in_use.saturating_sub(bytes))
            });
    }
}

/// The allocator used when none is given.
pub fn system() -> AllocatorRef {
    Arc::new(SystemAllocator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocator() {
        let allocator = SystemAllocator;
        assert!(allocator.allocate(usize::MAX).is_ok());
        assert!(allocator.reallocate(16, 1 << 40).is_ok());
        allocator.deallocate(16);
    }

    #[test]
    fn test_bounded_allocator() {
        let allocator = BoundedAllocator::new(100);
        assert!(allocator.allocate(60).is_ok());
        assert_eq!(allocator.in_use(), 60);

        assert!(matches!(
            allocator.allocate(41),
            Err(Error::ResourceExhausted { requested: 41 })
        ));
        assert_eq!(allocator.in_use(), 60);

        assert!(allocator.reallocate(60, 100).is_ok());
        assert_eq!(allocator.in_use(), 100);

        assert!(allocator.reallocate(100, 30).is_ok());
        assert_eq!(allocator.in_use(), 30);

        allocator.deallocate(30);
        assert_eq!(allocator.in_use(), 0);
    }

    #[test]
    fn test_bounded_allocator_overflow() {
        let allocator = BoundedAllocator::new(usize::MAX);
        assert!(allocator.allocate(usize::MAX).is_ok());
        assert!(allocator.allocate(1).is_err());
    }
}
