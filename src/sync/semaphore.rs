use std::{
    ops::{Deref, DerefMut},
    sync::{Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::error::{Error, Result};

struct Permits<T> {
    count: usize,
    value: T,
}

/// A counting semaphore built from a [`Mutex`] and a [`Condvar`].
///
/// The mutex also protects a value of type `T`. The compound operations
/// ([`Semaphore::post_and_lock`], [`Semaphore::wait_and_lock`], ...) change the
/// count and hand back a [`SemaphoreGuard`] that keeps the mutex locked, so the
/// caller can mutate the value in the same critical section as the count change.
/// A queue built this way never exposes a state where the count and its
/// contents disagree.
///
/// ## Example
/// ```rust
/// use task_pool::sync::Semaphore;
///
/// let semaphore = Semaphore::with_value(0, Vec::new());
///
/// semaphore.post_and_lock().unwrap().push(7);
///
/// let mut items = semaphore.wait_and_lock().unwrap();
/// assert_eq!(items.pop(), Some(7));
/// ```
pub struct Semaphore<T = ()> {
    permits: Mutex<Permits<T>>,
    condvar: Condvar,
}

/// The locked value of a [`Semaphore`]. The mutex is released when the guard is dropped.
pub struct SemaphoreGuard<'a, T> {
    permits: MutexGuard<'a, Permits<T>>,
}

impl Semaphore<()> {
    pub fn new(count: usize) -> Semaphore<()> {
        Semaphore::with_value(count, ())
    }
}

impl<T> Semaphore<T> {
    pub fn with_value(count: usize, value: T) -> Semaphore<T> {
        Semaphore {
            permits: Mutex::new(Permits { count, value }),
            condvar: Condvar::new(),
        }
    }

    /// Current number of permits.
    pub fn count(&self) -> Result<usize> {
        Ok(self.lock_permits()?.count)
    }

    /// Lock the protected value without changing the count.
    pub fn lock(&self) -> Result<SemaphoreGuard<'_, T>> {
        let permits = self.lock_permits()?;
        Ok(SemaphoreGuard { permits })
    }

    /// Add a permit and wake one waiter.
    pub fn post(&self) -> Result<()> {
        self.post_and_lock().map(drop)
    }

    /// Take a permit, blocking until one is available.
    pub fn wait(&self) -> Result<()> {
        self.wait_and_lock().map(drop)
    }

    /// Take a permit if one is available, otherwise return [`Error::Busy`].
    pub fn try_wait(&self) -> Result<()> {
        self.try_wait_and_lock().map(drop)
    }

    /// Take a permit, blocking until one is available or `deadline` has passed.
    /// Returns [`Error::Timeout`] without taking a permit if the deadline passes first.
    pub fn timed_wait(&self, deadline: Instant) -> Result<()> {
        self.timed_wait_and_lock(deadline).map(drop)
    }

    /// Like [`Semaphore::timed_wait`] with a deadline `timeout` from now.
    /// A timeout too large to be represented as a deadline blocks like [`Semaphore::wait`].
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        self.wait_timeout_and_lock(timeout).map(drop)
    }

    /// Add a permit, wake one waiter and return with the mutex still held.
    /// The woken waiter can not observe the value until the guard is dropped.
    pub fn post_and_lock(&self) -> Result<SemaphoreGuard<'_, T>> {
        let mut permits = self.lock_permits()?;
        permits.count += 1;
        self.condvar.notify_one();
        Ok(SemaphoreGuard { permits })
    }

    /// Take a permit, blocking until one is available, and return with the mutex still held.
    pub fn wait_and_lock(&self) -> Result<SemaphoreGuard<'_, T>> {
        let mut permits = self.lock_permits()?;
        while permits.count == 0 {
            permits = self.condvar.wait(permits)?;
        }
        permits.count -= 1;
        Ok(SemaphoreGuard { permits })
    }

    /// Take a permit if one is available and return with the mutex still held.
    /// Returns [`Error::Busy`] and releases the mutex otherwise.
    pub fn try_wait_and_lock(&self) -> Result<SemaphoreGuard<'_, T>> {
        let mut permits = self.lock_permits()?;
        if permits.count == 0 {
            return Err(Error::Busy);
        }
        permits.count -= 1;
        Ok(SemaphoreGuard { permits })
    }

    /// Take a permit, blocking until one is available or `deadline` has passed,
    /// and return with the mutex still held.
    pub fn timed_wait_and_lock(&self, deadline: Instant) -> Result<SemaphoreGuard<'_, T>> {
        let mut permits = self.lock_permits()?;
        while permits.count == 0 {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (guard, _) = self.condvar.wait_timeout(permits, deadline - now)?;
            permits = guard;
        }
        permits.count -= 1;
        Ok(SemaphoreGuard { permits })
    }

    /// Like [`Semaphore::timed_wait_and_lock`] with a deadline `timeout` from now.
    pub fn wait_timeout_and_lock(&self, timeout: Duration) -> Result<SemaphoreGuard<'_, T>> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.timed_wait_and_lock(deadline),
            None => self.wait_and_lock(),
        }
    }

    /// Wake every waiter without adding a permit. Waiters re-check the count,
    /// or fail with [`Error::Poisoned`] if the mutex has been poisoned.
    pub(crate) fn wake_all(&self) {
        self.condvar.notify_all();
    }

    pub fn into_inner(self) -> Result<T> {
        Ok(self.permits.into_inner()?.value)
    }

    fn lock_permits(&self) -> Result<MutexGuard<'_, Permits<T>>> {
        Ok(self.permits.lock()?)
    }
}

impl<T: Default> Default for Semaphore<T> {
    fn default() -> Self {
        Semaphore::with_value(0, T::default())
    }
}

impl<'a, T> SemaphoreGuard<'a, T> {
    /// Undo the permit added by [`Semaphore::post_and_lock`].
    ///
    /// Used when the mutation that should accompany the post fails. A waiter that
    /// was already woken re-checks the count after the guard is dropped and goes
    /// back to sleep.
    pub fn revert_post(&mut self) {
        self.permits.count = self.permits.count.saturating_sub(1);
    }

    /// Number of permits left after the operation that produced this guard.
    pub fn count(&self) -> usize {
        self.permits.count
    }
}

impl<'a, T> Deref for SemaphoreGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.permits.value
    }
}

impl<'a, T> DerefMut for SemaphoreGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.permits.value
    }
}
