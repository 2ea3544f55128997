use std::sync::PoisonError;

use crate::queue::Index;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the semaphore, the queues and the pools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-blocking call found nothing to take.
    #[error("operation would block")]
    Busy,

    /// The deadline of a timed call elapsed before anything was taken.
    #[error("timed out")]
    Timeout,

    /// The allocator refused to grow a container. The container is left unchanged.
    #[error("allocator refused to provide {requested} bytes")]
    ResourceExhausted { requested: usize },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker thread {worker} panicked")]
    Join { worker: usize },

    /// A mutex or condition variable was poisoned. The protected structure can no longer be trusted.
    #[error("synchronization primitive poisoned")]
    Poisoned,

    #[error("queue contents no longer match its permit count")]
    Corrupted,

    #[error("queue has been shut down")]
    ShutDown,

    #[error("min_index {requested} is lower than the previously requested {floor}")]
    OrderViolation { requested: Index, floor: Index },

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("task has not been executed")]
    Incomplete,

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Returns true for [`Error::Busy`] and [`Error::Timeout`].
    /// Both leave the queried structure untouched and may simply be retried.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Busy | Error::Timeout)
    }

    /// Returns true for spawn, join and primitive failures.
    /// The calling thread should escalate these instead of retrying.
    pub fn is_thread_error(&self) -> bool {
        matches!(
            self,
            Error::Spawn(_) | Error::Join { .. } | Error::Poisoned | Error::Corrupted
        )
    }

    /// Returns true for contract violations by the caller.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::ShutDown | Error::OrderViolation { .. })
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::Poisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::Busy.is_would_block());
        assert!(Error::Timeout.is_would_block());
        assert!(!Error::Poisoned.is_would_block());

        assert!(Error::Poisoned.is_thread_error());
        assert!(Error::Corrupted.is_thread_error());
        assert!(Error::Join { worker: 3 }.is_thread_error());
        assert!(!Error::ShutDown.is_thread_error());

        assert!(Error::ShutDown.is_usage_error());
        assert!(Error::OrderViolation { requested: 1, floor: 4 }.is_usage_error());
        assert!(!Error::ResourceExhausted { requested: 64 }.is_usage_error());
    }

    #[test]
    fn test_poison_conversion() {
        let mutex = std::sync::Mutex::new(0);
        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = mutex.lock().unwrap();
                panic!("poison the mutex");
            })
            .join()
        });
        let err: Error = mutex.lock().unwrap_err().into();
        assert!(matches!(err, Error::Poisoned));
    }
}
