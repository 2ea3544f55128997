use std::thread::{self, available_parallelism};

use crate::{
    alloc::{self, AllocatorRef},
    error::{Error, Result},
};

const MAX_THREADS: usize = 1024;

/// Settings shared by all pool types.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub num_threads: usize,
    /// Worker threads are named `<prefix>-<id>`.
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    /// Allocator charged for queue growth. `None` means [`alloc::SystemAllocator`].
    pub allocator: Option<AllocatorRef>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: default_num_threads(),
            thread_name_prefix: "task-pool-worker".to_string(),
            stack_size: None,
            allocator: None,
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::config("num_threads must be > 0"));
        }
        if self.num_threads > MAX_THREADS {
            return Err(Error::config(format!(
                "num_threads too large (max {MAX_THREADS})"
            )));
        }
        if self.stack_size == Some(0) {
            return Err(Error::config("stack_size must be > 0"));
        }
        Ok(())
    }

    pub fn allocator(&self) -> AllocatorRef {
        self.allocator.clone().unwrap_or_else(alloc::system)
    }

    pub(crate) fn thread_builder(&self, id: usize) -> thread::Builder {
        let builder = thread::Builder::new().name(format!("{}-{}", self.thread_name_prefix, id));
        match self.stack_size {
            Some(stack_size) => builder.stack_size(stack_size),
            None => builder,
        }
    }
}

/// The number of available logical cores minus one, but at least one.
pub fn default_num_threads() -> usize {
    available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = n;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn allocator(mut self, allocator: AllocatorRef) -> Self {
        self.config.allocator = Some(allocator);
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
