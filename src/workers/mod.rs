mod worker_thread;

mod ordered_pool;
pub use ordered_pool::OrderedPool;

mod unordered_pool;
pub use unordered_pool::UnorderedPool;

mod pool;
pub use pool::{Delivery, Pool};
