pub mod memory_cache;
pub mod sweeper;

pub use memory_cache::OrderCache;
