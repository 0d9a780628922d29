pub mod allocator;
pub mod buffer_pool;
pub mod frame;
pub mod replacer;

pub use allocator::Allocator;
pub use buffer_pool::BufferPool;
