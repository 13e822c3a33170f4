pub mod pool;
pub mod types;

pub use pool::{BufferPool, PooledBuffer};
pub use types::Chunk;
