pub mod error;
pub mod range_reader;
pub mod rate_limiter;
pub mod types;

pub use error::{FetchError, FetchResult};
pub use range_reader::{probe, ChunkedRangeReader};
pub use rate_limiter::TransferRateLimiter;
pub use types::{HttpConfig, ProbeInfo, DEFAULT_RANGE_SIZE, DEFAULT_USER_AGENT};
