pub mod error;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod types;

pub use error::{TransferError, TransferResult};
pub use pipeline::TransferPipeline;
pub use types::{PipelineConfig, PipelineOutput, ProgressFn, DEFAULT_CHUNK_SIZE};
