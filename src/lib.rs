//! Streaming media relay core.
//!
//! Fetches a remote media object in byte ranges and uploads it as fixed-size
//! parts through a bounded producer/worker pipeline, without ever holding the
//! whole body in memory.

pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod network;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod upload;

pub use config::{ConfigError, RelayConfig};
pub use coordinator::{TransferManager, TransferOutcome};
pub use pipeline::{PipelineConfig, ProgressFn, TransferError, TransferResult};
pub use provider::{MediaDescriptor, ProviderRegistry, ResolveOptions};
pub use upload::{FinishedMedia, SizeClass, UploadSink};
