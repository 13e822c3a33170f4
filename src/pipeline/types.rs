use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::upload::{SizeClass, DEFAULT_SMALL_FILE_THRESHOLD};

pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Invoked with `(bytes_just_uploaded, total_size)` after each part is
/// acknowledged. `total_size` is 0 while unknown. Must not block.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Static per-manager tuning; never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Process-wide bound on simultaneous transfers.
    pub max_concurrent_streams: usize,
    pub upload_workers: usize,
    /// Chunks queued between the reader and the workers.
    pub channel_depth: usize,
    /// Part size in bytes; a multiple of 1 KiB.
    pub chunk_size: usize,
    /// Extra attempts per part after the first failure.
    pub retry_limit: u32,
    pub small_file_threshold: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: 4,
            upload_workers: 4,
            channel_depth: 8,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_limit: 3,
            small_file_threshold: DEFAULT_SMALL_FILE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_concurrent_streams", self.max_concurrent_streams),
            ("upload_workers", self.upload_workers),
            ("channel_depth", self.channel_depth),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if self.chunk_size == 0 || self.chunk_size % 1024 != 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: format!("{} is not a non-zero multiple of 1 KiB", self.chunk_size),
            });
        }

        Ok(())
    }

    /// Most buffers one transfer can hold at once.
    pub fn max_in_flight_buffers(&self) -> usize {
        self.channel_depth + self.upload_workers + 1
    }

    pub fn size_class(&self, size: Option<u64>) -> SizeClass {
        SizeClass::classify(size, self.small_file_threshold)
    }
}

/// What a successful pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Parts actually emitted and acknowledged.
    pub parts: u32,
    /// MD5 of every emitted byte; present for small or unknown-size transfers.
    pub checksum: Option<[u8; 16]>,
    pub size_class: SizeClass,
    /// Bytes actually relayed.
    pub total_size: u64,
}
