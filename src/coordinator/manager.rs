use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::chunk::BufferPool;
use crate::config::{ConfigError, ConfigResult};
use crate::coordinator::types::TransferOutcome;
use crate::metrics::TransferMetrics;
use crate::network::{HttpConfig, TransferRateLimiter};
use crate::pipeline::{PipelineConfig, ProgressFn, TransferPipeline, TransferResult};
use crate::provider::MediaDescriptor;
use crate::registry::TransferRegistry;
use crate::resource::ResourceManager;
use crate::upload::UploadSink;

static TRANSFER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Public entry point: gates, registers and runs transfers.
///
/// Cheap to clone; clones share the slot gate, registry and buffer pool.
#[derive(Clone)]
pub struct TransferManager {
    resources: ResourceManager,
    registry: TransferRegistry,
    pipeline: TransferPipeline,
}

/// Removes the registry entry however `stream` exits, including when its
/// future is dropped mid-flight.
struct RegistryEntry<'a> {
    registry: &'a TransferRegistry,
    id: &'a str,
}

impl Drop for RegistryEntry<'_> {
    fn drop(&mut self) {
        self.registry.delete(self.id);
    }
}

impl TransferManager {
    pub fn new(config: PipelineConfig, http: HttpConfig) -> ConfigResult<Self> {
        config.validate()?;
        let client = http
            .build_client()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(config, http, client))
    }

    /// Use an existing client; `config` is assumed valid.
    pub fn with_client(config: PipelineConfig, http: HttpConfig, client: Client) -> Self {
        let resources = ResourceManager::new(config.max_concurrent_streams);
        let pool = BufferPool::new(config.chunk_size);
        Self {
            resources,
            registry: TransferRegistry::new(),
            pipeline: TransferPipeline::new(client, http, config, pool),
        }
    }

    /// Share a registry with other components that enumerate live transfers.
    pub fn with_registry(mut self, registry: TransferRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: TransferRateLimiter) -> Self {
        self.pipeline = self.pipeline.with_rate_limiter(limiter);
        self
    }

    pub fn registry(&self) -> &TransferRegistry {
        &self.registry
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn pool(&self) -> &BufferPool {
        self.pipeline.pool()
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Relay one descriptor into `sink`.
    ///
    /// Waits for a slot first; cancellation while waiting yields
    /// `ResourceExhausted`. The slot and the registry entry are released on
    /// every exit path.
    pub async fn stream(
        &self,
        cancel: &CancellationToken,
        descriptor: &MediaDescriptor,
        sink: Arc<dyn UploadSink>,
        progress: Option<ProgressFn>,
    ) -> TransferResult<TransferOutcome> {
        let _slot = self.resources.acquire(cancel).await?;

        let transfer_id = new_transfer_id(descriptor.size);
        let file_id = new_file_id();
        let state = self
            .registry
            .new_state(&transfer_id, file_id, descriptor.size);
        let _entry = RegistryEntry {
            registry: &self.registry,
            id: &transfer_id,
        };

        tracing::info!(
            transfer_id = %transfer_id,
            file_id,
            filename = %descriptor.filename,
            size = descriptor.size,
            "transfer started"
        );
        let tracker = TransferMetrics::start(descriptor.size);

        match self
            .pipeline
            .run(cancel, descriptor, state, sink, progress)
            .await
        {
            Ok(output) => {
                tracing::info!(
                    transfer_id = %transfer_id,
                    parts = output.parts,
                    bytes = output.total_size,
                    elapsed_ms = tracker.elapsed().as_millis() as u64,
                    "transfer completed"
                );
                tracker.complete(output.total_size);
                Ok(TransferOutcome {
                    transfer_id: transfer_id.clone(),
                    file_id,
                    parts: output.parts,
                    size_class: output.size_class,
                    checksum: output.checksum,
                    total_size: output.total_size,
                })
            }
            Err(e) => {
                tracing::warn!(transfer_id = %transfer_id, error = %e, "transfer failed");
                tracker.fail(e.kind());
                Err(e)
            }
        }
    }
}

/// Wall-clock nanoseconds plus size, with a process sequence number so two
/// same-size transfers started within one clock tick stay distinct.
fn new_transfer_id(size: u64) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = TRANSFER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{nanos}_{size}_{seq}")
}

fn new_file_id() -> i64 {
    loop {
        let id = rand::random::<i64>();
        if id != 0 {
            return id;
        }
    }
}
