//! Producer/worker fan-out that streams one descriptor into an upload sink.
//!
//! One producer reads the origin in `chunk_size` parts and pushes them into a
//! bounded channel; `upload_workers` workers pull parts and upload them with
//! bounded retry. The channel depth is the only back-pressure: a full channel
//! blocks the producer, which stops draining the origin body.
//!
//! Both sides share one cancel scope. Whoever fails first records its error
//! and cancels the scope; everyone else unwinds, dropping any chunk in hand so
//! its buffer returns to the pool.

use std::sync::Arc;
use std::time::Instant;

use md5::{Digest, Md5};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::chunk::{BufferPool, Chunk};
use crate::metrics;
use crate::network::{ChunkedRangeReader, FetchError, HttpConfig, TransferRateLimiter};
use crate::pipeline::error::{TransferError, TransferResult};
use crate::pipeline::types::{PipelineConfig, PipelineOutput, ProgressFn};
use crate::provider::MediaDescriptor;
use crate::registry::TransferState;
use crate::upload::{upload_chunk, SizeClass, UploadSink};

/// Runs transfers with fixed tuning against a shared client and buffer pool.
#[derive(Clone)]
pub struct TransferPipeline {
    client: Client,
    http: HttpConfig,
    config: PipelineConfig,
    pool: BufferPool,
    limiter: Option<TransferRateLimiter>,
}

/// Everything a producer or worker task needs, shared behind one `Arc`.
struct RunContext {
    state: Arc<TransferState>,
    sink: Arc<dyn UploadSink>,
    progress: Option<ProgressFn>,
    pool: BufferPool,
    size_class: SizeClass,
    retry_limit: u32,
    scope: CancellationToken,
    first_error: Mutex<Option<TransferError>>,
}

struct Produced {
    parts: u32,
    bytes: u64,
    checksum: Option<[u8; 16]>,
}

enum TaskExit {
    Producer(Produced),
    Stopped,
}

impl RunContext {
    /// Keep the first real failure and stop every task.
    fn fail(&self, err: TransferError) {
        if !matches!(err, TransferError::Cancelled) {
            let mut slot = self.first_error.lock();
            if slot.is_none() {
                tracing::warn!(
                    transfer_id = self.state.transfer_id(),
                    error = %err,
                    "transfer failed"
                );
                *slot = Some(err);
            }
        }
        self.scope.cancel();
    }

    fn take_error(&self) -> Option<TransferError> {
        self.first_error.lock().take()
    }
}

impl TransferPipeline {
    pub fn new(client: Client, http: HttpConfig, config: PipelineConfig, pool: BufferPool) -> Self {
        Self {
            client,
            http,
            config,
            pool,
            limiter: None,
        }
    }

    /// Pace origin reads through `limiter`.
    pub fn with_rate_limiter(mut self, limiter: TransferRateLimiter) -> Self {
        self.limiter = limiter.is_enabled().then_some(limiter);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Stream `descriptor` into `sink`, recording progress in `state`.
    ///
    /// Returns once every emitted part is acknowledged, or with the first
    /// fetch/upload error, or `Cancelled` once `cancel` fires. Dropping the
    /// returned future aborts all spawned tasks.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        descriptor: &MediaDescriptor,
        state: Arc<TransferState>,
        sink: Arc<dyn UploadSink>,
        progress: Option<ProgressFn>,
    ) -> TransferResult<PipelineOutput> {
        if descriptor.url.is_empty() {
            return Err(TransferError::InvalidDescriptor(
                "descriptor has an empty URL".to_string(),
            ));
        }

        let scope = cancel.child_token();
        let reader = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(TransferError::Cancelled),
            opened = ChunkedRangeReader::open(
                self.client.clone(),
                &descriptor.url,
                &descriptor.headers,
                &self.http,
            ) => opened.map_err(|e| match e {
                FetchError::InvalidHeader { name, reason } => TransferError::InvalidDescriptor(
                    format!("header {name}: {reason}"),
                ),
                other => other.into(),
            })?,
        };
        let reader = match &self.limiter {
            Some(limiter) => reader.with_rate_limiter(limiter.clone()),
            None => reader,
        };

        // Only the origin may fix the part count; a descriptor size is a guess.
        if let Some(size) = reader.total_size() {
            state.set_total_size(size, self.config.chunk_size);
        } else if let Some(hint) = descriptor.size_hint() {
            state.estimate_total_size(hint, self.config.chunk_size);
        }
        let known_size = reader.total_size().or(descriptor.size_hint());

        let size_class = self.config.size_class(known_size);
        if !sink.supports(size_class) {
            return Err(TransferError::InvalidDescriptor(format!(
                "sink does not accept {size_class:?} uploads ({} bytes)",
                known_size.unwrap_or(0)
            )));
        }
        let with_checksum = size_class == SizeClass::Small || known_size.is_none();

        tracing::debug!(
            transfer_id = state.transfer_id(),
            file_id = state.file_id(),
            size = known_size.unwrap_or(0),
            ?size_class,
            "starting pipeline"
        );

        let ctx = Arc::new(RunContext {
            state: state.clone(),
            sink,
            progress,
            pool: self.pool.clone(),
            size_class,
            retry_limit: self.config.retry_limit,
            scope: scope.clone(),
            first_error: Mutex::new(None),
        });

        let (tx, rx) = mpsc::channel::<Chunk>(self.config.channel_depth.max(1));
        let rx = Arc::new(AsyncMutex::new(rx));
        let mut tasks = JoinSet::new();

        for _ in 0..self.config.upload_workers.max(1) {
            let ctx = ctx.clone();
            let rx = rx.clone();
            tasks.spawn(async move {
                if let Err(e) = upload_worker(&ctx, rx).await {
                    ctx.fail(e);
                }
                TaskExit::Stopped
            });
        }

        {
            let ctx = ctx.clone();
            let chunk_size = self.config.chunk_size;
            tasks.spawn(async move {
                match produce(&ctx, reader, tx, chunk_size, with_checksum).await {
                    Ok(produced) => TaskExit::Producer(produced),
                    Err(e) => {
                        ctx.fail(e);
                        TaskExit::Stopped
                    }
                }
            });
        }

        let mut produced = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskExit::Producer(p)) => produced = Some(p),
                Ok(TaskExit::Stopped) => {}
                Err(e) => ctx.fail(TransferError::Internal(format!("pipeline task died: {e}"))),
            }
        }

        if let Some(err) = ctx.take_error() {
            return Err(err);
        }
        if scope.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let produced = produced.ok_or_else(|| {
            TransferError::Internal("producer exited without a result".to_string())
        })?;

        state.mark_completed();
        tracing::debug!(
            transfer_id = state.transfer_id(),
            parts = produced.parts,
            bytes = produced.bytes,
            "pipeline finished"
        );

        Ok(PipelineOutput {
            parts: produced.parts,
            checksum: produced.checksum,
            size_class,
            total_size: produced.bytes,
        })
    }
}

/// Slice the origin stream into parts. Parts are numbered from 0 in strict
/// ascending order; only the last one may be shorter than `chunk_size`.
async fn produce(
    ctx: &RunContext,
    mut reader: ChunkedRangeReader,
    tx: mpsc::Sender<Chunk>,
    chunk_size: usize,
    with_checksum: bool,
) -> TransferResult<Produced> {
    let mut hasher = with_checksum.then(Md5::new);
    let mut part_num: u32 = 0;
    let mut bytes: u64 = 0;

    loop {
        let mut buffer = ctx.pool.get();
        let n = tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => return Err(TransferError::Cancelled),
            read = reader.read_full(buffer.as_mut_slice()) => read?,
        };
        if n == 0 {
            break;
        }
        buffer.truncate(n);

        if !ctx.state.has_final_parts() {
            if let Some(total) = reader.total_size() {
                ctx.state.set_total_size(total, chunk_size);
            }
        }

        if let Some(hasher) = hasher.as_mut() {
            hasher.update(buffer.as_slice());
        }

        let total_parts = ctx.state.observe_part(part_num);
        let chunk = Chunk::new(part_num, total_parts, buffer);
        part_num += 1;
        bytes += n as u64;

        tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => return Err(TransferError::Cancelled),
            sent = tx.send(chunk) => {
                if sent.is_err() {
                    return Err(TransferError::Cancelled);
                }
            }
        }

        if n < chunk_size {
            break;
        }
    }

    // Closing the channel lets workers drain and exit.
    drop(tx);
    ctx.state.seal_parts(part_num);

    let checksum = hasher.map(|h| {
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&h.finalize());
        digest
    });

    Ok(Produced {
        parts: part_num,
        bytes,
        checksum,
    })
}

async fn upload_worker(
    ctx: &RunContext,
    rx: Arc<AsyncMutex<mpsc::Receiver<Chunk>>>,
) -> TransferResult<()> {
    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => return Err(TransferError::Cancelled),
            next = async { rx.lock().await.recv().await } => next,
        };
        let Some(chunk) = next else {
            return Ok(());
        };

        let started = Instant::now();
        upload_with_retry(ctx, &chunk).await?;

        let size = chunk.size();
        ctx.state.mark_uploaded(chunk.part_num);
        metrics::record_part_uploaded(size, started.elapsed());
        if let Some(progress) = &ctx.progress {
            progress(size as u64, ctx.state.total_size());
        }
    }
}

/// Up to `retry_limit + 1` back-to-back attempts; no delay between them.
async fn upload_with_retry(ctx: &RunContext, chunk: &Chunk) -> TransferResult<()> {
    let file_id = ctx.state.file_id();
    let max_attempts = ctx.retry_limit.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => return Err(TransferError::Cancelled),
            result = upload_chunk(ctx.sink.as_ref(), ctx.size_class, file_id, chunk) => result,
        };

        match result {
            Ok(()) => return Ok(()),
            Err(source) if attempt >= max_attempts => {
                return Err(TransferError::UploadFailed {
                    part: chunk.part_num,
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                let retries = ctx.state.record_retry(chunk.part_num);
                metrics::record_part_retry();
                tracing::warn!(
                    transfer_id = ctx.state.transfer_id(),
                    part = chunk.part_num,
                    retries,
                    error = %e,
                    "part upload failed, retrying"
                );
            }
        }
    }
}
