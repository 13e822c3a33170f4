//! Exponential-backoff wrapper for any [`UploadSink`].
//!
//! The pipeline retries without delay; wrap the sink in a [`BackoffSink`]
//! when the upload endpoint needs spacing between attempts.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::upload::error::UploadResult;
use crate::upload::sink::{SizeClass, UploadSink};

pub struct BackoffSink<S> {
    inner: S,
    initial_interval: Duration,
    max_interval: Duration,
    max_elapsed_time: Option<Duration>,
}

impl<S: UploadSink> BackoffSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(Duration::from_secs(30)),
        }
    }

    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max;
        self
    }

    pub fn with_max_elapsed_time(mut self, max_elapsed_time: Option<Duration>) -> Self {
        self.max_elapsed_time = max_elapsed_time;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn retry<F, Fut>(&self, part: u32, mut op: F) -> UploadResult<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = UploadResult<()>> + Send,
    {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: self.max_elapsed_time,
            ..Default::default()
        };

        loop {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => match backoff.next_backoff() {
                    Some(duration) => {
                        tracing::warn!(
                            part,
                            error = %e,
                            "part upload failed, retrying in {:?}",
                            duration
                        );
                        tokio::time::sleep(duration).await;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}

#[async_trait]
impl<S: UploadSink> UploadSink for BackoffSink<S> {
    async fn upload_small(&self, file_id: i64, part: u32, bytes: &[u8]) -> UploadResult<()> {
        self.retry(part, || self.inner.upload_small(file_id, part, bytes))
            .await
    }

    async fn upload_big(
        &self,
        file_id: i64,
        part: u32,
        total_parts: u32,
        bytes: &[u8],
    ) -> UploadResult<()> {
        self.retry(part, || {
            self.inner.upload_big(file_id, part, total_parts, bytes)
        })
        .await
    }

    fn supports(&self, class: SizeClass) -> bool {
        self.inner.supports(class)
    }
}
