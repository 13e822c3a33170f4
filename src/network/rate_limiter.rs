//! Read pacing for origin fetches using the governor crate

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Byte-budget limiter applied to reads from the range reader.
///
/// Budget is tracked in 1 KiB units so large reads do not exceed governor's
/// per-call capacity.
#[derive(Clone)]
pub struct TransferRateLimiter {
    bytes_limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    burst_kb: u32,
}

impl TransferRateLimiter {
    /// Create a limiter for `bytes_per_second` (0 = unlimited)
    pub fn new(bytes_per_second: u32) -> Self {
        if bytes_per_second == 0 {
            return Self::unlimited();
        }

        let kb_per_second =
            NonZeroU32::new((bytes_per_second / 1024).max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            bytes_limiter: Some(Arc::new(RateLimiter::direct(Quota::per_second(
                kb_per_second,
            )))),
            burst_kb: kb_per_second.get(),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            bytes_limiter: None,
            burst_kb: 0,
        }
    }

    /// Wait until we're allowed to hand out the specified number of bytes
    pub async fn wait_for_bytes(&self, bytes: usize) {
        let Some(limiter) = &self.bytes_limiter else {
            return;
        };

        let mut remaining = (bytes.div_ceil(1024)).max(1) as u32;
        while remaining > 0 {
            let step = remaining.min(self.burst_kb);
            if let Some(n) = NonZeroU32::new(step) {
                // `step` never exceeds the burst size, so capacity is always sufficient.
                let _ = limiter.until_n_ready(n).await;
            }
            remaining -= step;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bytes_limiter.is_some()
    }
}

impl Default for TransferRateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl std::fmt::Debug for TransferRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferRateLimiter")
            .field("enabled", &self.is_enabled())
            .field("burst_kb", &self.burst_kb)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_unlimited_rate_limiter() {
        let limiter = TransferRateLimiter::unlimited();

        assert!(!limiter.is_enabled());

        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait_for_bytes(1024 * 1024).await;
        }
        assert!(start.elapsed().as_millis() < 100);
    }

    #[tokio::test]
    async fn test_zero_means_unlimited() {
        assert!(!TransferRateLimiter::new(0).is_enabled());
    }

    #[tokio::test]
    async fn test_rate_limited_bytes() {
        // 64 KiB per second, burst 64 KiB
        let limiter = TransferRateLimiter::new(64 * 1024);
        assert!(limiter.is_enabled());

        let start = Instant::now();
        // First 64 KiB ride the burst, the next 32 KiB need roughly half a second.
        limiter.wait_for_bytes(64 * 1024).await;
        limiter.wait_for_bytes(32 * 1024).await;
        let elapsed = start.elapsed();

        assert!(elapsed.as_millis() >= 300, "limiter did not pace: {elapsed:?}");
        assert!(elapsed.as_millis() < 5000, "limiter took too long");
    }

    #[tokio::test]
    async fn test_reads_larger_than_burst_complete() {
        // 1 KiB/s is the smallest budget; a 2 KiB read spans two bursts.
        let limiter = TransferRateLimiter::new(1024);
        let start = Instant::now();
        limiter.wait_for_bytes(2048).await;
        assert!(start.elapsed().as_millis() < 5000);
    }
}
