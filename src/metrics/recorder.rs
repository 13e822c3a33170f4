//! Metrics recorder for relay transfers
//!
//! Records throughput, retry and failure metrics for streamed transfers.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

pub(crate) const PART_UPLOAD_DURATION: &str = "mediarelay_part_upload_duration_seconds";
pub(crate) const TRANSFER_DURATION: &str = "mediarelay_transfer_duration_seconds";

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!(
        "mediarelay_transfers_started_total",
        "Total number of transfers started"
    );
    describe_counter!(
        "mediarelay_transfers_completed_total",
        "Total number of transfers completed successfully"
    );
    describe_counter!(
        "mediarelay_transfers_failed_total",
        "Total number of transfers that failed or were cancelled"
    );
    describe_counter!(
        "mediarelay_parts_uploaded_total",
        "Total number of parts acknowledged by the upload sink"
    );
    describe_counter!(
        "mediarelay_part_retries_total",
        "Total number of failed part upload attempts that were retried"
    );
    describe_counter!("mediarelay_bytes_relayed_total", "Total bytes uploaded");

    describe_gauge!(
        "mediarelay_active_transfers",
        "Number of transfers currently holding a slot"
    );

    describe_histogram!(
        PART_UPLOAD_DURATION,
        "Time to upload a single part, retries included"
    );
    describe_histogram!(TRANSFER_DURATION, "Total transfer duration");
    describe_histogram!(
        "mediarelay_transfer_size_bytes",
        "Declared size of transfers with a known length"
    );
    describe_histogram!(
        "mediarelay_throughput_bytes_per_second",
        "Transfer throughput in bytes per second"
    );
}

// ============== Part Operations ==============

pub fn record_part_uploaded(bytes: usize, duration: Duration) {
    counter!("mediarelay_parts_uploaded_total").increment(1);
    counter!("mediarelay_bytes_relayed_total").increment(bytes as u64);
    histogram!(PART_UPLOAD_DURATION).record(duration.as_secs_f64());
}

pub fn record_part_retry() {
    counter!("mediarelay_part_retries_total").increment(1);
}

// ============== Transfer Operations ==============

pub fn record_transfer_started(size_hint: u64) {
    counter!("mediarelay_transfers_started_total").increment(1);
    gauge!("mediarelay_active_transfers").increment(1.0);
    if size_hint > 0 {
        histogram!("mediarelay_transfer_size_bytes").record(size_hint as f64);
    }
}

pub fn record_transfer_complete(duration: Duration, bytes_transferred: u64) {
    counter!("mediarelay_transfers_completed_total").increment(1);
    gauge!("mediarelay_active_transfers").decrement(1.0);

    histogram!(TRANSFER_DURATION).record(duration.as_secs_f64());
    histogram!("mediarelay_throughput_bytes_per_second")
        .record(throughput(bytes_transferred, duration));
}

/// `reason` must be a low-cardinality kind, never a transfer id.
pub fn record_transfer_failed(reason: &'static str) {
    counter!("mediarelay_transfers_failed_total", "reason" => reason).increment(1);
    gauge!("mediarelay_active_transfers").decrement(1.0);
}

fn throughput(bytes: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

/// Tracks one transfer from slot acquisition to exit.
///
/// Dropping an unfinished tracker counts the transfer as cancelled, so an
/// aborted `stream` future still balances the active gauge.
pub struct TransferMetrics {
    start_time: Instant,
    finished: bool,
}

impl TransferMetrics {
    pub fn start(size_hint: u64) -> Self {
        record_transfer_started(size_hint);
        Self {
            start_time: Instant::now(),
            finished: false,
        }
    }

    pub fn complete(mut self, bytes_transferred: u64) {
        self.finished = true;
        record_transfer_complete(self.start_time.elapsed(), bytes_transferred);
    }

    pub fn fail(mut self, reason: &'static str) {
        self.finished = true;
        record_transfer_failed(reason);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Drop for TransferMetrics {
    fn drop(&mut self) {
        if !self.finished {
            record_transfer_failed("cancelled");
        }
    }
}
