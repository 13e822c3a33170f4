//! Metrics and observability module
//!
//! Prometheus-compatible metrics for relay transfers:
//! - Transfers started, completed and failed
//! - Parts uploaded, part retries and bytes relayed
//! - Active transfer count

pub mod exporter;
pub mod recorder;

pub use exporter::{render_metrics, start_metrics_server, MetricsConfig, MetricsError};
pub use recorder::{init_metrics, record_part_retry, record_part_uploaded, TransferMetrics};
