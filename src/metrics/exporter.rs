//! Prometheus scrape endpoint for relay metrics.

use crate::metrics::recorder::{init_metrics, PART_UPLOAD_DURATION, TRANSFER_DURATION};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Part uploads are sub-second on a healthy endpoint; the tail matters.
const PART_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Whole transfers run from a blink to many minutes.
const TRANSFER_BUCKETS: &[f64] = &[0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0];

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Scrape listener address
    pub listen_addr: SocketAddr,
    /// Attached as a global `instance` label when several relays share a scraper
    pub instance: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            instance: None,
        }
    }
}

impl MetricsConfig {
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    fn builder(&self) -> Result<PrometheusBuilder, MetricsError> {
        let mut builder = PrometheusBuilder::new()
            .with_http_listener(self.listen_addr)
            .set_buckets_for_metric(Matcher::Full(PART_UPLOAD_DURATION.to_string()), PART_BUCKETS)
            .and_then(|b| {
                b.set_buckets_for_metric(
                    Matcher::Full(TRANSFER_DURATION.to_string()),
                    TRANSFER_BUCKETS,
                )
            })
            .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;

        if let Some(instance) = &self.instance {
            builder = builder.add_global_label("instance", instance);
        }
        Ok(builder)
    }
}

/// Install the Prometheus recorder and start its HTTP listener.
///
/// A process holds one recorder; later calls return the installed handle.
pub fn start_metrics_server(
    config: MetricsConfig,
) -> Result<&'static PrometheusHandle, MetricsError> {
    init_metrics();

    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }

    let handle = config
        .builder()?
        .install_recorder()
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;

    tracing::info!(addr = %config.listen_addr, "metrics exporter listening");

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Current exposition text, if the exporter is installed.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to setup metrics: {0}")]
    SetupFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config() {
        let config = MetricsConfig::default();
        assert_eq!(config.listen_addr.port(), 9090);
        assert!(config.instance.is_none());

        let custom =
            MetricsConfig::with_addr("127.0.0.1:9191".parse().unwrap()).with_instance("relay-a");
        assert_eq!(custom.listen_addr.port(), 9191);
        assert_eq!(custom.instance.as_deref(), Some("relay-a"));
    }

    #[test]
    fn test_buckets_are_accepted() {
        assert!(MetricsConfig::default().builder().is_ok());
    }

    #[test]
    fn test_render_before_install() {
        if get_handle().is_none() {
            assert!(render_metrics().is_none());
        }
    }
}
