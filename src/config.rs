//! Process-level configuration, read from `MEDIARELAY_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::network::HttpConfig;
use crate::pipeline::PipelineConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Cannot parse {var}={value}: {reason}")]
    Parse {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub const ENV_PREFIX: &str = "MEDIARELAY_";

#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub pipeline: PipelineConfig,
    pub http: HttpConfig,
    /// Base URL of the part upload API.
    pub upload_endpoint: Option<String>,
    /// Prometheus scrape listener; disabled when unset.
    pub metrics_addr: Option<SocketAddr>,
    /// Origin read budget; 0 disables pacing.
    pub rate_limit_bytes_per_sec: u32,
}

impl RelayConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = RelayConfig::default();

        let pipeline = &mut config.pipeline;
        env.parse_into("MAX_CONCURRENT_STREAMS", &mut pipeline.max_concurrent_streams)?;
        env.parse_into("UPLOAD_WORKERS", &mut pipeline.upload_workers)?;
        env.parse_into("CHANNEL_DEPTH", &mut pipeline.channel_depth)?;
        env.parse_into("CHUNK_SIZE", &mut pipeline.chunk_size)?;
        env.parse_into("RETRY_LIMIT", &mut pipeline.retry_limit)?;
        env.parse_into("SMALL_FILE_THRESHOLD", &mut pipeline.small_file_threshold)?;

        env.parse_into("RANGE_SIZE", &mut config.http.range_size)?;
        env.parse_into("POOL_MAX_IDLE_PER_HOST", &mut config.http.pool_max_idle_per_host)?;
        if let Some(ua) = env.get("USER_AGENT") {
            config.http.user_agent = ua;
        }

        config.upload_endpoint = env.get("UPLOAD_ENDPOINT").filter(|s| !s.is_empty());
        config.metrics_addr = env.parse("METRICS_ADDR")?;
        env.parse_into("RATE_LIMIT", &mut config.rate_limit_bytes_per_sec)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.pipeline.validate()?;
        if self.http.range_size == 0 {
            return Err(ConfigError::Invalid {
                field: "range_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn require_upload_endpoint(&self) -> ConfigResult<&str> {
        self.upload_endpoint
            .as_deref()
            .ok_or(ConfigError::Missing("MEDIARELAY_UPLOAD_ENDPOINT"))
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{key}"))
    }

    fn parse<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Parse {
                    var: format!("{ENV_PREFIX}{key}"),
                    value,
                    reason: e.to_string(),
                }),
        }
    }

    fn parse_into<T>(&self, key: &str, slot: &mut T) -> ConfigResult<()>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(value) = self.parse(key)? {
            *slot = value;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = RelayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.upload_endpoint.is_none());
        assert!(config.metrics_addr.is_none());
        assert_eq!(config.rate_limit_bytes_per_sec, 0);
    }

    #[test]
    fn test_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("MEDIARELAY_UPLOAD_WORKERS", "8"),
            ("MEDIARELAY_CHUNK_SIZE", "1048576"),
            ("MEDIARELAY_RETRY_LIMIT", "0"),
            ("MEDIARELAY_UPLOAD_ENDPOINT", "http://127.0.0.1:8081/bot"),
            ("MEDIARELAY_METRICS_ADDR", "127.0.0.1:9100"),
            ("MEDIARELAY_RATE_LIMIT", "65536"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline.upload_workers, 8);
        assert_eq!(config.pipeline.chunk_size, 1024 * 1024);
        assert_eq!(config.pipeline.retry_limit, 0);
        assert_eq!(
            config.require_upload_endpoint().unwrap(),
            "http://127.0.0.1:8081/bot"
        );
        assert_eq!(config.metrics_addr.map(|a| a.port()), Some(9100));
        assert_eq!(config.rate_limit_bytes_per_sec, 65536);
    }

    #[test]
    fn test_parse_error_names_variable() {
        let err = RelayConfig::from_lookup(lookup(&[("MEDIARELAY_CHANNEL_DEPTH", "deep")]))
            .unwrap_err();
        match err {
            ConfigError::Parse { var, value, .. } => {
                assert_eq!(var, "MEDIARELAY_CHANNEL_DEPTH");
                assert_eq!(value, "deep");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_validation_applies() {
        let err = RelayConfig::from_lookup(lookup(&[("MEDIARELAY_CHUNK_SIZE", "1000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "chunk_size", .. }));

        let missing = RelayConfig::default().require_upload_endpoint().unwrap_err();
        assert_eq!(missing, ConfigError::Missing("MEDIARELAY_UPLOAD_ENDPOINT"));
    }
}
