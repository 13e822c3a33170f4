use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::network::error::{FetchError, FetchResult};

pub const DEFAULT_RANGE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = concat!("mediarelay/", env!("CARGO_PKG_VERSION"));

/// Connection parameters for origin fetches.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bytes requested per `Range` request. Independent of the part size.
    pub range_size: u64,
    pub pool_max_idle_per_host: usize,
    /// Upper bound on waiting for response headers of a single request.
    pub response_header_timeout: Duration,
    pub connect_timeout: Duration,
    /// Sent only when the caller's headers carry no `User-Agent`.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            range_size: DEFAULT_RANGE_SIZE,
            pool_max_idle_per_host: 32,
            response_header_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    /// Build the shared client with a persistent per-host connection pool.
    pub fn build_client(&self) -> FetchResult<reqwest::Client> {
        reqwest::Client::builder()
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))
    }

    /// Convert caller headers verbatim, adding the default user agent if absent.
    pub fn request_headers(&self, headers: &HashMap<String, String>) -> FetchResult<HeaderMap> {
        let mut map = HeaderMap::with_capacity(headers.len() + 1);
        for (name, value) in headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            map.insert(header_name, header_value);
        }

        if !map.contains_key(USER_AGENT) {
            let ua = HeaderValue::from_str(&self.user_agent).map_err(|e| {
                FetchError::InvalidHeader {
                    name: USER_AGENT.to_string(),
                    reason: e.to_string(),
                }
            })?;
            map.insert(USER_AGENT, ua);
        }

        Ok(map)
    }
}

/// What a HEAD request revealed about a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeInfo {
    /// `None` when the origin reported no length or a length of zero.
    pub size: Option<u64>,
    pub content_type: Option<String>,
    /// `Accept-Ranges` as advertised: `bytes` is `Some(true)`, `none` is
    /// `Some(false)`, absent or unrecognised is `None`.
    pub accepts_ranges: Option<bool>,
}
