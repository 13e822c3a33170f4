//! Sequential reader over a remote URL, fetched as successive byte ranges.
//!
//! Each range is its own `GET` with `Range: bytes=a-b`. A `206` continues the
//! ranged walk; a `200` means the origin ignored `Range`, so the rest of the
//! resource is consumed from that single body and no further ranges are sent.
//! An origin that advertises `Accept-Ranges: none` gets one plain `GET`.
//! Read failures are not retried here.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{
    HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
};
use reqwest::{Client, Response, StatusCode};

use crate::network::error::{FetchError, FetchResult};
use crate::network::rate_limiter::TransferRateLimiter;
use crate::network::types::{HttpConfig, ProbeInfo};

/// Issue a HEAD request and report size, content type and range support.
pub async fn probe(
    client: &Client,
    url: &str,
    headers: &HashMap<String, String>,
    config: &HttpConfig,
) -> FetchResult<ProbeInfo> {
    let request = client.head(url).headers(config.request_headers(headers)?);
    let response = send_with_timeout(request, 0, config.response_header_timeout).await?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            offset: 0,
            status: response.status().as_u16(),
        });
    }

    let headers = response.headers();
    Ok(ProbeInfo {
        size: header_u64(headers, CONTENT_LENGTH.as_str()).filter(|size| *size > 0),
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        accepts_ranges: headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| match v.trim() {
                v if v.eq_ignore_ascii_case("bytes") => Some(true),
                v if v.eq_ignore_ascii_case("none") => Some(false),
                _ => None,
            }),
    })
}

async fn send_with_timeout(
    request: reqwest::RequestBuilder,
    offset: u64,
    after: Duration,
) -> FetchResult<Response> {
    tokio::time::timeout(after, request.send())
        .await
        .map_err(|_| FetchError::Timeout { offset, after })?
        .map_err(|source| FetchError::Http { offset, source })
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Total length from a `Content-Range: bytes a-b/total` value.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

pub struct ChunkedRangeReader {
    client: Client,
    url: String,
    headers: HeaderMap,
    range_size: u64,
    header_timeout: Duration,

    total: Option<u64>,
    content_type: Option<String>,

    /// Bytes handed to the caller so far; also the next resource position.
    offset: u64,
    body: Option<Response>,
    pending: Bytes,
    range_start: u64,
    range_end: u64,
    range_received: u64,
    /// Bytes still to discard from a full body delivered for a mid-stream range.
    skip: u64,
    full_body: bool,
    /// The probe saw `Accept-Ranges: none`; fetch one plain body instead.
    ranges_refused: bool,
    finished: bool,

    limiter: Option<TransferRateLimiter>,
}

impl ChunkedRangeReader {
    /// Open a reader. The HEAD probe is best-effort: an origin that refuses
    /// HEAD still streams, just with an unknown size.
    pub async fn open(
        client: Client,
        url: &str,
        headers: &HashMap<String, String>,
        config: &HttpConfig,
    ) -> FetchResult<Self> {
        let request_headers = config.request_headers(headers)?;

        let info = match probe(&client, url, headers, config).await {
            Ok(info) => info,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "HEAD probe failed, size unknown");
                ProbeInfo::default()
            }
        };

        Ok(Self {
            client,
            url: url.to_string(),
            headers: request_headers,
            range_size: config.range_size.max(1),
            header_timeout: config.response_header_timeout,
            total: info.size,
            content_type: info.content_type,
            ranges_refused: info.accepts_ranges == Some(false),
            offset: 0,
            body: None,
            pending: Bytes::new(),
            range_start: 0,
            range_end: 0,
            range_received: 0,
            skip: 0,
            full_body: false,
            finished: false,
            limiter: None,
        })
    }

    /// Pace every read through `limiter`.
    pub fn with_rate_limiter(mut self, limiter: TransferRateLimiter) -> Self {
        if limiter.is_enabled() {
            self.limiter = Some(limiter);
        }
        self
    }

    /// Known total size, from the probe or a later `Content-Range`/`Content-Length`.
    pub fn total_size(&self) -> Option<u64> {
        self.total
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the origin ignored `Range` and the reader fell back to one body.
    pub fn is_full_body(&self) -> bool {
        self.full_body
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> FetchResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if !self.pending.is_empty() {
                let n = self.pending.len().min(buf.len());
                let part = self.pending.split_to(n);
                buf[..n].copy_from_slice(&part);
                self.offset += n as u64;
                if let Some(limiter) = &self.limiter {
                    limiter.wait_for_bytes(n).await;
                }
                return Ok(n);
            }

            if self.finished {
                return Ok(0);
            }

            if let Some(response) = self.body.as_mut() {
                let next = response.chunk().await.map_err(|source| FetchError::Http {
                    offset: self.offset,
                    source,
                })?;
                match next {
                    Some(mut bytes) => {
                        self.range_received += bytes.len() as u64;
                        if self.skip > 0 {
                            let discard = self.skip.min(bytes.len() as u64) as usize;
                            bytes = bytes.slice(discard..);
                            self.skip -= discard as u64;
                        }
                        self.pending = bytes;
                    }
                    None => {
                        self.body = None;
                        self.finish_range()?;
                    }
                }
                continue;
            }

            self.start_range().await?;
        }
    }

    /// Fill `buf` completely unless the stream ends first. Returns bytes read.
    pub async fn read_full(&mut self, buf: &mut [u8]) -> FetchResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    async fn start_range(&mut self) -> FetchResult<()> {
        let start = self.offset;
        let mut end = start + self.range_size - 1;
        if let Some(total) = self.total {
            if start >= total {
                self.finished = true;
                return Ok(());
            }
            end = end.min(total - 1);
        }

        let mut request = self.client.get(&self.url).headers(self.headers.clone());
        if !self.ranges_refused {
            request = request.header(RANGE, format!("bytes={start}-{end}"));
        }
        let response = send_with_timeout(request, start, self.header_timeout).await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                if self.total.is_none() {
                    self.total = response
                        .headers()
                        .get(CONTENT_RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_content_range_total);
                }
                self.range_start = start;
                self.range_end = end + 1;
                self.range_received = 0;
                self.body = Some(response);
            }
            StatusCode::OK => {
                tracing::debug!(
                    url = %self.url,
                    offset = start,
                    "origin ignored Range, falling back to a single body"
                );
                if self.total.is_none() {
                    self.total = header_u64(response.headers(), CONTENT_LENGTH.as_str())
                        .filter(|size| *size > 0);
                }
                self.full_body = true;
                self.skip = start;
                self.range_start = 0;
                self.range_received = 0;
                self.body = Some(response);
            }
            StatusCode::RANGE_NOT_SATISFIABLE
                if self.total.map(|total| start >= total).unwrap_or(true) =>
            {
                self.finished = true;
            }
            status => {
                return Err(FetchError::Status {
                    offset: start,
                    status: status.as_u16(),
                });
            }
        }

        Ok(())
    }

    fn finish_range(&mut self) -> FetchResult<()> {
        if self.full_body {
            return match self.total {
                Some(total) if self.offset < total => Err(FetchError::Truncated {
                    offset: self.offset,
                    expected: total,
                }),
                _ => {
                    self.finished = true;
                    Ok(())
                }
            };
        }

        let requested = self.range_end - self.range_start;
        match self.total {
            Some(total) if self.offset >= total => self.finished = true,
            Some(total) if self.range_received == 0 => {
                return Err(FetchError::Truncated {
                    offset: self.offset,
                    expected: total,
                });
            }
            // A short range of an unknown-length resource is its end.
            None if self.range_received < requested => self.finished = true,
            _ => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChunkedRangeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedRangeReader")
            .field("url", &self.url)
            .field("offset", &self.offset)
            .field("total", &self.total)
            .field("full_body", &self.full_body)
            .field("finished", &self.finished)
            .finish()
    }
}
