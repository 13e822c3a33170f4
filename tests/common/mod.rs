//! Shared test fixtures: a local HTTP origin and instrumented upload sinks.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mediarelay::network::HttpConfig;
use mediarelay::upload::{SizeClass, UploadError, UploadResult, UploadSink};
use mediarelay::{PipelineConfig, TransferManager};

/// `len` bytes of the repeating `0x00..=0xFF` pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

pub fn config(chunk_size: usize, workers: usize, depth: usize, retry_limit: u32) -> PipelineConfig {
    PipelineConfig {
        max_concurrent_streams: 4,
        upload_workers: workers,
        channel_depth: depth,
        chunk_size,
        retry_limit,
        ..Default::default()
    }
}

pub fn manager(config: PipelineConfig) -> TransferManager {
    TransferManager::new(config, HttpConfig::default()).unwrap()
}

// ============== Origin ==============

#[derive(Debug, Clone)]
pub struct OriginOptions {
    pub honour_range: bool,
    pub allow_head: bool,
    pub content_type: &'static str,
    /// `Accept-Ranges` value sent on HEAD.
    pub accept_ranges: &'static str,
    /// Answer every request with this status instead of the body.
    pub fail_status: Option<StatusCode>,
    /// Honour `Range` only when it starts at 0; later ranges get the full body.
    pub range_from_start_only: bool,
    /// Ranges after the first come back as an empty `206`.
    pub empty_after_first_range: bool,
    /// Send `Content-Range: bytes a-b/*`.
    pub hide_total: bool,
}

impl Default for OriginOptions {
    fn default() -> Self {
        Self {
            honour_range: true,
            allow_head: true,
            content_type: "video/mp4",
            accept_ranges: "bytes",
            fail_status: None,
            range_from_start_only: false,
            empty_after_first_range: false,
            hide_total: false,
        }
    }
}

struct OriginState {
    body: Vec<u8>,
    opts: OriginOptions,
    gets: AtomicUsize,
    seen: Mutex<Vec<HeaderMap>>,
}

/// Local HTTP server holding one media body under `/media/{name}`.
pub struct Origin {
    pub addr: SocketAddr,
    state: Arc<OriginState>,
    task: JoinHandle<()>,
}

impl Origin {
    pub async fn start(body: Vec<u8>) -> Self {
        Self::with_options(body, OriginOptions::default()).await
    }

    pub async fn with_options(body: Vec<u8>, opts: OriginOptions) -> Self {
        let state = Arc::new(OriginState {
            body,
            opts,
            gets: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/media/:name", get(serve_get).head(serve_head))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, task }
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/media/{}", self.addr, name)
    }

    pub fn get_count(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }

    /// Headers of every GET received so far.
    pub fn seen_headers(&self) -> Vec<HeaderMap> {
        self.state.seen.lock().clone()
    }
}

impl Drop for Origin {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_head(State(state): State<Arc<OriginState>>) -> Response {
    if !state.opts.allow_head {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if let Some(status) = state.opts.fail_status {
        return status.into_response();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, state.body.len())
        .header(header::CONTENT_TYPE, state.opts.content_type)
        .header(header::ACCEPT_RANGES, state.opts.accept_ranges)
        .body(Body::empty())
        .unwrap()
}

async fn serve_get(State(state): State<Arc<OriginState>>, headers: HeaderMap) -> Response {
    state.gets.fetch_add(1, Ordering::SeqCst);
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);
    state.seen.lock().push(headers);

    if let Some(status) = state.opts.fail_status {
        return status.into_response();
    }

    let len = state.body.len() as u64;
    let opts = &state.opts;
    match range {
        Some((start, _)) if opts.range_from_start_only && start > 0 => full_body(&state),
        Some((start, end)) if opts.honour_range => {
            if start >= len {
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{len}"))
                    .body(Body::empty())
                    .unwrap();
            }
            let end = end.unwrap_or(len - 1).min(len - 1);
            let slice = if opts.empty_after_first_range && start > 0 {
                Vec::new()
            } else {
                state.body[start as usize..=end as usize].to_vec()
            };
            let total = if opts.hide_total {
                "*".to_string()
            } else {
                len.to_string()
            };
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
                .header(header::CONTENT_LENGTH, slice.len())
                .header(header::CONTENT_TYPE, opts.content_type)
                .body(Body::from(slice))
                .unwrap()
        }
        _ => full_body(&state),
    }
}

fn full_body(state: &OriginState) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, state.body.len())
        .header(header::CONTENT_TYPE, state.opts.content_type)
        .body(Body::from(state.body.clone()))
        .unwrap()
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let ranges = value.strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some((start, end))
}

// ============== Sinks ==============

/// Upload sink that stores every acknowledged part in memory.
#[derive(Default)]
pub struct CollectingSink {
    parts: Mutex<BTreeMap<u32, Vec<u8>>>,
    acks: Mutex<HashMap<u32, u32>>,
    failed_once: Mutex<HashSet<u32>>,
    big_totals: Mutex<Vec<(u32, u32)>>,
    pub small_calls: AtomicUsize,
    pub big_calls: AtomicUsize,
    pub attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_first_attempt: bool,
    always_fail: bool,
    fail_part: Option<u32>,
    small_only: bool,
    delay: Option<Duration>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first attempt for every part, then succeed.
    pub fn failing_once() -> Self {
        Self {
            fail_first_attempt: true,
            ..Default::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Default::default()
        }
    }

    /// Reject every attempt at `part`; other parts succeed.
    pub fn failing_part(part: u32) -> Self {
        Self {
            fail_part: Some(part),
            ..Default::default()
        }
    }

    pub fn small_only() -> Self {
        Self {
            small_only: true,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn assembled(&self) -> Vec<u8> {
        self.parts.lock().values().flatten().copied().collect()
    }

    pub fn part_numbers(&self) -> Vec<u32> {
        self.parts.lock().keys().copied().collect()
    }

    pub fn part_sizes(&self) -> Vec<usize> {
        self.parts.lock().values().map(Vec::len).collect()
    }

    /// Successful uploads per part number.
    pub fn ack_counts(&self) -> HashMap<u32, u32> {
        self.acks.lock().clone()
    }

    /// `(part, total_parts)` for every big-file call.
    pub fn big_totals(&self) -> Vec<(u32, u32)> {
        self.big_totals.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.small_calls.load(Ordering::SeqCst) + self.big_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn store(&self, part: u32, bytes: &[u8]) -> UploadResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.store_inner(part, bytes).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn store_inner(&self, part: u32, bytes: &[u8]) -> UploadResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.always_fail || self.fail_part == Some(part) {
            return Err(UploadError::Failed("upload endpoint down".into()));
        }
        if self.fail_first_attempt && self.failed_once.lock().insert(part) {
            return Err(UploadError::Failed(format!("transient failure on part {part}")));
        }

        self.parts.lock().insert(part, bytes.to_vec());
        *self.acks.lock().entry(part).or_insert(0) += 1;
        Ok(())
    }
}

#[async_trait]
impl UploadSink for CollectingSink {
    async fn upload_small(&self, _file_id: i64, part: u32, bytes: &[u8]) -> UploadResult<()> {
        self.small_calls.fetch_add(1, Ordering::SeqCst);
        self.store(part, bytes).await
    }

    async fn upload_big(
        &self,
        _file_id: i64,
        part: u32,
        total_parts: u32,
        bytes: &[u8],
    ) -> UploadResult<()> {
        self.big_calls.fetch_add(1, Ordering::SeqCst);
        self.big_totals.lock().push((part, total_parts));
        self.store(part, bytes).await
    }

    fn supports(&self, class: SizeClass) -> bool {
        !self.small_only || class == SizeClass::Small
    }
}

// ============== Upload API ==============

/// One part received by [`UploadApi`].
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    pub method: String,
    pub query: HashMap<String, String>,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct UploadApiState {
    received: Mutex<Vec<ReceivedPart>>,
    reject_status: Mutex<Option<StatusCode>>,
}

/// Local stand-in for the chat-side part upload endpoint.
pub struct UploadApi {
    pub addr: SocketAddr,
    state: Arc<UploadApiState>,
    task: JoinHandle<()>,
}

impl UploadApi {
    pub async fn start() -> Self {
        let state = Arc::new(UploadApiState::default());
        let app = Router::new()
            .route("/bot/:method", post(receive_part))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, task }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/bot", self.addr)
    }

    pub fn reject_with(&self, status: StatusCode) {
        *self.state.reject_status.lock() = Some(status);
    }

    pub fn received(&self) -> Vec<ReceivedPart> {
        self.state.received.lock().clone()
    }
}

impl Drop for UploadApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn receive_part(
    State(state): State<Arc<UploadApiState>>,
    axum::extract::Path(method): axum::extract::Path<String>,
    axum::extract::Query(query): axum::extract::Query<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> Response {
    if let Some(status) = *state.reject_status.lock() {
        return (status, "FILE_PART_INVALID").into_response();
    }

    state.received.lock().push(ReceivedPart {
        method,
        query,
        bytes: body.to_vec(),
    });
    (StatusCode::OK, "true").into_response()
}
