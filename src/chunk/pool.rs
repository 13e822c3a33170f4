//! Reusable fixed-size part buffers.
//!
//! Every buffer handed out by [`BufferPool::get`] has length and capacity of
//! exactly `chunk_size`. Buffers come back automatically when the
//! [`PooledBuffer`] guard is dropped, so a worker that bails out on
//! cancellation still returns its buffer.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct PoolInner {
    chunk_size: usize,
    idle: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
}

/// Thread-safe bag of `chunk_size` byte buffers.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                chunk_size,
                idle: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.chunk_size
    }

    /// Borrow a buffer, allocating a fresh one if none is idle.
    pub fn get(&self) -> PooledBuffer {
        let chunk_size = self.inner.chunk_size;
        let mut buf = self
            .inner
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(chunk_size));
        buf.resize(chunk_size, 0);

        let now = self.inner.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);

        PooledBuffer {
            buf: Some(buf),
            len: chunk_size,
            pool: self.clone(),
        }
    }

    /// Offer a buffer to the pool. Buffers smaller than `chunk_size` are
    /// dropped; returns whether the buffer was kept.
    pub fn put(&self, mut buf: Vec<u8>) -> bool {
        if buf.capacity() < self.inner.chunk_size {
            return false;
        }
        buf.clear();
        self.inner.idle.lock().push(buf);
        true
    }

    /// Buffers currently checked out.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously checked-out buffers seen so far.
    pub fn peak_outstanding(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    pub fn reset_peak(&self) {
        self.inner
            .peak
            .store(self.outstanding(), Ordering::Release);
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    fn release(&self, buf: Vec<u8>) {
        self.inner.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.put(buf);
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("chunk_size", &self.inner.chunk_size)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// `as_mut_slice` exposes the whole `chunk_size` region for filling;
/// `truncate` then marks how much of it holds data.
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    len: usize,
    pool: BufferPool,
}

impl PooledBuffer {
    pub fn as_slice(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[..self.len],
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.buf {
            Some(buf) => &mut buf[..],
            None => &mut [],
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.as_ref().map(Vec::capacity).unwrap_or(0)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}
