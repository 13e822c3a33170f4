use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Number of `chunk_size` parts needed for `size` bytes.
pub fn parts_for(size: u64, chunk_size: usize) -> u32 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size as u64) as u32
}

/// Mutable bookkeeping for one live transfer.
///
/// All fields sit behind one lock; the lock is never held across an await.
/// `uploaded_parts` only grows. `is_completed` is set by [`mark_completed`]
/// alone, once the pipeline has finished without error.
///
/// [`mark_completed`]: TransferState::mark_completed
pub struct TransferState {
    transfer_id: String,
    file_id: i64,
    inner: Mutex<StateInner>,
}

struct StateInner {
    total_size: u64,
    total_parts: u32,
    /// `total_parts` is final rather than a running estimate.
    parts_final: bool,
    uploaded_parts: BTreeSet<u32>,
    chunk_retries: HashMap<u32, u32>,
    is_completed: bool,
    started_at: DateTime<Utc>,
}

impl TransferState {
    pub fn new(transfer_id: impl Into<String>, file_id: i64, total_size: u64) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            file_id,
            inner: Mutex::new(StateInner {
                total_size,
                total_parts: 0,
                parts_final: false,
                uploaded_parts: BTreeSet::new(),
                chunk_retries: HashMap::new(),
                is_completed: false,
                started_at: Utc::now(),
            }),
        }
    }

    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    pub fn file_id(&self) -> i64 {
        self.file_id
    }

    /// Record a size reported by the origin and fix the part count.
    /// No-op once the count is already final.
    pub fn set_total_size(&self, total_size: u64, chunk_size: usize) {
        let mut inner = self.inner.lock();
        if inner.parts_final {
            return;
        }
        inner.total_size = total_size;
        inner.total_parts = parts_for(total_size, chunk_size);
        inner.parts_final = true;
    }

    /// Seed size and part count from an unverified hint. The count stays an
    /// estimate and still grows with emitted parts.
    pub fn estimate_total_size(&self, total_size: u64, chunk_size: usize) {
        let mut inner = self.inner.lock();
        if inner.parts_final {
            return;
        }
        inner.total_size = total_size;
        inner.total_parts = parts_for(total_size, chunk_size);
    }

    pub fn has_final_parts(&self) -> bool {
        self.inner.lock().parts_final
    }

    /// Note that `part_num` is being emitted and return the current part
    /// estimate. Grows the estimate only while the size is unknown.
    pub fn observe_part(&self, part_num: u32) -> u32 {
        let mut inner = self.inner.lock();
        if !inner.parts_final {
            inner.total_parts = inner.total_parts.max(part_num + 1);
        }
        inner.total_parts
    }

    /// Fix the part count to what was actually emitted.
    pub fn seal_parts(&self, actual_parts: u32) {
        let mut inner = self.inner.lock();
        inner.total_parts = actual_parts;
        inner.parts_final = true;
    }

    /// Mark a part acknowledged. Returns false if it was already recorded.
    pub fn mark_uploaded(&self, part_num: u32) -> bool {
        let mut inner = self.inner.lock();
        let inserted = inner.uploaded_parts.insert(part_num);
        inner.chunk_retries.remove(&part_num);
        inserted
    }

    /// Count a failed attempt for `part_num` and return the running count.
    pub fn record_retry(&self, part_num: u32) -> u32 {
        let mut inner = self.inner.lock();
        let count = inner.chunk_retries.entry(part_num).or_insert(0);
        *count += 1;
        *count
    }

    pub fn mark_completed(&self) {
        self.inner.lock().is_completed = true;
    }

    pub fn total_size(&self) -> u64 {
        self.inner.lock().total_size
    }

    pub fn total_parts(&self) -> u32 {
        self.inner.lock().total_parts
    }

    pub fn uploaded_count(&self) -> usize {
        self.inner.lock().uploaded_parts.len()
    }

    pub fn is_uploaded(&self, part_num: u32) -> bool {
        self.inner.lock().uploaded_parts.contains(&part_num)
    }

    pub fn retries(&self, part_num: u32) -> u32 {
        self.inner
            .lock()
            .chunk_retries
            .get(&part_num)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock().is_completed
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        let inner = self.inner.lock();
        TransferSnapshot {
            transfer_id: self.transfer_id.clone(),
            file_id: self.file_id,
            total_size: inner.total_size,
            total_parts: inner.total_parts,
            uploaded_parts: inner.uploaded_parts.len() as u32,
            pending_retries: inner.chunk_retries.values().sum(),
            is_completed: inner.is_completed,
            started_at: inner.started_at,
        }
    }
}

impl std::fmt::Debug for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferState")
            .field("transfer_id", &self.transfer_id)
            .field("file_id", &self.file_id)
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of a [`TransferState`] for observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferSnapshot {
    pub transfer_id: String,
    pub file_id: i64,
    pub total_size: u64,
    pub total_parts: u32,
    pub uploaded_parts: u32,
    pub pending_retries: u32,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
}

impl TransferSnapshot {
    pub fn progress_percent(&self) -> f32 {
        if self.total_parts == 0 {
            return if self.is_completed { 100.0 } else { 0.0 };
        }
        self.uploaded_parts as f32 / self.total_parts as f32 * 100.0
    }
}
