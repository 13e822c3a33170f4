use std::sync::Arc;

use dashmap::DashMap;

use crate::registry::types::{TransferSnapshot, TransferState};

/// Concurrent map of live transfers, keyed by transfer id.
///
/// Entries are observational: the pipeline owns the state it mutates, and the
/// transfer manager removes the entry when the pipeline exits.
#[derive(Clone, Default)]
pub struct TransferRegistry {
    states: Arc<DashMap<String, Arc<TransferState>>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new transfer. An existing entry under the same id is replaced.
    pub fn new_state(&self, id: &str, file_id: i64, total_size: u64) -> Arc<TransferState> {
        let state = Arc::new(TransferState::new(id, file_id, total_size));
        self.states.insert(id.to_string(), state.clone());
        state
    }

    pub fn get(&self, id: &str) -> Option<Arc<TransferState>> {
        self.states.get(id).map(|entry| entry.value().clone())
    }

    /// Remove an entry. Deleting a missing id is a no-op.
    pub fn delete(&self, id: &str) -> bool {
        self.states.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.states.iter().map(|e| e.key().clone()).collect()
    }

    pub fn snapshots(&self) -> Vec<TransferSnapshot> {
        self.states.iter().map(|e| e.value().snapshot()).collect()
    }
}

impl std::fmt::Debug for TransferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferRegistry")
            .field("live", &self.states.len())
            .finish()
    }
}
