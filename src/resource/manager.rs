use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::resource::error::{ResourceError, ResourceResult};

/// Process-wide gate bounding the number of concurrent transfers.
#[derive(Clone)]
pub struct ResourceManager {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ResourceManager {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot or for `cancel` to fire, whichever comes first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> ResourceResult<ResourceSlot> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ResourceError::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => permit
                .map(ResourceSlot::new)
                .map_err(|_| ResourceError::Closed),
        }
    }

    pub fn try_acquire(&self) -> Option<ResourceSlot> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(ResourceSlot::new)
    }

    /// Slots currently held.
    pub fn active_count(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("capacity", &self.capacity)
            .field("active", &self.active_count())
            .finish()
    }
}

/// A held transfer slot. Released on drop or by an explicit [`release`](Self::release);
/// releasing twice is a no-op.
#[derive(Debug)]
pub struct ResourceSlot {
    permit: Option<OwnedSemaphorePermit>,
}

impl ResourceSlot {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self {
            permit: Some(permit),
        }
    }

    pub fn release(&mut self) {
        self.permit.take();
    }

    pub fn is_held(&self) -> bool {
        self.permit.is_some()
    }
}
