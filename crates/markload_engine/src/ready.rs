use std::sync::Arc;

use chrono::Utc;
use markload_core::{ConversionResult, ItemId, ReadyItem};
use markload_logging::markload_info;

use crate::{EngineError, SharedStore, StoreError};

/// Hand-off point between finished jobs and the consumer that downloads them.
#[derive(Clone)]
pub struct ReadyStore {
    store: Arc<SharedStore>,
}

impl ReadyStore {
    pub fn new(store: Arc<SharedStore>) -> Self {
        Self { store }
    }

    /// Moves the item waiting on `job_id` into the ready list. Returns false when
    /// the item is gone or no longer tracks that job.
    pub fn move_to_ready(
        &self,
        item_id: ItemId,
        job_id: &str,
        result: ConversionResult,
    ) -> Result<bool, StoreError> {
        let moved = self
            .store
            .modify(|state| state.complete_job(item_id, job_id, result, Utc::now()))?;
        if moved {
            markload_info!("Item {} is ready for download (job {})", item_id, job_id);
        }
        Ok(moved)
    }

    /// Returns the artifact and removes it; later calls for the same id fail.
    pub fn deliver(&self, id: ItemId) -> Result<ReadyItem, EngineError> {
        let item = self.store.update(|state| state.take_ready(id))?;
        markload_info!("Delivered item {} as {}", id, item.filename);
        Ok(item)
    }

    pub fn remove_ready(&self, id: ItemId) -> Result<ReadyItem, EngineError> {
        let item = self.store.update(|state| state.remove_ready(id))?;
        markload_info!("Discarded ready item {}", id);
        Ok(item)
    }
}
