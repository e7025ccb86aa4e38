use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filename::{ensure_markdown_extension, resolve_filename};
use crate::{
    ConversionResult, EnqueueRequest, ItemId, QueueError, QueueItem, QueueStatus, ReadyItem,
};

/// The whole persisted document: work still queued and artifacts awaiting delivery.
///
/// Every mutation is a plain method so that callers can run it inside a single
/// read-modify-write of the backing store. Methods touching a remote job take
/// the job id they were started for, and do nothing once the item no longer
/// tracks that job (removed, retried, or already finished).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(default)]
    pub queue: Vec<QueueItem>,
    #[serde(default)]
    pub ready: Vec<ReadyItem>,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&self, id: ItemId) -> Option<&QueueItem> {
        self.queue.iter().find(|item| item.id == id)
    }

    pub fn ready_item(&self, id: ItemId) -> Option<&ReadyItem> {
        self.ready.iter().find(|item| item.id == id)
    }

    pub fn enqueue(
        &mut self,
        request: EnqueueRequest,
        now: DateTime<Utc>,
    ) -> Result<ItemId, QueueError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(QueueError::Validation("url is required".to_string()));
        }
        if request.kind.is_file_backed() && request.file_path.is_none() {
            return Err(QueueError::Validation(format!(
                "{} requests need a local file",
                request.kind
            )));
        }

        let id = self.next_id(now)?;
        let filename = resolve_filename(request.filename.as_deref(), url);
        self.queue.push(QueueItem {
            id,
            url: url.to_string(),
            content_type: request.kind,
            cookies: request.cookies,
            html: request.html,
            file_path: request.file_path,
            filename,
            status: QueueStatus::Pending,
            job_id: None,
            job_status: None,
            error: None,
            added_at: now,
        });
        Ok(id)
    }

    /// Puts an item back to `pending` and forgets its remote job. An item that
    /// was not already pending moves to the back of the queue.
    pub fn retry(&mut self, id: ItemId) -> Result<(), QueueError> {
        let index = self
            .queue
            .iter()
            .position(|item| item.id == id)
            .ok_or(QueueError::NotFound(id))?;
        let mut item = self.queue.remove(index);
        let requeue = item.status != QueueStatus::Pending;
        item.status = QueueStatus::Pending;
        item.job_id = None;
        item.job_status = None;
        item.error = None;
        if requeue {
            self.queue.push(item);
        } else {
            self.queue.insert(index, item);
        }
        Ok(())
    }

    pub fn remove(&mut self, id: ItemId) -> Result<QueueItem, QueueError> {
        let index = self
            .queue
            .iter()
            .position(|item| item.id == id)
            .ok_or(QueueError::NotFound(id))?;
        Ok(self.queue.remove(index))
    }

    /// Oldest pending item; the queue is kept in the order items became pending.
    pub fn next_pending(&self) -> Option<&QueueItem> {
        self.queue
            .iter()
            .find(|item| item.status == QueueStatus::Pending)
    }

    pub fn has_pending(&self) -> bool {
        self.next_pending().is_some()
    }

    /// Claims a pending item for submission.
    pub fn begin_submission(&mut self, id: ItemId) -> Option<QueueItem> {
        let item = self
            .queue
            .iter_mut()
            .find(|item| item.id == id && item.status == QueueStatus::Pending)?;
        item.status = QueueStatus::Processing;
        item.job_status = None;
        item.error = None;
        Some(item.clone())
    }

    /// Claims the oldest pending item in the same step that finds it.
    pub fn claim_next_pending(&mut self) -> Option<QueueItem> {
        let id = self.next_pending()?.id;
        self.begin_submission(id)
    }

    /// Attaches the remote job id to an item still waiting on its submission.
    pub fn record_job(&mut self, id: ItemId, job_id: &str) -> bool {
        match self.awaiting_submission(id) {
            Some(item) => {
                item.job_id = Some(job_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn fail_submission(&mut self, id: ItemId, message: &str) -> bool {
        match self.awaiting_submission(id) {
            Some(item) => {
                item.status = QueueStatus::Error;
                item.error = Some(message.to_string());
                true
            }
            None => false,
        }
    }

    pub fn record_job_status(&mut self, id: ItemId, job_id: &str, status: &str) -> bool {
        match self.tracking_mut(id, job_id) {
            Some(item) => {
                item.job_status = Some(status.to_string());
                true
            }
            None => false,
        }
    }

    pub fn fail_job(&mut self, id: ItemId, job_id: &str, message: &str) -> bool {
        match self.tracking_mut(id, job_id) {
            Some(item) => {
                item.status = QueueStatus::Error;
                item.error = Some(message.to_string());
                true
            }
            None => false,
        }
    }

    /// Moves a finished item from the queue to the ready list in one step.
    pub fn complete_job(
        &mut self,
        id: ItemId,
        job_id: &str,
        result: ConversionResult,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(index) = self
            .queue
            .iter()
            .position(|item| item.id == id && item.is_tracking(job_id))
        else {
            return false;
        };
        let item = self.queue.remove(index);
        let filename = result
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ensure_markdown_extension)
            .unwrap_or(item.filename);
        self.ready.retain(|ready| ready.id != id);
        self.ready.push(ReadyItem {
            id,
            url: item.url,
            filename,
            markdown: result.markdown,
            completed_at: now,
        });
        true
    }

    /// Removes and returns a ready item; a second call for the same id fails.
    pub fn take_ready(&mut self, id: ItemId) -> Result<ReadyItem, QueueError> {
        let index = self
            .ready
            .iter()
            .position(|item| item.id == id)
            .ok_or(QueueError::ReadyNotFound(id))?;
        Ok(self.ready.remove(index))
    }

    pub fn remove_ready(&mut self, id: ItemId) -> Result<ReadyItem, QueueError> {
        self.take_ready(id)
    }

    /// Items recorded as waiting on a remote job, as `(item id, job id)`.
    pub fn resumable_jobs(&self) -> Vec<(ItemId, String)> {
        self.queue
            .iter()
            .filter(|item| item.status == QueueStatus::Processing)
            .filter_map(|item| item.job_id.clone().map(|job_id| (item.id, job_id)))
            .collect()
    }

    /// Returns items whose submission was interrupted (processing without a job id)
    /// to `pending`.
    pub fn reset_interrupted(&mut self) -> Vec<ItemId> {
        self.queue
            .iter_mut()
            .filter(|item| item.status == QueueStatus::Processing && item.job_id.is_none())
            .map(|item| {
                item.status = QueueStatus::Pending;
                item.job_status = None;
                item.id
            })
            .collect()
    }

    fn awaiting_submission(&mut self, id: ItemId) -> Option<&mut QueueItem> {
        self.queue.iter_mut().find(|item| {
            item.id == id && item.status == QueueStatus::Processing && item.job_id.is_none()
        })
    }

    fn tracking_mut(&mut self, id: ItemId, job_id: &str) -> Option<&mut QueueItem> {
        self.queue
            .iter_mut()
            .find(|item| item.id == id && item.is_tracking(job_id))
    }

    fn next_id(&self, now: DateTime<Utc>) -> Result<ItemId, QueueError> {
        let highest = self
            .queue
            .iter()
            .map(|item| item.id)
            .chain(self.ready.iter().map(|item| item.id))
            .max();
        let clock = now.timestamp_millis().max(0) as ItemId;
        match highest {
            Some(highest) => highest
                .checked_add(1)
                .map(|next| clock.max(next))
                .ok_or_else(|| QueueError::Validation("no item ids left".to_string())),
            None => Ok(clock),
        }
    }
}
