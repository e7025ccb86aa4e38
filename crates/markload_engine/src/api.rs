use markload_core::{JobReport, QueueItem};

use crate::{StatusError, SubmitError};

/// The conversion service as seen by the queue: submit a job, ask for its status.
#[async_trait::async_trait]
pub trait ConversionApi: Send + Sync {
    /// Starts a remote job for `item` and returns its job identifier.
    async fn submit(&self, item: &QueueItem) -> Result<String, SubmitError>;

    async fn status(&self, job_id: &str) -> Result<JobReport, StatusError>;
}
