use std::io;

use markload_core::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("directory missing or not writable: {0}")]
    Directory(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed queue document: {0}")]
    Format(#[from] serde_json::Error),
}

/// Error returned by the caller-facing queue operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid conversion service url '{0}'")]
    InvalidServiceUrl(String),
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why the conversion service did not accept a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The service answered with a non-success status; carries its message.
    #[error("{0}")]
    Rejected(String),
    #[error("missing job identifier")]
    MissingJobId,
    #[error("network error: {0}")]
    Network(String),
    #[error("cannot read local file: {0}")]
    File(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// The service does not know the job. Terminal.
    #[error("job not found")]
    NotFound,
    /// Anything else; the poller retries with backoff.
    #[error("{0}")]
    Transient(String),
}
