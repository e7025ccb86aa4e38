//! Markload core: queue data model and pure state transitions.
mod backoff;
mod error;
mod filename;
mod item;
mod report;
mod state;

pub use backoff::{Backoff, BackoffPolicy};
pub use error::QueueError;
pub use filename::{default_filename, ensure_markdown_extension, resolve_filename, safe_filename};
pub use item::{ContentKind, Cookies, EnqueueRequest, ItemId, QueueItem, QueueStatus, ReadyItem};
pub use report::{
    ConversionResult, JobPhase, JobReport, DEFAULT_FAILURE_MESSAGE, EMPTY_ARTIFACT_MESSAGE,
};
pub use state::QueueState;
