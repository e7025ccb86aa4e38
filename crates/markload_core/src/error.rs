use thiserror::Error;

use crate::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("queue item {0} not found")]
    NotFound(ItemId),
    #[error("ready item {0} not found")]
    ReadyNotFound(ItemId),
}
