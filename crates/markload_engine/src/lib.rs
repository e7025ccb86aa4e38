//! Markload engine: persisted queue, job submission and polling.
mod activity;
mod api;
mod client;
mod config;
mod error;
mod orchestrator;
mod persist;
mod poller;
mod ready;
mod store;

pub use api::ConversionApi;
pub use client::HttpConversionClient;
pub use config::{ClientSettings, EngineConfig};
pub use error::{EngineError, StatusError, StoreError, SubmitError};
pub use orchestrator::Orchestrator;
pub use persist::{ensure_dir, write_atomically, ArtifactWriter};
pub use poller::{PollHandle, PollOutcome};
pub use ready::ReadyStore;
pub use store::{JsonFileStore, MemoryStore, SharedStore, StateStore};
