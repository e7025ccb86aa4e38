use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use markload_core::{QueueError, QueueState};
use markload_logging::markload_trace;

use crate::persist::write_atomically;
use crate::{EngineError, StoreError};

/// Durable home of the queue document.
pub trait StateStore: Send + Sync {
    fn read(&self) -> Result<QueueState, StoreError>;
    fn write(&self, state: &QueueState) -> Result<(), StoreError>;
}

/// The queue document as one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn read(&self) -> Result<QueueState, StoreError> {
        let content = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(QueueState::default()),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    fn write(&self, state: &QueueState) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(state)?;
        write_atomically(&self.path, &content)
    }
}

/// In-process store. Counts writes so callers can tell whether anything changed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<QueueState>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: QueueState) -> Self {
        Self {
            state: Mutex::new(state),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStore {
    fn read(&self) -> Result<QueueState, StoreError> {
        Ok(lock(&self.state).clone())
    }

    fn write(&self, state: &QueueState) -> Result<(), StoreError> {
        *lock(&self.state) = state.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serializes read-modify-write cycles on a [`StateStore`] within this process.
///
/// Each cycle re-reads the backing document right before mutating it and only
/// writes it back when the mutation changed something.
pub struct SharedStore {
    backend: Arc<dyn StateStore>,
    lock: Mutex<()>,
}

impl SharedStore {
    pub fn new(backend: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    pub fn read(&self) -> Result<QueueState, StoreError> {
        let _guard = lock(&self.lock);
        self.backend.read()
    }

    /// Applies an infallible mutation.
    pub fn modify<T>(&self, mutate: impl FnOnce(&mut QueueState) -> T) -> Result<T, StoreError> {
        self.transact(|state| Ok::<_, StoreError>(mutate(state)))
    }

    /// Applies a mutation that may reject the operation; nothing is written then.
    pub fn update<T>(
        &self,
        mutate: impl FnOnce(&mut QueueState) -> Result<T, QueueError>,
    ) -> Result<T, EngineError> {
        self.transact(|state| mutate(state).map_err(EngineError::from))
    }

    fn transact<T, E>(&self, mutate: impl FnOnce(&mut QueueState) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _guard = lock(&self.lock);
        let mut state = self.backend.read()?;
        let before = state.clone();
        let value = mutate(&mut state)?;
        if state != before {
            self.backend.write(&state)?;
        } else {
            markload_trace!("Queue document unchanged; skipping write");
        }
        Ok(value)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
