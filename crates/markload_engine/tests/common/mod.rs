#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::Utc;
use markload_core::{BackoffPolicy, EnqueueRequest, ItemId, JobReport, QueueItem, QueueState};
use markload_engine::{
    ConversionApi, MemoryStore, Orchestrator, StateStore, StatusError, StoreError, SubmitError,
};
use tokio::time::Instant;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(markload_logging::initialize_for_tests);
}

pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        initial: Duration::from_millis(20),
        increment: Duration::from_millis(10),
        max: Duration::from_millis(50),
    }
}

/// Conversion service fake driven by per-call scripts. A job without scripted
/// statuses keeps reporting `processing`.
#[derive(Default)]
pub struct ScriptedApi {
    job_ids: Mutex<VecDeque<Result<String, SubmitError>>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<JobReport, StatusError>>>>,
    submitted: Mutex<Vec<ItemId>>,
    status_calls: Mutex<HashMap<String, Vec<Instant>>>,
    submit_delay: Duration,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn push_job_id(&self, result: Result<&str, SubmitError>) {
        self.job_ids
            .lock()
            .unwrap()
            .push_back(result.map(ToOwned::to_owned));
    }

    pub fn push_status(&self, job_id: &str, result: Result<JobReport, StatusError>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn submitted(&self) -> Vec<ItemId> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.status_times(job_id).len()
    }

    /// When each status request for `job_id` arrived, on the tokio clock.
    pub fn status_times(&self, job_id: &str) -> Vec<Instant> {
        self.status_calls
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ConversionApi for ScriptedApi {
    async fn submit(&self, item: &QueueItem) -> Result<String, SubmitError> {
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.submitted.lock().unwrap().push(item.id);
        self.job_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SubmitError::Rejected("no scripted job id".to_string())))
    }

    async fn status(&self, job_id: &str) -> Result<JobReport, StatusError> {
        self.status_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push(Instant::now());
        self.statuses
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(JobReport::new("processing")))
    }
}

/// In-memory store whose reads or writes can be switched to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub fn with_state(state: QueueState) -> Self {
        Self {
            inner: MemoryStore::with_state(state),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The document as last written, bypassing the failure switches.
    pub fn contents(&self) -> QueueState {
        self.inner.read().unwrap()
    }
}

impl StateStore for FailingStore {
    fn read(&self) -> Result<QueueState, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other("disk unreadable")));
        }
        self.inner.read()
    }

    fn write(&self, state: &QueueState) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other("disk full")));
        }
        self.inner.write(state)
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub api: Arc<ScriptedApi>,
    pub store: Arc<MemoryStore>,
}

pub fn harness(api: ScriptedApi, state: QueueState) -> Harness {
    init_logging();
    let api = Arc::new(api);
    let store = Arc::new(MemoryStore::with_state(state));
    let orchestrator = Orchestrator::new(store.clone(), api.clone(), fast_backoff());
    Harness {
        orchestrator,
        api,
        store,
    }
}

/// A queue document with one item already submitted as `job_id`.
pub fn state_with_job(url: &str, job_id: &str) -> (QueueState, ItemId) {
    let mut state = QueueState::new();
    let id = state.enqueue(EnqueueRequest::new(url), Utc::now()).unwrap();
    state.begin_submission(id).unwrap();
    assert!(state.record_job(id, job_id));
    (state, id)
}

pub fn state_with_pending(urls: &[&str]) -> (QueueState, Vec<ItemId>) {
    let mut state = QueueState::new();
    let ids = urls
        .iter()
        .map(|url| state.enqueue(EnqueueRequest::new(*url), Utc::now()).unwrap())
        .collect();
    (state, ids)
}

/// Polls `check` until it holds, failing the test after two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

pub async fn settle(orchestrator: &Orchestrator) {
    tokio::time::timeout(Duration::from_secs(5), orchestrator.wait_idle())
        .await
        .expect("orchestrator did not become idle");
}
