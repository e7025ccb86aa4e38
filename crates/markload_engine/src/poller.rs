use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use markload_core::{BackoffPolicy, ItemId, JobPhase};
use markload_logging::{markload_debug, markload_error, markload_info, markload_warn};

use crate::activity::Activity;
use crate::store::lock;
use crate::{ConversionApi, ReadyStore, SharedStore, StatusError, StoreError};

/// How a poll task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The artifact moved to the ready list.
    Delivered,
    /// The job failed and the item was marked `error` with this message.
    Failed(String),
    /// The item was removed or retried; nothing was changed.
    Abandoned,
    /// The task stopped on a storage failure or a panic.
    Interrupted(String),
}

/// Cloneable, awaitable handle on one poll task.
pub type PollHandle = Shared<BoxFuture<'static, PollOutcome>>;

pub(crate) struct PollContext {
    pub(crate) store: Arc<SharedStore>,
    pub(crate) ready: ReadyStore,
    pub(crate) api: Arc<dyn ConversionApi>,
    pub(crate) backoff: BackoffPolicy,
}

/// Running poll tasks, keyed by remote job id. At most one task per job.
#[derive(Clone)]
pub(crate) struct PollRegistry {
    context: Arc<PollContext>,
    tasks: Arc<Mutex<HashMap<String, PollHandle>>>,
    activity: Activity,
}

impl PollRegistry {
    pub(crate) fn new(context: PollContext, activity: Activity) -> Self {
        Self {
            context: Arc::new(context),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            activity,
        }
    }

    /// Starts polling `job_id` for `item_id`, or returns the task already doing so.
    pub(crate) fn attach(&self, item_id: ItemId, job_id: &str) -> PollHandle {
        let mut tasks = lock(&self.tasks);
        if let Some(existing) = tasks.get(job_id) {
            markload_debug!("Job {} already has a poller", job_id);
            return existing.clone();
        }

        markload_info!("Polling job {} for item {}", job_id, item_id);
        let guard = self.activity.enter();
        let context = Arc::clone(&self.context);
        let registry = Arc::clone(&self.tasks);
        let key = job_id.to_string();
        // The registry lock is held until the handle is inserted, so the task's
        // own removal below always runs after the insert.
        let join = tokio::spawn(async move {
            let _guard = guard;
            let outcome = poll_until_complete(&context, item_id, &key).await;
            lock(&registry).remove(&key);
            outcome
        });
        let handle = async move {
            join.await
                .unwrap_or_else(|err| PollOutcome::Interrupted(format!("poll task failed: {err}")))
        }
        .boxed()
        .shared();

        tasks.insert(job_id.to_string(), handle.clone());
        handle
    }

    pub(crate) fn is_polling(&self, job_id: &str) -> bool {
        lock(&self.tasks).contains_key(job_id)
    }

    pub(crate) fn active_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<_> = lock(&self.tasks).keys().cloned().collect();
        jobs.sort();
        jobs
    }
}

async fn poll_until_complete(context: &PollContext, item_id: ItemId, job_id: &str) -> PollOutcome {
    match poll_loop(context, item_id, job_id).await {
        Ok(outcome) => outcome,
        Err(err) => {
            markload_error!("Stopped polling job {} for item {}: {}", job_id, item_id, err);
            PollOutcome::Interrupted(err.to_string())
        }
    }
}

async fn poll_loop(
    context: &PollContext,
    item_id: ItemId,
    job_id: &str,
) -> Result<PollOutcome, StoreError> {
    let mut backoff = context.backoff.start();
    loop {
        let tracked = context
            .store
            .read()?
            .item(item_id)
            .is_some_and(|item| item.is_tracking(job_id));
        if !tracked {
            markload_debug!("Item {} no longer waits on job {}", item_id, job_id);
            return Ok(PollOutcome::Abandoned);
        }

        let wait = match context.api.status(job_id).await {
            Ok(report) => match report.phase() {
                JobPhase::Ready(result) => {
                    let moved = context.ready.move_to_ready(item_id, job_id, result)?;
                    return Ok(if moved {
                        PollOutcome::Delivered
                    } else {
                        PollOutcome::Abandoned
                    });
                }
                JobPhase::Failed(message) => {
                    return fail(context, item_id, job_id, message);
                }
                JobPhase::Running(status) => {
                    let recorded = context
                        .store
                        .modify(|state| state.record_job_status(item_id, job_id, &status))?;
                    if !recorded {
                        return Ok(PollOutcome::Abandoned);
                    }
                    backoff.on_success()
                }
            },
            Err(StatusError::NotFound) => {
                return fail(context, item_id, job_id, StatusError::NotFound.to_string());
            }
            Err(StatusError::Transient(reason)) => {
                let wait = backoff.on_failure();
                markload_warn!(
                    "Status request for job {} failed ({}); retrying in {:?}",
                    job_id,
                    reason,
                    wait
                );
                wait
            }
        };

        markload_debug!("Job {} sleeping {:?}", job_id, wait);
        tokio::time::sleep(wait).await;
    }
}

fn fail(
    context: &PollContext,
    item_id: ItemId,
    job_id: &str,
    message: String,
) -> Result<PollOutcome, StoreError> {
    let marked = context
        .store
        .modify(|state| state.fail_job(item_id, job_id, &message))?;
    if !marked {
        return Ok(PollOutcome::Abandoned);
    }
    markload_warn!("Job {} for item {} failed: {}", job_id, item_id, message);
    Ok(PollOutcome::Failed(message))
}
