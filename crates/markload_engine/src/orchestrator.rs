use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use markload_core::{BackoffPolicy, EnqueueRequest, ItemId, QueueItem, QueueState, ReadyItem};
use markload_logging::{markload_debug, markload_error, markload_info, markload_warn};

use crate::activity::Activity;
use crate::poller::{PollContext, PollHandle, PollRegistry};
use crate::{
    ConversionApi, EngineConfig, EngineError, HttpConversionClient, ReadyStore, SharedStore,
    StateStore, StoreError,
};

/// Owns the persisted queue: accepts requests, submits them one at a time and
/// keeps one poller per remote job until its artifact lands in the ready list.
///
/// Cheap to clone; clones share the same queue, registry and drain flag.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<SharedStore>,
    ready: ReadyStore,
    api: Arc<dyn ConversionApi>,
    pollers: PollRegistry,
    draining: AtomicBool,
    activity: Activity,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        api: Arc<dyn ConversionApi>,
        backoff: BackoffPolicy,
    ) -> Self {
        let store = Arc::new(SharedStore::new(store));
        let ready = ReadyStore::new(Arc::clone(&store));
        let activity = Activity::new();
        let pollers = PollRegistry::new(
            PollContext {
                store: Arc::clone(&store),
                ready: ready.clone(),
                api: Arc::clone(&api),
                backoff,
            },
            activity.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                store,
                ready,
                api,
                pollers,
                draining: AtomicBool::new(false),
                activity,
            }),
        }
    }

    /// Orchestrator talking HTTP to the service described by `config`.
    pub fn from_config(
        store: Arc<dyn StateStore>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let api = HttpConversionClient::new(&config.client)?;
        Ok(Self::new(store, Arc::new(api), config.backoff))
    }

    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<ItemId, EngineError> {
        let id = self.enqueue_deferred(request)?;
        self.trigger_drain();
        Ok(id)
    }

    /// Persists the request as `pending` without starting a drain. The next
    /// [`Orchestrator::drain`] submits it.
    pub fn enqueue_deferred(&self, request: EnqueueRequest) -> Result<ItemId, EngineError> {
        let url = request.url.clone();
        let id = self
            .inner
            .store
            .update(|state| state.enqueue(request, Utc::now()))?;
        markload_info!("Enqueued item {} url={}", id, url);
        Ok(id)
    }

    pub async fn retry(&self, id: ItemId) -> Result<(), EngineError> {
        self.inner.store.update(|state| state.retry(id))?;
        markload_info!("Item {} reset to pending", id);
        self.trigger_drain();
        Ok(())
    }

    /// Deletes a queue item whatever its status. A poller still running for it
    /// notices on its next iteration and stops.
    pub fn remove(&self, id: ItemId) -> Result<QueueItem, EngineError> {
        let item = self.inner.store.update(|state| state.remove(id))?;
        markload_info!("Removed item {} (status {})", id, item.status);
        Ok(item)
    }

    pub fn deliver(&self, id: ItemId) -> Result<ReadyItem, EngineError> {
        self.inner.ready.deliver(id)
    }

    pub fn remove_ready(&self, id: ItemId) -> Result<ReadyItem, EngineError> {
        self.inner.ready.remove_ready(id)
    }

    pub fn snapshot(&self) -> Result<QueueState, StoreError> {
        self.inner.store.read()
    }

    /// Attaches a poller to every item recorded as waiting on a remote job.
    /// Jobs that already have a poller keep it.
    pub async fn resume(&self) -> Result<Vec<PollHandle>, StoreError> {
        let jobs = self.inner.store.read()?.resumable_jobs();
        if !jobs.is_empty() {
            markload_debug!("Resuming {} in-flight job(s)", jobs.len());
        }
        Ok(jobs
            .into_iter()
            .map(|(item_id, job_id)| self.inner.pollers.attach(item_id, &job_id))
            .collect())
    }

    /// Submits pending items oldest first until none are left.
    ///
    /// Only one drain runs at a time; a call made while another is active
    /// returns immediately and the active one picks up the new work.
    pub async fn drain(&self) -> Result<(), EngineError> {
        let Some(mut permit) = DrainPermit::acquire(&self.inner.draining) else {
            markload_debug!("Drain already running");
            return Ok(());
        };
        let _active = self.inner.activity.enter();

        loop {
            self.drain_pending().await?;
            drop(permit);

            // An enqueue that landed after the last pending check saw the flag
            // still set and did not start its own drain.
            if !self.inner.store.read()?.has_pending() {
                return Ok(());
            }
            permit = match DrainPermit::acquire(&self.inner.draining) {
                Some(permit) => permit,
                None => return Ok(()),
            };
            markload_debug!("New pending items appeared; draining again");
        }
    }

    /// Resolves once no drain loop and no poller is running.
    pub async fn wait_idle(&self) {
        self.inner.activity.wait_idle().await;
    }

    pub fn is_polling(&self, job_id: &str) -> bool {
        self.inner.pollers.is_polling(job_id)
    }

    pub fn polling_jobs(&self) -> Vec<String> {
        self.inner.pollers.active_jobs()
    }

    async fn drain_pending(&self) -> Result<(), EngineError> {
        let recovered = self.inner.store.modify(QueueState::reset_interrupted)?;
        if !recovered.is_empty() {
            markload_warn!(
                "Returned interrupted submission(s) {:?} to pending",
                recovered
            );
        }
        self.resume().await?;

        while let Some(item) = self.inner.store.modify(QueueState::claim_next_pending)? {
            self.submit(item).await?;
        }
        Ok(())
    }

    async fn submit(&self, item: QueueItem) -> Result<(), StoreError> {
        markload_info!(
            "Submitting item {} ({}) url={}",
            item.id,
            item.content_type,
            item.url
        );
        match self.inner.api.submit(&item).await {
            Ok(job_id) => {
                let recorded = self
                    .inner
                    .store
                    .modify(|state| state.record_job(item.id, &job_id))?;
                if recorded {
                    let _ = self.inner.pollers.attach(item.id, &job_id);
                } else {
                    markload_warn!(
                        "Item {} changed while job {} was being submitted; not tracking it",
                        item.id,
                        job_id
                    );
                }
            }
            Err(err) => {
                markload_warn!("Submission of item {} failed: {}", item.id, err);
                self.inner
                    .store
                    .modify(|state| state.fail_submission(item.id, &err.to_string()))?;
            }
        }
        Ok(())
    }

    fn trigger_drain(&self) {
        let active = self.inner.activity.enter();
        let this = self.clone();
        tokio::spawn(async move {
            let _active = active;
            if let Err(err) = this.drain().await {
                markload_error!("Queue drain stopped: {}", err);
            }
        });
    }
}

/// Exclusive right to run the drain loop; released on drop.
struct DrainPermit<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainPermit<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for DrainPermit<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
