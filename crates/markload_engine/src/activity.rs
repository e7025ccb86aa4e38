use std::sync::Arc;

use tokio::sync::watch;

/// Counts running drain loops and pollers so callers can wait for quiescence.
#[derive(Debug, Clone)]
pub(crate) struct Activity {
    active: Arc<watch::Sender<usize>>,
}

impl Activity {
    pub(crate) fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            active: Arc::new(active),
        }
    }

    /// Marks one unit of work as running until the returned guard is dropped.
    pub(crate) fn enter(&self) -> ActivityGuard {
        self.active.send_modify(|count| *count += 1);
        ActivityGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub(crate) async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

#[derive(Debug)]
pub(crate) struct ActivityGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.active
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}
