//! Single-task worker with a fixed processing time.

use std::time::Duration;

use tracing::debug;

use crate::timers::{TimerId, Timers};
use crate::types::{WorkItem, WorkerId, WorkerStatus};

/// Processing time used when none is configured.
pub const DEFAULT_PROCESSING_TIME: Duration = Duration::from_secs(10);

/// Owner of workers that timer callbacks can reach back into.
pub trait WorkerHost {
    fn worker_mut(&mut self, id: WorkerId) -> Option<&mut Worker>;
}

/// Holds at most one item; `current`, `Busy`, and `pending_timer` are always set together.
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    status: WorkerStatus,
    current: Option<WorkItem>,
    processing_time: Duration,
    pending_timer: Option<TimerId>,
}

impl Worker {
    pub fn new(id: WorkerId, processing_time: Duration) -> Self {
        Self {
            id,
            status: WorkerStatus::Idle,
            current: None,
            processing_time,
            pending_timer: None,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn is_busy(&self) -> bool {
        self.status == WorkerStatus::Busy
    }

    pub fn current_item(&self) -> Option<&WorkItem> {
        self.current.as_ref()
    }

    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending_timer
    }

    /// Start working on `item` and schedule its completion.
    ///
    /// A busy worker keeps its current item and hands `item` straight back.
    /// When the timer fires the worker is cleared to idle *before*
    /// `on_complete` runs, so the callback may assign it new work.
    pub fn assign<C, F>(
        &mut self,
        item: WorkItem,
        timers: &mut Timers<C>,
        on_complete: F,
    ) -> Result<(), WorkItem>
    where
        C: WorkerHost + 'static,
        F: FnOnce(&mut C, WorkItem, WorkerId) + 'static,
    {
        if self.is_busy() {
            return Err(item);
        }
        let worker_id = self.id;
        debug!(worker = worker_id, item = item.id, "worker assigned");
        self.status = WorkerStatus::Busy;
        self.current = Some(item);
        let timer = timers.schedule(self.processing_time, move |host: &mut C, timer| {
            let finished = host
                .worker_mut(worker_id)
                .and_then(|worker| worker.finish(timer));
            if let Some(item) = finished {
                on_complete(host, item, worker_id);
            }
        });
        self.pending_timer = Some(timer);
        Ok(())
    }

    /// Timer fired: release the item and go idle. Ignores timers this worker no longer owns.
    fn finish(&mut self, timer: TimerId) -> Option<WorkItem> {
        if self.pending_timer != Some(timer) {
            return None;
        }
        let item = self.current.take();
        self.status = WorkerStatus::Idle;
        self.pending_timer = None;
        item
    }

    /// Cancel any pending completion and drop the current item.
    ///
    /// Callers that want to keep the item must copy it out first.
    pub fn stop<C>(&mut self, timers: &mut Timers<C>) {
        if let Some(timer) = self.pending_timer.take() {
            timers.cancel(timer);
        }
        self.status = WorkerStatus::Idle;
        self.current = None;
    }
}
