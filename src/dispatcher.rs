//! Matches queued work to idle workers and reacts to pool and completion events.
//!
//! Every operation that could make a dispatch possible (submission, adding a
//! worker, removing a busy worker, a completion) ends with one call to
//! [`Dispatcher::try_dispatch`]. There is no polling.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::ids::IdAllocator;
use crate::priority_queue::PriorityQueue;
use crate::timers::{TimerHost, Timers, run_until};
use crate::types::{
    ItemId, ItemStatus, Priority, WorkItem, WorkerId, WorkerStatus, millis_u64,
};
use crate::worker::{Worker, WorkerHost};

/// Read-only projection of one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkerView {
    pub id: WorkerId,
    pub status: WorkerStatus,
    pub item: Option<ItemId>,
    pub processing_ms: u64,
}

/// Point-in-time copy of everything a presentation layer needs.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub now_ms: u64,
    pub queued: Vec<WorkItem>,
    pub in_flight: Vec<WorkItem>,
    pub workers: Vec<WorkerView>,
    pub completed: Vec<WorkItem>,
    pub total_submitted: u64,
    pub requeued: u64,
}

impl Snapshot {
    /// Every submitted item is queued, in flight, or completed, exactly once.
    pub fn is_conserved(&self) -> bool {
        let held = self.queued.len() + self.in_flight.len() + self.completed.len();
        held as u64 == self.total_submitted
    }
}

pub struct Dispatcher {
    ids: IdAllocator,
    queue: PriorityQueue<WorkItem>,
    workers: Vec<Worker>,
    completed: Vec<WorkItem>,
    timers: Timers<Dispatcher>,
    processing_time: Duration,
    normal: Priority,
    vip: Priority,
    total_submitted: u64,
    requeued: u64,
}

impl Dispatcher {
    /// Build a dispatcher and its initial workers from config.
    pub fn new(config: &DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self::build(config, config.processing_time()))
    }

    /// Empty pool with the given default processing time. Only zero is rejected.
    pub fn with_processing_time(processing_time: Duration) -> Result<Self, DispatchError> {
        if processing_time.is_zero() {
            return Err(DispatchError::InvalidDuration(processing_time));
        }
        Ok(Self::build(&DispatchConfig::default(), processing_time))
    }

    fn build(config: &DispatchConfig, processing_time: Duration) -> Self {
        let mut dispatcher = Self {
            ids: IdAllocator::new(),
            queue: PriorityQueue::new(),
            workers: Vec::new(),
            completed: Vec::new(),
            timers: Timers::new(),
            processing_time,
            normal: config.normal(),
            vip: config.vip(),
            total_submitted: 0,
            requeued: 0,
        };
        dispatcher.add_workers(config.initial_workers);
        dispatcher
    }

    /// Queue a new item and try to start it.
    pub fn submit(&mut self, priority: Priority) -> ItemId {
        let id = self.ids.next_item();
        let arrival = self.ids.next_arrival();
        let item = WorkItem::new(id, priority, arrival, self.timers.now());
        self.total_submitted += 1;
        debug!(item = id, %priority, "item submitted");
        self.enqueue(item);
        self.try_dispatch();
        id
    }

    pub fn submit_normal(&mut self) -> ItemId {
        self.submit(self.normal)
    }

    pub fn submit_vip(&mut self) -> ItemId {
        self.submit(self.vip)
    }

    /// Append a worker using the default processing time.
    pub fn add_worker(&mut self) -> WorkerId {
        let id = self.ids.next_worker();
        self.push_worker(Worker::new(id, self.processing_time))
    }

    pub fn add_worker_with_duration(
        &mut self,
        processing_time: Duration,
    ) -> Result<WorkerId, DispatchError> {
        if processing_time.is_zero() {
            return Err(DispatchError::InvalidDuration(processing_time));
        }
        let id = self.ids.next_worker();
        Ok(self.push_worker(Worker::new(id, processing_time)))
    }

    /// Add several workers, one dispatch attempt per worker.
    pub fn add_workers(&mut self, count: usize) -> Vec<WorkerId> {
        (0..count).map(|_| self.add_worker()).collect()
    }

    fn push_worker(&mut self, worker: Worker) -> WorkerId {
        let id = worker.id();
        debug!(
            worker = id,
            processing_ms = millis_u64(worker.processing_time()),
            "worker added"
        );
        self.workers.push(worker);
        self.try_dispatch();
        id
    }

    /// Remove the most recently added worker, putting its item back in the queue.
    pub fn remove_worker(&mut self) -> Option<WorkerId> {
        let mut worker = self.workers.pop()?;
        // Copy the item out before stop() discards it.
        let salvaged = worker.current_item().cloned();
        worker.stop(&mut self.timers);
        if let Some(item) = salvaged {
            info!(
                worker = worker.id(),
                item = item.id,
                "busy worker removed; requeueing item"
            );
            self.requeued += 1;
            self.enqueue(item);
        } else {
            debug!(worker = worker.id(), "idle worker removed");
        }
        self.try_dispatch();
        Some(worker.id())
    }

    fn enqueue(&mut self, item: WorkItem) {
        if let Err(item) = self.queue.enqueue(item) {
            error!(item = item.id, "item already queued; dropping duplicate");
        }
    }

    /// Give the front item to the first idle worker in pool order. At most one item per call.
    pub fn try_dispatch(&mut self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        let Some(index) = self.workers.iter().position(|w| !w.is_busy()) else {
            return false;
        };
        let Some(item) = self.queue.dequeue() else {
            return false;
        };
        let worker = &mut self.workers[index];
        let (worker_id, item_id) = (worker.id(), item.id);
        match worker.assign(item, &mut self.timers, Dispatcher::on_item_complete) {
            Ok(()) => {
                debug!(worker = worker_id, item = item_id, "item dispatched");
                true
            }
            Err(item) => {
                error!(worker = worker_id, item = item_id, "idle worker refused item");
                self.enqueue(item);
                false
            }
        }
    }

    /// Completion hook handed to every worker.
    pub fn on_item_complete(&mut self, mut item: WorkItem, worker: WorkerId) {
        item.status = ItemStatus::Completed;
        item.completed_at = Some(self.timers.now());
        debug!(worker, item = item.id, "item completed");
        self.completed.push(item);
        self.try_dispatch();
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Move the clock forward by `by`, firing completions on the way.
    pub fn advance(&mut self, by: Duration) -> usize {
        let deadline = self.timers.now().saturating_add(by);
        run_until(self, deadline)
    }

    pub fn advance_to(&mut self, t: Duration) -> usize {
        run_until(self, t)
    }

    /// Deadline of the next pending completion.
    pub fn next_completion(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Fire completions until no work is in flight.
    pub fn run_until_idle(&mut self) -> usize {
        let mut fired = 0;
        while let Some(deadline) = self.timers.next_deadline() {
            fired += run_until(self, deadline);
        }
        fired
    }

    /// Queued items in dispatch order.
    pub fn pending_items(&self) -> Vec<WorkItem> {
        self.queue.items()
    }

    /// Items currently held by busy workers, in pool order.
    pub fn in_flight_items(&self) -> Vec<WorkItem> {
        self.workers
            .iter()
            .filter_map(|w| w.current_item().cloned())
            .collect()
    }

    pub fn idle_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|w| !w.is_busy())
            .map(Worker::id)
            .collect()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn completed_items(&self) -> &[WorkItem] {
        &self.completed
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn total_submitted(&self) -> u64 {
        self.total_submitted
    }

    pub fn requeued_count(&self) -> u64 {
        self.requeued
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            now_ms: millis_u64(self.timers.now()),
            queued: self.pending_items(),
            in_flight: self.in_flight_items(),
            workers: self
                .workers
                .iter()
                .map(|w| WorkerView {
                    id: w.id(),
                    status: w.status(),
                    item: w.current_item().map(|i| i.id),
                    processing_ms: millis_u64(w.processing_time()),
                })
                .collect(),
            completed: self.completed.clone(),
            total_submitted: self.total_submitted,
            requeued: self.requeued,
        }
    }
}

impl TimerHost for Dispatcher {
    fn timers_mut(&mut self) -> &mut Timers<Self> {
        &mut self.timers
    }
}

impl WorkerHost for Dispatcher {
    fn worker_mut(&mut self, id: WorkerId) -> Option<&mut Worker> {
        self.workers.iter_mut().find(|w| w.id() == id)
    }
}
