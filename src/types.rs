//! Shared identifiers and the work item model used across the dispatcher.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Unique identifier for a work item.
pub type ItemId = u64;
/// Unique identifier for a worker in the pool.
pub type WorkerId = u64;

/// Logical arrival stamp captured when an item is constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Arrival(pub u64);

/// Caller-supplied priority; higher values are served first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Priority(pub i64);

impl Priority {
    /// Tier used for regular orders.
    pub const NORMAL: Priority = Priority(1);
    /// Tier used for VIP orders.
    pub const VIP: Priority = Priority(50);
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state tracked on the item itself. In-flight is implied by a worker owning it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Completed,
}

/// Occupancy state of a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
}

/// Anything the priority queue can order.
pub trait Prioritized {
    fn id(&self) -> ItemId;
    fn priority(&self) -> Priority;
    fn arrival(&self) -> Arrival;
}

/// Unit of work dispatched to workers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    /// Stable identifier for logging and validation.
    pub id: ItemId,
    pub priority: Priority,
    pub status: ItemStatus,
    /// Tie-break among equal priorities; never changes, even across a requeue.
    pub arrival: Arrival,
    /// Virtual time of submission.
    #[serde(with = "millis")]
    pub submitted_at: Duration,
    /// Virtual time the owning worker finished it.
    #[serde(with = "opt_millis")]
    pub completed_at: Option<Duration>,
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn millis_u64(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}

impl WorkItem {
    /// Construct a pending item.
    pub fn new(id: ItemId, priority: Priority, arrival: Arrival, submitted_at: Duration) -> Self {
        Self {
            id,
            priority,
            status: ItemStatus::Pending,
            arrival,
            submitted_at,
            completed_at: None,
        }
    }
}

impl Prioritized for WorkItem {
    fn id(&self) -> ItemId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn arrival(&self) -> Arrival {
        self.arrival
    }
}

pub(crate) mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::millis_u64(*value))
    }
}

pub(crate) mod opt_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&super::millis_u64(*value)),
            None => serializer.serialize_none(),
        }
    }
}
