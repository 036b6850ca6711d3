//! Priority order dispatch to a resizable pool of single-task workers.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod priority_queue;
pub mod service;
pub mod sim;
pub mod timers;
pub mod types;
pub mod worker;

pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, Snapshot, WorkerView};
pub use error::DispatchError;
pub use priority_queue::PriorityQueue;
pub use service::DispatchService;
pub use types::{Arrival, ItemId, ItemStatus, Priority, WorkItem, WorkerId, WorkerStatus};
pub use worker::Worker;
