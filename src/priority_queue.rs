//! Priority queue with FIFO ordering inside a priority band.

use std::collections::VecDeque;

use crate::types::{ItemId, Prioritized};

/// Ordered container: priority descending, then arrival ascending.
///
/// The order is kept at all times, so [`PriorityQueue::items`] is already sorted.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    items: VecDeque<T>,
}

impl<T: Prioritized> PriorityQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Insert an item at its sorted position; returns the item back if its id is already queued.
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        if self.contains(item.id()) {
            return Err(item);
        }
        let priority = item.priority();
        let arrival = item.arrival();
        // First slot that should come after the new item.
        let index = self.items.partition_point(|queued| {
            queued.priority() > priority
                || (queued.priority() == priority && queued.arrival() <= arrival)
        });
        self.items.insert(index, item);
        Ok(())
    }

    /// Remove the highest-priority, earliest-arrival item.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.iter().any(|queued| queued.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T: Prioritized + Clone> PriorityQueue<T> {
    /// Copy of the queue contents in order; changing it does not touch the queue.
    pub fn items(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T: Prioritized> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
