//! Monotonic counters for item ids, worker ids, and arrival stamps.

use crate::types::{Arrival, ItemId, WorkerId};

/// Per-dispatcher id source. Counters start at 1 and never go backwards.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next_item: ItemId,
    next_worker: WorkerId,
    next_arrival: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_item: 1,
            next_worker: 1,
            next_arrival: 1,
        }
    }

    pub fn next_item(&mut self) -> ItemId {
        let id = self.next_item;
        self.next_item += 1;
        id
    }

    pub fn next_worker(&mut self) -> WorkerId {
        let id = self.next_worker;
        self.next_worker += 1;
        id
    }

    pub fn next_arrival(&mut self) -> Arrival {
        let stamp = self.next_arrival;
        self.next_arrival += 1;
        Arrival(stamp)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_item(), 1);
        assert_eq!(ids.next_item(), 2);
        assert_eq!(ids.next_worker(), 1);
        assert_eq!(ids.next_arrival(), Arrival(1));
        assert_eq!(ids.next_item(), 3);
    }

    #[test]
    fn separate_allocators_do_not_share_state() {
        let mut first = IdAllocator::new();
        first.next_worker();
        first.next_worker();
        let mut second = IdAllocator::new();
        assert_eq!(second.next_worker(), 1);
    }
}
