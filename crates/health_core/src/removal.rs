use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// Deferred removals ordered by fire time. Entries sharing a fire time come
/// out in the order they were scheduled.
#[derive(Debug)]
pub struct RemovalQueue<H> {
    heap: BinaryHeap<Reverse<Pending<H>>>,
    next_seq: u64,
}

#[derive(Debug)]
struct Pending<H> {
    fire_at: Duration,
    seq: u64,
    handle: H,
}

impl<H> PartialEq for Pending<H> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<H> Eq for Pending<H> {}

impl<H> PartialOrd for Pending<H> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<H> Ord for Pending<H> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then(self.seq.cmp(&other.seq))
    }
}

impl<H> RemovalQueue<H> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn schedule(&mut self, handle: H, fire_at: Duration) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Pending {
            fire_at,
            seq,
            handle,
        }));
    }

    /// Pops every entry whose fire time is at or before `now`.
    pub fn drain_due(&mut self, now: Duration) -> Vec<H> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(pending)| pending.fire_at <= now)
        {
            if let Some(Reverse(pending)) = self.heap.pop() {
                due.push(pending.handle);
            }
        }
        due
    }

    pub fn next_fire_time(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(pending)| pending.fire_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<H> Default for RemovalQueue<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_only_due_entries_in_time_order() {
        let mut queue = RemovalQueue::new();
        queue.schedule("late", Duration::from_secs(5));
        queue.schedule("early", Duration::from_millis(3500));
        queue.schedule("tied", Duration::from_millis(3500));

        assert!(queue.drain_due(Duration::from_secs(1)).is_empty());
        assert_eq!(
            vec!["early", "tied"],
            queue.drain_due(Duration::from_millis(3500))
        );
        assert_eq!(Some(Duration::from_secs(5)), queue.next_fire_time());
        assert_eq!(vec!["late"], queue.drain_due(Duration::from_secs(60)));
        assert!(queue.is_empty());
    }
}
