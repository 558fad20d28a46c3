//! Bounded queues used by the event log

use serde::{Deserialize, Serialize};
use shared::AuditEntry;
use std::collections::VecDeque;

/// Audit entry waiting for confirmed remote delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEntry {
    pub entry: AuditEntry,
    /// Number of times the backend rejected this entry
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedEntry {
    pub fn new(entry: AuditEntry) -> Self {
        Self { entry, attempts: 0 }
    }
}

/// Push onto the back, evicting from the front past `cap`.
///
/// Returns the number of evicted items.
pub fn push_bounded<T>(items: &mut VecDeque<T>, item: T, cap: usize) -> usize {
    items.push_back(item);
    trim_front(items, cap)
}

/// Drop the oldest items until at most `cap` remain
pub fn trim_front<T>(items: &mut VecDeque<T>, cap: usize) -> usize {
    let excess = items.len().saturating_sub(cap);
    items.drain(..excess);
    excess
}

/// Ordered, bounded retry queue (FIFO eviction on overflow)
#[derive(Debug, Clone, Default)]
pub struct RetryQueue {
    items: VecDeque<QueuedEntry>,
    cap: usize,
}

impl RetryQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::new(),
            cap,
        }
    }

    pub fn from_items(items: VecDeque<QueuedEntry>, cap: usize) -> Self {
        let mut queue = Self { items, cap };
        trim_front(&mut queue.items, cap);
        queue
    }

    /// Enqueue, returning how many old entries were evicted
    pub fn push(&mut self, entry: QueuedEntry) -> usize {
        push_bounded(&mut self.items, entry, self.cap)
    }

    /// Put entries back ahead of everything queued, keeping their order
    pub fn push_front_all(&mut self, entries: impl DoubleEndedIterator<Item = QueuedEntry>) -> usize {
        for entry in entries.rev() {
            self.items.push_front(entry);
        }
        trim_front(&mut self.items, self.cap)
    }

    pub fn front(&self) -> Option<&QueuedEntry> {
        self.items.front()
    }

    /// Remove the head only if it is still the entry with `id`
    pub fn pop_front_if(&mut self, id: &str) -> Option<QueuedEntry> {
        if self.items.front().is_some_and(|q| q.entry.id == id) {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Record one rejection against the head, returning its new attempt count
    pub fn record_rejection(&mut self, id: &str) -> Option<u32> {
        let head = self.items.front_mut().filter(|q| q.entry.id == id)?;
        head.attempts += 1;
        Some(head.attempts)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }

    pub fn items(&self) -> &VecDeque<QueuedEntry> {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::EventType;

    fn entry(n: u32) -> QueuedEntry {
        QueuedEntry::new(AuditEntry::new(
            EventType::PackageRecorded,
            serde_json::json!({ "n": n }),
        ))
    }

    fn numbers(queue: &RetryQueue) -> Vec<u64> {
        queue
            .items()
            .iter()
            .map(|q| q.entry.payload["n"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut queue = RetryQueue::new(3);
        let evicted: usize = (1..=5).map(|n| queue.push(entry(n))).sum();

        assert_eq!(evicted, 2);
        assert_eq!(numbers(&queue), vec![3, 4, 5]);
    }

    #[test]
    fn test_pop_front_if_checks_identity() {
        let mut queue = RetryQueue::new(10);
        let first = entry(1);
        let first_id = first.entry.id.clone();
        queue.push(first);
        queue.push(entry(2));

        assert!(queue.pop_front_if("someone-else").is_none());
        assert_eq!(queue.len(), 2);
        assert!(queue.pop_front_if(&first_id).is_some());
        assert_eq!(numbers(&queue), vec![2]);
    }

    #[test]
    fn test_rejections_accumulate_on_head_only() {
        let mut queue = RetryQueue::new(10);
        let head = entry(1);
        let head_id = head.entry.id.clone();
        let second = entry(2);
        let second_id = second.entry.id.clone();
        queue.push(head);
        queue.push(second);

        assert_eq!(queue.record_rejection(&head_id), Some(1));
        assert_eq!(queue.record_rejection(&head_id), Some(2));
        assert_eq!(queue.record_rejection(&second_id), None);
    }

    #[test]
    fn test_push_front_all_keeps_order_and_cap() {
        let mut queue = RetryQueue::new(4);
        queue.push(entry(3));
        queue.push(entry(4));

        let evicted = queue.push_front_all(vec![entry(0), entry(1), entry(2)].into_iter());
        assert_eq!(evicted, 1);
        assert_eq!(numbers(&queue), vec![1, 2, 3, 4]);
    }
}
