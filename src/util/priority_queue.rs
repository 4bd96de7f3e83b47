use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T> {
    priority: u32,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // `BinaryHeap` is a max-heap: invert both keys so the lowest priority
    // number, then the earliest arrival, sits on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Ascending, stable priority queue.
///
/// Lower priority numbers dequeue first. Items sharing a priority dequeue in
/// the order they were enqueued. The queue is unbounded; callers that care
/// about growth watch [`len`](Self::len).
pub struct PriorityQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn enqueue(&mut self, item: T, priority: u32) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Entry {
            priority,
            seq,
            item,
        });
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.heap.pop().map(|entry| entry.item)
    }

    /// Priority of the item `dequeue` would return next.
    pub fn peek_priority(&self) -> Option<u32> {
        self.heap.peek().map(|entry| entry.priority)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Remove every item, returning them in dequeue order.
    pub fn drain_ordered(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.heap.len());
        while let Some(item) = self.dequeue() {
            items.push(item);
        }
        items
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_dequeues_none() {
        let mut queue: PriorityQueue<&str> = PriorityQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.peek_priority(), None);
    }

    #[test]
    fn dequeues_in_ascending_priority() {
        let mut queue = PriorityQueue::new();
        queue.enqueue("low", 4);
        queue.enqueue("critical", 0);
        queue.enqueue("medium", 2);

        assert_eq!(queue.peek_priority(), Some(0));
        assert_eq!(queue.dequeue(), Some("critical"));
        assert_eq!(queue.dequeue(), Some("medium"));
        assert_eq!(queue.dequeue(), Some("low"));
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_priorities_keep_arrival_order() {
        let mut queue = PriorityQueue::new();
        queue.enqueue("a", 2);
        queue.enqueue("b", 1);
        queue.enqueue("c", 2);
        queue.enqueue("d", 1);
        queue.enqueue("e", 2);

        assert_eq!(queue.drain_ordered(), vec!["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn order_holds_for_mixed_sequence() {
        let mut queue = PriorityQueue::new();
        let priorities = [3_u32, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 0, 4];
        for (idx, priority) in priorities.iter().enumerate() {
            queue.enqueue((idx, *priority), *priority);
        }

        let drained = queue.drain_ordered();
        assert_eq!(drained.len(), priorities.len());
        for pair in drained.windows(2) {
            let (first_idx, first_priority) = pair[0];
            let (second_idx, second_priority) = pair[1];
            assert!(first_priority <= second_priority);
            if first_priority == second_priority {
                assert!(first_idx < second_idx, "ties must keep arrival order");
            }
        }
    }

    #[test]
    fn interleaved_enqueue_and_dequeue() {
        let mut queue = PriorityQueue::new();
        queue.enqueue("first", 1);
        queue.enqueue("second", 1);
        assert_eq!(queue.dequeue(), Some("first"));

        queue.enqueue("urgent", 0);
        queue.enqueue("third", 1);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(), Some("urgent"));
        assert_eq!(queue.dequeue(), Some("second"));
        assert_eq!(queue.dequeue(), Some("third"));
    }
}
