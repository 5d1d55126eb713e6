//! Fixed-capacity sliding window
//!
//! Insertion-ordered store used by every agent for its temporal context.
//! Once full, each push evicts the oldest item.

use std::collections::VecDeque;

/// FIFO ring buffer with a capacity fixed at construction.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items.
    ///
    /// A zero capacity is allowed; such a buffer never holds anything.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an item, evicting the oldest one when full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Most recent item, if any.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Least recent item, if any.
    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    /// The most recent `min(n, len)` items in chronological order.
    pub fn window(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    /// All items, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_accessors() {
        let buffer: RingBuffer<u32> = RingBuffer::new(4);
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
        assert!(buffer.oldest().is_none());
        assert_eq!(buffer.window(10).count(), 0);
    }

    #[test]
    fn test_eviction_order() {
        let mut buffer = RingBuffer::new(3);
        for i in 1..=5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());
        assert_eq!(buffer.oldest(), Some(&3));
        assert_eq!(buffer.latest(), Some(&5));
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_window_is_chronological() {
        let mut buffer = RingBuffer::new(10);
        for i in 0..6 {
            buffer.push(i);
        }

        assert_eq!(buffer.window(2).copied().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(buffer.window(100).count(), 6);
    }

    #[test]
    fn test_zero_capacity() {
        let mut buffer = RingBuffer::new(0);
        buffer.push(1);
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn test_clear() {
        let mut buffer = RingBuffer::new(2);
        buffer.push("a");
        buffer.push("b");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);
    }

    proptest! {
        #[test]
        fn prop_size_and_oldest_after_overflow(capacity in 1usize..64, extra in 1usize..200) {
            let total = capacity + extra;
            let mut buffer = RingBuffer::new(capacity);
            for i in 1..=total {
                buffer.push(i);
            }

            prop_assert_eq!(buffer.len(), capacity);
            // oldest is the (k - capacity + 1)-th inserted item
            prop_assert_eq!(buffer.oldest().copied(), Some(total - capacity + 1));
            prop_assert_eq!(buffer.latest().copied(), Some(total));
        }

        #[test]
        fn prop_full_window_matches_buffer(capacity in 1usize..32, count in 0usize..64, extra in 0usize..8) {
            let mut buffer = RingBuffer::new(capacity);
            for i in 0..count {
                buffer.push(i);
            }
            let all: Vec<_> = buffer.iter().copied().collect();
            let window: Vec<_> = buffer.window(buffer.len() + extra).copied().collect();
            prop_assert_eq!(all, window);
        }
    }
}
