use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct HeapItem<T> {
    key: f32,
    seq: u64,
    value: T,
}

impl<T> HeapItem<T> {
    fn order(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<T> PartialEq for HeapItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.order(other) == Ordering::Equal
    }
}

impl<T> Eq for HeapItem<T> {}

impl<T> PartialOrd for HeapItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.order(other))
    }
}

impl<T> Ord for HeapItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order(other)
    }
}

/// Keeps the `k` items with the smallest keys seen so far.
///
/// Backed by a max-heap so the current eviction threshold is always at the
/// top. Items with equal keys are ordered by insertion; once full, the
/// newest of several equal maxima is evicted first.
pub struct KMin<T> {
    k: usize,
    heap: BinaryHeap<HeapItem<T>>,
    next_seq: u64,
}

impl<T> KMin<T> {
    /// A `k` of zero is treated as one.
    pub fn new(k: usize) -> Self {
        let k = k.max(1);
        Self {
            k,
            heap: BinaryHeap::with_capacity(k),
            next_seq: 0,
        }
    }

    /// Adds an item. Once full, an item whose key is not smaller than the
    /// current largest key is discarded.
    pub fn add(&mut self, key: f32, value: T) {
        let item = HeapItem {
            key,
            seq: self.next_seq,
            value,
        };
        self.next_seq += 1;

        if self.heap.len() < self.k {
            self.heap.push(item);
            return;
        }

        let Some(largest) = self.heap.peek() else {
            return;
        };
        if key < largest.key {
            self.heap.pop();
            self.heap.push(item);
        }
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn capacity(&self) -> usize {
        self.k
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() == self.k
    }

    /// Largest key currently held, `None` when empty.
    pub fn largest_key(&self) -> Option<f32> {
        self.heap.peek().map(|item| item.key)
    }
}

impl<T: Clone> KMin<T> {
    /// Held items sorted ascending by key, ties in insertion order.
    pub fn min_k_items(&self) -> Vec<T> {
        let mut items: Vec<&HeapItem<T>> = self.heap.iter().collect();
        items.sort_by(|a, b| a.order(b));
        items.into_iter().map(|item| item.value.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_k_smallest_sorted() {
        let mut kmin = KMin::new(3);
        for (key, value) in [(5.0, 'a'), (1.0, 'b'), (4.0, 'c'), (2.0, 'd'), (3.0, 'e')] {
            kmin.add(key, value);
        }
        assert_eq!(kmin.size(), 3);
        assert_eq!(kmin.largest_key(), Some(3.0));
        assert_eq!(kmin.min_k_items(), vec!['b', 'd', 'e']);
    }

    #[test]
    fn fewer_items_than_capacity() {
        let mut kmin = KMin::new(10);
        assert_eq!(kmin.largest_key(), None);
        kmin.add(2.0, 2);
        kmin.add(1.0, 1);
        assert_eq!(kmin.min_k_items(), vec![1, 2]);
        assert!(!kmin.is_full());
    }

    #[test]
    fn equal_to_threshold_is_discarded() {
        let mut kmin = KMin::new(2);
        kmin.add(1.0, "first");
        kmin.add(2.0, "second");
        kmin.add(2.0, "late");
        assert_eq!(kmin.min_k_items(), vec!["first", "second"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut kmin = KMin::new(4);
        kmin.add(1.0, 'x');
        kmin.add(0.5, 'y');
        kmin.add(1.0, 'z');
        kmin.add(1.0, 'w');
        kmin.add(0.1, 'v');
        assert_eq!(kmin.min_k_items(), vec!['v', 'y', 'x', 'z']);
    }

    #[test]
    fn result_independent_of_insertion_order() {
        let keys = [9.0, 3.0, 7.0, 1.0, 8.0, 2.0, 6.0];
        let mut forward = KMin::new(4);
        let mut backward = KMin::new(4);
        for &key in &keys {
            forward.add(key, key);
        }
        for &key in keys.iter().rev() {
            backward.add(key, key);
        }
        assert_eq!(forward.min_k_items(), vec![1.0, 2.0, 3.0, 6.0]);
        assert_eq!(forward.min_k_items(), backward.min_k_items());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut kmin = KMin::new(0);
        kmin.add(3.0, 3);
        kmin.add(1.0, 1);
        assert_eq!(kmin.capacity(), 1);
        assert_eq!(kmin.min_k_items(), vec![1]);
    }
}
