use std::cmp::Ordering;

use crate::queue::Index;

/// A heap entry ordered by index. The order is reversed so that
/// [`std::collections::BinaryHeap`] yields the smallest index first.
pub struct OrderedEntry<T> {
    pub item: T,
    pub index: Index,
}

impl<T> PartialOrd for OrderedEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for OrderedEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.index.cmp(&self.index)
    }
}

impl<T> Eq for OrderedEntry<T> {}

impl<T> PartialEq for OrderedEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        other.index == self.index
    }
}
