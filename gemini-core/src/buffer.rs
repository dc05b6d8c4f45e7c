//! ## gemini-core::buffer
//! **Fixed-capacity rolling history**
//!
//! Holds completed interval snapshots most-recent-first: index 0 is the
//! interval that closed last, the highest index is the oldest retained.
//! Pushing moves the head backwards around a ring instead of shifting every
//! element.

use serde::{Serialize, Serializer};

#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RollingBuffer<T> {
    /// Creates an empty buffer.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Installs `item` at index 0. Returns the evicted oldest entry when the
    /// buffer was already full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        self.head = (self.head + capacity - 1) % capacity;
        let evicted = self.slots[self.head].replace(item);
        if self.len < capacity {
            self.len += 1;
        }
        evicted
    }

    /// Returns the entry `index` positions back from the most recent.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[self.slot(index)].as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let at = self.slot(index);
        self.slots[at].as_mut()
    }

    /// Most recent entry, if any.
    pub fn latest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Iterates most-recent-first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.slots[self.slot(i)].as_ref())
    }

    /// Changes the capacity, keeping as many of the most recent entries as
    /// fit. A zero capacity is treated as one.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity() {
            return;
        }
        let keep = self.len.min(capacity);
        let mut slots: Vec<Option<T>> = Vec::with_capacity(capacity);
        for i in 0..keep {
            let at = self.slot(i);
            slots.push(self.slots[at].take());
        }
        slots.resize_with(capacity, || None);
        self.slots = slots;
        self.head = 0;
        self.len = keep;
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.head = 0;
        self.len = 0;
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.head + index) % self.capacity()
    }
}

impl<T: Clone> RollingBuffer<T> {
    /// Copies the contents out, most-recent-first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for RollingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
