use std::num::NonZeroUsize;

/// Fixed-capacity circular store indexed by `counter % capacity`.
///
/// Once `capacity` entries have been written, each push overwrites the
/// oldest entry. The counter grows for the lifetime of a session and only
/// goes back to zero on [`RingBuffer::reset`]; after a reset, slots from the
/// previous session stay allocated but are no longer reachable.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    counter: u64,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        RingBuffer {
            slots: Vec::new(),
            capacity: capacity.get(),
            counter: 0,
        }
    }

    /// Write `value` at `counter % capacity` and return that slot index.
    pub fn push(&mut self, value: T) -> usize {
        let slot = (self.counter % self.capacity as u64) as usize;
        if slot < self.slots.len() {
            self.slots[slot] = value;
        } else {
            // Storage grows lazily, so slot == len here.
            self.slots.push(value);
        }
        self.counter += 1;
        slot
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries: `min(counter, capacity)`.
    pub fn len(&self) -> usize {
        self.counter.min(self.capacity as u64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.counter == 0
    }

    /// Index of the oldest live entry in slot space.
    fn oldest_slot(&self) -> usize {
        if self.counter <= self.capacity as u64 {
            0
        } else {
            (self.counter % self.capacity as u64) as usize
        }
    }

    /// The `index`-th live entry, oldest first.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        let slot = (self.oldest_slot() + index) % self.capacity;
        self.slots.get(slot)
    }

    /// Live entries, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Point-in-time copy of the live entries, oldest to newest.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> RingBuffer<u32> {
        RingBuffer::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_partial_fill() {
        let mut ring = buffer(5);
        assert!(ring.is_empty());
        for i in 0..3 {
            assert_eq!(ring.push(i), i as usize);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.to_vec(), vec![0, 1, 2]);
        assert_eq!(ring.get(3), None);
    }

    #[test]
    fn test_wraparound_keeps_most_recent() {
        let capacity = 5;
        let k = 3;
        let mut ring = buffer(capacity);
        for i in 0..(capacity + k) as u32 {
            ring.push(i);
        }

        assert_eq!(ring.counter(), (capacity + k) as u64);
        assert_eq!(ring.len(), capacity);
        assert_eq!(ring.to_vec(), vec![3, 4, 5, 6, 7]);
        // Oldest live entry sits at slot k mod C.
        assert_eq!(ring.oldest_slot(), k % capacity);
        assert_eq!(ring.slots[k % capacity], 3);
    }

    #[test]
    fn test_exact_fill_and_multiple_laps() {
        let mut ring = buffer(4);
        for i in 0..4 {
            ring.push(i);
        }
        assert_eq!(ring.to_vec(), vec![0, 1, 2, 3]);

        for i in 4..13 {
            ring.push(i);
        }
        assert_eq!(ring.to_vec(), vec![9, 10, 11, 12]);
        assert_eq!(ring.slots.len(), 4);
    }

    #[test]
    fn test_reset_hides_previous_entries() {
        let mut ring = buffer(4);
        for i in 0..4 {
            ring.push(i);
        }
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);

        ring.push(100);
        assert_eq!(ring.to_vec(), vec![100]);

        // Completing a full lap overwrites every old slot.
        for i in 101..104 {
            ring.push(i);
        }
        assert_eq!(ring.to_vec(), vec![100, 101, 102, 103]);
        assert!(!ring.slots.contains(&3));
    }

    #[test]
    fn test_capacity_one() {
        let mut ring = buffer(1);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.to_vec(), vec![2]);
        assert_eq!(ring.capacity(), 1);
    }
}
