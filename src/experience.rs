use std::{collections::VecDeque, ops::Index};

use rand::{Rng, seq::SliceRandom};

use crate::error::{Result, TrainError};

/// One recorded step: the state, the action taken and its TD target.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub state: Vec<f64>,
    pub action: usize,
    pub target_value: f64,
}

impl Experience {
    pub fn new(state: Vec<f64>, action: usize, target_value: f64) -> Self {
        Self {
            state,
            action,
            target_value,
        }
    }
}

/// Fixed-capacity replay buffer in insertion order. Unlike a ring buffer,
/// `push` never evicts; the trainer evicts the oldest entry itself once an
/// update has consumed the full buffer.
#[derive(Debug)]
pub struct ReplayMemory {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Appends to the end. Pushing into a full buffer is a trainer bug.
    pub fn push(&mut self, experience: Experience) {
        assert!(!self.is_full(), "replay memory is full; evict before pushing");
        self.buffer.push_back(experience);
    }

    /// Shuffles every index of the buffer and keeps the first `batch_size`,
    /// so no entry is drawn twice.
    pub fn sample_batch<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<usize>> {
        if batch_size > self.capacity {
            return Err(TrainError::BatchExceedsCapacity {
                batch_size,
                capacity: self.capacity,
            });
        }
        let mut index: Vec<usize> = (0..self.buffer.len()).collect();
        index.shuffle(rng);
        index.truncate(batch_size);
        Ok(index)
    }

    /// Drops the single oldest entry.
    pub fn evict_oldest(&mut self) -> Option<Experience> {
        self.buffer.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Index<usize> for ReplayMemory {
    type Output = Experience;

    fn index(&self, k: usize) -> &Experience {
        &self.buffer[k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn experience(tag: usize) -> Experience {
        Experience::new(vec![tag as f64; 3], tag % 3, tag as f64 * 0.5)
    }

    #[test]
    fn sliding_window_keeps_most_recent_capacity_entries() {
        let capacity = 5;
        let mut memory = ReplayMemory::new(capacity);
        for tag in 0..capacity + 7 {
            memory.push(experience(tag));
            assert!(memory.len() <= capacity);
            if memory.is_full() {
                memory.evict_oldest();
            }
        }
        // the last push filled the buffer and was followed by one eviction
        let tags: Vec<f64> = memory.iter().map(|e| e.state[0]).collect();
        assert_eq!(tags, vec![8.0, 9.0, 10.0, 11.0]);

        memory.push(experience(12));
        assert!(memory.is_full());
        let tags: Vec<f64> = memory.iter().map(|e| e.state[0]).collect();
        assert_eq!(tags, vec![8.0, 9.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn sample_batch_draws_distinct_indices() {
        let mut memory = ReplayMemory::new(10);
        for tag in 0..10 {
            memory.push(experience(tag));
        }
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let mut batch = memory.sample_batch(6, &mut rng).unwrap();
            assert_eq!(batch.len(), 6);
            batch.sort_unstable();
            batch.dedup();
            assert_eq!(batch.len(), 6);
            assert!(batch.iter().all(|&k| k < 10));
        }
    }

    #[test]
    fn full_batch_is_a_permutation() {
        let mut memory = ReplayMemory::new(4);
        for tag in 0..4 {
            memory.push(experience(tag));
        }
        let mut batch = memory
            .sample_batch(4, &mut StdRng::seed_from_u64(8))
            .unwrap();
        batch.sort_unstable();
        assert_eq!(batch, vec![0, 1, 2, 3]);
    }

    #[test]
    fn batch_larger_than_capacity_is_rejected() {
        let memory = ReplayMemory::new(4);
        let err = memory
            .sample_batch(5, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, TrainError::BatchExceedsCapacity { batch_size: 5, capacity: 4 }));
    }

    #[test]
    #[should_panic]
    fn pushing_into_a_full_buffer_panics() {
        let mut memory = ReplayMemory::new(1);
        memory.push(experience(0));
        memory.push(experience(1));
    }

    #[test]
    fn indexing_follows_insertion_order() {
        let mut memory = ReplayMemory::new(3);
        for tag in 0..3 {
            memory.push(experience(tag));
        }
        memory.evict_oldest();
        assert_eq!(memory[0], experience(1));
        assert_eq!(memory[1], experience(2));
    }
}
