//! Bounded heap keeping the K highest weighted candidates

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Candidate {
    weight: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed, so that the heap top is the smallest weight
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.weight.total_cmp(&self.weight)
    }
}

/// A bounded min-heap over (weight, index) pairs
pub struct TopKHeap {
    heap: BinaryHeap<Candidate>,
    max_size: usize,
}

impl TopKHeap {
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(max_size),
            max_size,
        }
    }

    /// Adds a candidate if the heap is not full or if it beats the
    /// current minimum
    pub fn push(&mut self, weight: f64, index: usize) {
        if self.heap.len() < self.max_size {
            self.heap.push(Candidate { weight, index });
        } else if let Some(min) = self.heap.peek() {
            if weight > min.weight {
                self.heap.pop();
                self.heap.push(Candidate { weight, index });
            }
        }
    }

    /// Weight a candidate must exceed to enter the heap
    pub fn threshold(&self) -> f64 {
        match self.heap.peek() {
            Some(min) if self.heap.len() >= self.max_size => min.weight,
            _ => f64::NEG_INFINITY,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Indices by increasing weight
    pub fn into_ascending(self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.heap.into_sorted_vec().into_iter().map(|c| c.index).collect();
        indices.reverse();
        indices
    }
}
