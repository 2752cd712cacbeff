//! Host-owned sample history

use std::collections::VecDeque;

use bytes::Bytes;

/// Minimum capacity: the decision engine compares two samples
pub const MIN_HISTORY_CAPACITY: usize = 2;

/// Fixed-capacity buffer of collected payloads, newest first
///
/// Pushing into a full buffer evicts the oldest payload.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    payloads: VecDeque<Bytes>,
    capacity: usize,
}

impl SampleHistory {
    /// Create an empty history; capacities below two are raised to two
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_HISTORY_CAPACITY);
        Self {
            payloads: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record the newest payload
    pub fn push(&mut self, payload: Bytes) {
        if self.payloads.len() == self.capacity {
            self.payloads.pop_back();
        }
        self.payloads.push_front(payload);
    }

    /// Payloads ordered newest first
    pub fn newest_first(&mut self) -> &[Bytes] {
        self.payloads.make_contiguous()
    }

    /// Most recent payload
    pub fn latest(&self) -> Option<&Bytes> {
        self.payloads.front()
    }

    /// Number of stored payloads
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Maximum number of stored payloads
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all stored payloads
    pub fn clear(&mut self) {
        self.payloads.clear();
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new(MIN_HISTORY_CAPACITY)
    }
}
