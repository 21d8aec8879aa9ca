use std::collections::HashSet;

use crate::logging::MetricsLogger;

/// Bounded set of already-processed transaction signatures.
///
/// A record that brings the set to `capacity` entries clears the whole set,
/// the new signature included. This is a full reset, not eviction, so a
/// signature seen before the clear is accepted again.
#[derive(Debug)]
pub struct SignatureCache {
    entries: HashSet<String>,
    capacity: usize,
}

impl SignatureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn seen(&self, signature: &str) -> bool {
        self.entries.contains(signature)
    }

    /// Insert `signature`. Returns true when the insert triggered a clear.
    pub fn record(&mut self, signature: &str) -> bool {
        if self.entries.contains(signature) {
            return false;
        }

        self.entries.insert(signature.to_string());
        if self.entries.len() >= self.capacity {
            self.entries.clear();
            MetricsLogger::log_cache_cleared(self.capacity);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
