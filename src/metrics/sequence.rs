//! Monotonic sequence numbers for samples.
//!
//! Every sample gets its number from one shared source at creation time.
//! The number, not the timestamp, is the total-order key of a sample
//! store. A persistence layer that reloads samples reports the numbers it
//! rehydrates through [`SequenceSource::observe`] so that fresh samples
//! keep sorting after them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of strictly increasing sample sequence numbers
pub trait SequenceSource: Send + Sync + fmt::Debug {
    /// Allocate the next number. Never returns the same value twice.
    fn next(&self) -> u64;

    /// Record a number allocated elsewhere so later `next()` calls exceed it.
    fn observe(&self, sequence: u64);

    /// Highest number handed out or observed so far (0 when none).
    fn current(&self) -> u64;
}

/// Lock-free sequence source backed by a single atomic counter
#[derive(Debug, Default)]
pub struct AtomicSequence {
    last: AtomicU64,
}

impl AtomicSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start after `last`, e.g. the highest number found in a persisted stream
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }
}

impl SequenceSource for AtomicSequence {
    #[inline]
    fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    fn observe(&self, sequence: u64) {
        self.last.fetch_max(sequence, Ordering::AcqRel);
    }

    #[inline]
    fn current(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_starts_at_one() {
        let seq = AtomicSequence::new();
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.current(), 2);
    }

    #[test]
    fn test_observe_only_moves_forward() {
        let seq = AtomicSequence::starting_after(10);
        seq.observe(5);
        assert_eq!(seq.next(), 11);

        seq.observe(100);
        assert_eq!(seq.next(), 101);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let seq = Arc::new(AtomicSequence::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = Arc::clone(&seq);
                thread::spawn(move || (0..1000).map(|_| seq.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4000);
        assert_eq!(seq.current(), 4000);
    }
}
