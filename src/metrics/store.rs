//! Append-only, sequence-ordered sample storage for one instance.

use crate::core::{Result, TelemetryError};
use crate::metrics::sample::{Sample, SamplePayload};
use crate::metrics::sequence::SequenceSource;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Samples of one metric instance, ordered by sequence number.
///
/// Appends allocate their sequence number while holding the store lock,
/// so the new sample always belongs at the tail. Readers take a
/// [`snapshot`](SampleStore::snapshot) and compute outside the lock.
pub struct SampleStore {
    sequence: Arc<dyn SequenceSource>,
    samples: Mutex<Vec<Arc<Sample>>>,
}

impl SampleStore {
    pub fn new(sequence: Arc<dyn SequenceSource>) -> Self {
        Self {
            sequence,
            samples: Mutex::new(Vec::new()),
        }
    }

    /// Record a new sample; `timestamp` defaults to now
    pub fn append(&self, payload: SamplePayload, timestamp: Option<DateTime<Utc>>) -> Arc<Sample> {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let mut samples = self.samples.lock();

        let sample = Arc::new(Sample::new(self.sequence.next(), timestamp, payload));
        debug_assert!(samples.last().map_or(true, |last| last.sequence() < sample.sequence()));
        samples.push(Arc::clone(&sample));
        sample
    }

    /// Insert a sample loaded from storage with its original sequence number
    pub fn rehydrate(&self, sequence: u64, timestamp: DateTime<Utc>, payload: SamplePayload) -> Result<Arc<Sample>> {
        let mut samples = self.samples.lock();

        let position = match samples.binary_search_by_key(&sequence, |s| s.sequence()) {
            Ok(_) => {
                tracing::warn!(sequence, "Rejected rehydrated sample with duplicate sequence");
                return Err(TelemetryError::DuplicateSequence(sequence));
            },
            Err(position) => position,
        };

        let sample = Arc::new(Sample::new(sequence, timestamp, payload));
        samples.insert(position, Arc::clone(&sample));
        self.sequence.observe(sequence);

        tracing::trace!(sequence, position, "Rehydrated sample");
        Ok(sample)
    }

    pub fn first(&self) -> Option<Arc<Sample>> {
        self.samples.lock().first().cloned()
    }

    pub fn last(&self) -> Option<Arc<Sample>> {
        self.samples.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of `sample` by sequence number
    pub fn index_of(&self, sample: &Sample) -> Option<usize> {
        self.samples
            .lock()
            .binary_search_by_key(&sample.sequence(), |s| s.sequence())
            .ok()
    }

    pub fn get(&self, index: usize) -> Option<Arc<Sample>> {
        self.samples.lock().get(index).cloned()
    }

    /// Copy of every sample in sequence order
    pub fn snapshot(&self) -> Vec<Arc<Sample>> {
        self.samples.lock().clone()
    }

    /// Copy of the samples from the first one stamped at or after `start`.
    ///
    /// Timestamps are not guaranteed monotonic, so only the leading run of
    /// earlier samples is cut; later stragglers stay in the copy.
    pub fn snapshot_from(&self, start: DateTime<Utc>) -> Vec<Arc<Sample>> {
        let samples = self.samples.lock();
        let skip = samples.iter().take_while(|s| s.timestamp() < start).count();
        samples[skip..].to_vec()
    }
}

impl fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStore").field("len", &self.len()).finish()
    }
}
