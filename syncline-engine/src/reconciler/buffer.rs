//! The reconciliation buffer.
//!
//! An ordered, newest-first, capacity-bounded sequence of ingested records
//! with two invariants: no two entries ever share a key (duplicate inserts
//! replace in place), and a commit never shows the view a shorter buffer than
//! it already saw unless an explicit reset occurred.

use std::time::{Duration, Instant};

use syncline_core::record::{IngestedRecord, RecordKey};

/// The distinguishing signature of the buffer: length, first key, last key.
///
/// A new commit only occurs when this differs from the previous commit's
/// signature; re-applying the same logical state is a no-op.
pub type Signature = (usize, Option<RecordKey>, Option<RecordKey>);

/// The last buffer state actually pushed to the view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommitSnapshot {
    /// The committed records, newest-first.
    pub records: Vec<IngestedRecord>,
}

/// An ordered, bounded, deduplicated buffer of ingested records.
pub struct ReconciliationBuffer {
    /// Buffered records, newest-first.
    records: Vec<IngestedRecord>,
    /// Maximum number of retained records; oldest entries are silently
    /// evicted beyond this.
    capacity: usize,
    /// The minimum interval between two commits.
    commit_interval: Duration,
    /// The instant of the last commit, if any.
    last_commit_at: Option<Instant>,
    /// The signature of the last commit, if any.
    last_signature: Option<Signature>,
    /// The length of the last committed snapshot; commits below this length
    /// are withheld until a reset.
    committed_len: usize,
}

impl ReconciliationBuffer {
    /// Create a new instance.
    pub fn new(capacity: usize, commit_interval: Duration) -> Self {
        Self {
            records: Vec::new(),
            capacity,
            commit_interval,
            last_commit_at: None,
            last_signature: None,
            committed_len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace a record arriving from the push channel.
    ///
    /// The record lands at the head (most-recent-first ordering); an existing
    /// record with the same key is fully replaced, not merged. Never fails.
    /// Returns true when an existing record was replaced.
    pub fn ingest_push(&mut self, record: IngestedRecord) -> bool {
        let replaced = match self.records.iter().position(|existing| existing.key == record.key) {
            Some(pos) => {
                self.records.remove(pos);
                true
            }
            None => false,
        };
        self.records.insert(0, record);
        self.records.truncate(self.capacity);
        replaced
    }

    /// Replace the entire buffer content with a pull batch.
    ///
    /// Used after a full re-fetch (reconnect, periodic refresh); the batch is
    /// treated as internally ordered newest-first by the backend's own query
    /// ordering. Whether the view changes is decided by `maybe_commit`.
    pub fn ingest_pull_batch(&mut self, batch: Vec<IngestedRecord>) {
        let mut records: Vec<IngestedRecord> = Vec::with_capacity(batch.len().min(self.capacity));
        for record in batch {
            if records.len() == self.capacity {
                break;
            }
            // Within a batch the first occurrence is the newest; later
            // duplicates are stale re-sends.
            if records.iter().any(|existing| existing.key == record.key) {
                continue;
            }
            records.push(record);
        }
        self.records = records;
    }

    /// Clear the buffer and all commit state.
    ///
    /// After a reset the next commit may legally be shorter (including empty)
    /// and is not held back by the time gate, so a connector restart never
    /// shows data from the previous session.
    pub fn reset(&mut self) {
        self.records.clear();
        self.last_commit_at = None;
        self.last_signature = None;
        self.committed_len = 0;
    }

    /// The buffer's current distinguishing signature.
    pub fn signature(&self) -> Signature {
        (
            self.records.len(),
            self.records.first().map(|rec| rec.key.clone()),
            self.records.last().map(|rec| rec.key.clone()),
        )
    }

    /// Commit the buffer to the view, if the anti-flicker gate allows it.
    ///
    /// The gate has two independent parts: content (the signature must differ
    /// from the last commit) and time (at most one commit per interval).
    /// Committing on every push would cause visual churn; committing on
    /// content change without a time floor would still allow bursts.
    pub fn maybe_commit(&mut self, now: Instant) -> Option<CommitSnapshot> {
        let signature = self.signature();
        if self.last_signature.as_ref() == Some(&signature) {
            return None;
        }
        if signature.0 < self.committed_len {
            // The view must never observe the buffer shrinking without an
            // explicit reset.
            return None;
        }
        if let Some(last) = self.last_commit_at {
            if now.duration_since(last) < self.commit_interval {
                return None;
            }
        }
        self.last_commit_at = Some(now);
        self.committed_len = signature.0;
        self.last_signature = Some(signature);
        Some(CommitSnapshot {
            records: self.records.clone(),
        })
    }
}
