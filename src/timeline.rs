//! Multi-repository timeline assembly.
//!
//! Takes one classified commit sequence per repository, each already sorted
//! newest-first, and merges them into a single globally ordered timeline.
//! The merge key is (timestamp descending, repository registration order
//! ascending, hash ascending), which makes the output fully deterministic
//! even when timestamps collide across repositories.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::classify::CommitKind;

/// A classified commit tagged with its source repository's display label.
/// Immutable once built; the rest of the pipeline only reads it.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub repo: String,
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub kind: CommitKind,
    pub noise: bool,
}

struct HeapEntry {
    record: CommitRecord,
    /// Repository registration order, the first tie-break.
    order: usize,
    /// Index into the iterator list, to pull the sequence's next commit.
    seq: usize,
}

impl HeapEntry {
    fn key(&self) -> (DateTime<Utc>, usize, &str) {
        (self.record.timestamp, self.order, self.record.hash.as_str())
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // BinaryHeap is a max-heap: greater == comes out first. Latest timestamp
    // wins; on collision the lower registration order, then the lower hash.
    fn cmp(&self, other: &Self) -> Ordering {
        let (ts_a, order_a, hash_a) = self.key();
        let (ts_b, order_b, hash_b) = other.key();
        ts_a.cmp(&ts_b)
            .then_with(|| order_b.cmp(&order_a))
            .then_with(|| hash_b.cmp(&hash_a))
    }
}

/// K-way merge of per-repository sequences into one timeline.
///
/// The position of a sequence in `sequences` is its repository's
/// registration order. Each sequence must already be sorted newest-first;
/// the merge is O(total commits x log k) and never materializes a re-sort
/// of the concatenation.
pub fn merge_timelines(sequences: Vec<Vec<CommitRecord>>) -> Vec<CommitRecord> {
    match sequences.len() {
        0 => return Vec::new(),
        1 => return sequences.into_iter().next().unwrap_or_default(),
        _ => {}
    }

    let total: usize = sequences.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = sequences.into_iter().map(Vec::into_iter).collect();

    let mut heap = BinaryHeap::with_capacity(iters.len());
    for (seq, iter) in iters.iter_mut().enumerate() {
        if let Some(record) = iter.next() {
            heap.push(HeapEntry {
                record,
                order: seq,
                seq,
            });
        }
    }

    let mut timeline = Vec::with_capacity(total);
    while let Some(entry) = heap.pop() {
        let seq = entry.seq;
        let order = entry.order;
        timeline.push(entry.record);
        if let Some(record) = iters[seq].next() {
            heap.push(HeapEntry { record, order, seq });
        }
    }

    timeline
}
