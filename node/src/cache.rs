// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Snapshot Cache
//!
//! Holds at most one materialized snapshot per stream. Snapshots are a
//! performance optimization only: dropping the whole cache never changes a
//! query result, it only forces a replay.
//!
//! A snapshot is "fresh" until the stream it was taken from is appended to.
//! Stale snapshots stay available as replay bases for historical reads.

use cim_kernel::aggregate::Aggregate;
use cim_kernel::cid::Cid;
use cim_kernel::types::id::StreamId;
use cim_kernel::types::Sequence;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// State of a stream as of `sequence` (inclusive), whose envelope is `cid`.
#[derive(Debug)]
pub struct Snapshot<A> {
    pub stream_id: StreamId,
    pub sequence: Sequence,
    pub cid: Cid,
    pub state: Arc<A>,
}

impl<A> Snapshot<A> {
    pub fn new(stream_id: StreamId, sequence: Sequence, cid: Cid, state: Arc<A>) -> Self {
        Self {
            stream_id,
            sequence,
            cid,
            state,
        }
    }

    /// Number of envelopes folded into the state.
    pub fn length(&self) -> u64 {
        self.sequence + 1
    }
}

struct Entry<A> {
    snapshot: Arc<Snapshot<A>>,
    fresh: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct SnapshotCache<A: Aggregate> {
    entries: RwLock<HashMap<StreamId, Entry<A>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<A: Aggregate> Default for SnapshotCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> SnapshotCache<A> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The fresh snapshot for `stream_id`, if there is one.
    pub fn get(&self, stream_id: &StreamId) -> Option<Arc<Snapshot<A>>> {
        let entries = self.entries.read();
        match entries.get(stream_id) {
            Some(entry) if entry.fresh => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::increment_counter!("cim_snapshot_hits_total", "aggregate" => A::KIND);
                Some(entry.snapshot.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::increment_counter!("cim_snapshot_misses_total", "aggregate" => A::KIND);
                None
            }
        }
    }

    /// Any snapshot at or before `sequence`, fresh or stale.
    pub fn get_historical(&self, stream_id: &StreamId, sequence: Sequence) -> Option<Arc<Snapshot<A>>> {
        self.entries
            .read()
            .get(stream_id)
            .filter(|entry| entry.snapshot.sequence <= sequence)
            .map(|entry| entry.snapshot.clone())
    }

    /// Publishes a fresh snapshot.
    ///
    /// Returns `false` and keeps the existing entry when it already covers a
    /// later sequence.
    pub fn put(&self, snapshot: Snapshot<A>) -> bool {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&snapshot.stream_id) {
            if existing.snapshot.sequence > snapshot.sequence {
                return false;
            }
        }
        entries.insert(
            snapshot.stream_id.clone(),
            Entry {
                snapshot: Arc::new(snapshot),
                fresh: true,
            },
        );
        true
    }

    /// Marks the stream's snapshot stale after an append.
    pub fn invalidate(&self, stream_id: &StreamId) {
        if let Some(entry) = self.entries.write().get_mut(stream_id) {
            entry.fresh = false;
        }
    }

    /// Drops the stream's snapshot entirely.
    pub fn evict(&self, stream_id: &StreamId) {
        self.entries.write().remove(stream_id);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cim_kernel::graph::GraphState;

    fn snap(seq: Sequence, tag: u8) -> Snapshot<GraphState> {
        Snapshot::new(
            StreamId::new("g").unwrap(),
            seq,
            Cid([tag; 32]),
            Arc::new(GraphState::default()),
        )
    }

    #[test]
    fn test_put_then_get_fresh() {
        let cache = SnapshotCache::new();
        let id = StreamId::new("g").unwrap();
        assert!(cache.get(&id).is_none());
        assert!(cache.put(snap(3, 1)));

        let hit = cache.get(&id).unwrap();
        assert_eq!(hit.sequence, 3);
        assert_eq!(hit.length(), 4);
        assert_eq!(cache.stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn test_invalidate_keeps_historical_base() {
        let cache = SnapshotCache::new();
        let id = StreamId::new("g").unwrap();
        cache.put(snap(3, 1));
        cache.invalidate(&id);

        assert!(cache.get(&id).is_none());
        assert_eq!(cache.get_historical(&id, 5).unwrap().sequence, 3);
        assert_eq!(cache.get_historical(&id, 3).unwrap().sequence, 3);
        assert!(cache.get_historical(&id, 2).is_none());
    }

    #[test]
    fn test_put_never_regresses() {
        let cache = SnapshotCache::new();
        let id = StreamId::new("g").unwrap();
        assert!(cache.put(snap(5, 1)));
        assert!(!cache.put(snap(4, 2)));
        assert_eq!(cache.get(&id).unwrap().sequence, 5);

        assert!(cache.put(snap(5, 3)));
        assert_eq!(cache.get(&id).unwrap().cid, Cid([3; 32]));
    }

    #[test]
    fn test_evict_and_clear() {
        let cache = SnapshotCache::new();
        let id = StreamId::new("g").unwrap();
        cache.put(snap(1, 1));
        cache.evict(&id);
        assert!(cache.get_historical(&id, 10).is_none());
        cache.put(snap(1, 1));
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
