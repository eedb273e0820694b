//! Space-Saving heavy hitters with a lazily cleaned min-heap.
//!
//! Every mutation of an entry bumps its version and pushes a fresh snapshot
//! onto the heap instead of fixing the heap in place. Old snapshots stay behind
//! and are recognised as stale when they surface at the top: their
//! `(count, version)` no longer matches the live entry of their key.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Live state of a tracked key.
///
/// The true number of occurrences of the key lies in `[count - error, count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub count: u32,
    pub error: u32,
    version: u32,
}

/// Heap snapshot. Ordered by count, then key, then version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Node {
    count: u32,
    key: u64,
    version: u32,
}

/// The heap is rebuilt from the table once it holds this many snapshots per
/// tracked key.
const COMPACT_FACTOR: usize = 8;
const MIN_COMPACT_LEN: usize = 1024;

/// Approximate counter keeping at most `capacity` keys.
///
/// A capacity of zero is allowed: such a counter ignores every offer and
/// reports a maximum of zero.
#[derive(Debug, Clone)]
pub struct SpaceSaving {
    capacity: usize,
    table: HashMap<u64, Entry>,
    heap: BinaryHeap<Reverse<Node>>,
    max_count: u32,
}

impl SpaceSaving {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            table: HashMap::with_capacity(capacity),
            heap: BinaryHeap::with_capacity(capacity.saturating_mul(2)),
            max_count: 0,
        }
    }

    /// Records one occurrence of `key`.
    pub fn offer(&mut self, key: u64) {
        if self.capacity == 0 {
            return;
        }

        if let Some(entry) = self.table.get_mut(&key) {
            entry.count += 1;
            entry.version += 1;
            let entry = *entry;
            self.push(key, entry);
            return;
        }

        let entry = if self.table.len() < self.capacity {
            Entry {
                count: 1,
                error: 0,
                version: 1,
            }
        } else {
            // the table is full, so the heap holds at least one valid node
            let evicted = self.pop_min_valid();
            debug_assert!(evicted.is_some(), "full table without a live heap node");
            let Some(evicted) = evicted else {
                return;
            };
            self.table.remove(&evicted.key);
            Entry {
                count: evicted.count + 1,
                error: evicted.count,
                version: 1,
            }
        };
        self.table.insert(key, entry);
        self.push(key, entry);
    }

    /// Largest count estimate seen so far. Never decreases.
    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// `(count, error)` of a tracked key.
    pub fn estimate(&self, key: u64) -> Option<(u32, u32)> {
        self.table.get(&key).map(|e| (e.count, e.error))
    }

    /// Guaranteed number of occurrences of `key`, zero if untracked.
    pub fn lower_bound(&self, key: u64) -> u32 {
        self.table.get(&key).map_or(0, |e| e.count - e.error)
    }

    /// Iterates over the tracked keys and their entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Entry)> + '_ {
        self.table.iter().map(|(&k, &e)| (k, e))
    }

    fn push(&mut self, key: u64, entry: Entry) {
        self.heap.push(Reverse(Node {
            count: entry.count,
            key,
            version: entry.version,
        }));
        self.max_count = self.max_count.max(entry.count);

        if self.heap.len() > MIN_COMPACT_LEN.max(self.capacity.saturating_mul(COMPACT_FACTOR)) {
            self.compact();
        }
    }

    fn is_live(&self, node: &Node) -> bool {
        self.table
            .get(&node.key)
            .is_some_and(|e| e.count == node.count && e.version == node.version)
    }

    /// Pops snapshots until one matches its live entry and returns it.
    fn pop_min_valid(&mut self) -> Option<Node> {
        while let Some(Reverse(node)) = self.heap.pop() {
            if self.is_live(&node) {
                return Some(node);
            }
        }
        None
    }

    /// Drops every stale snapshot by rebuilding the heap from the table. Only
    /// valid nodes survive, so the eviction order is unchanged.
    fn compact(&mut self) {
        let nodes: Vec<Reverse<Node>> = self
            .table
            .iter()
            .map(|(&key, e)| {
                Reverse(Node {
                    count: e.count,
                    key,
                    version: e.version,
                })
            })
            .collect();
        self.heap = BinaryHeap::from(nodes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn exact_counts(keys: &[u64]) -> HashMap<u64, u32> {
        let mut counts = HashMap::new();
        for &k in keys {
            *counts.entry(k).or_insert(0) += 1;
        }
        counts
    }

    fn assert_bounds(ss: &SpaceSaving, keys: &[u64]) {
        let truth = exact_counts(keys);
        for (key, e) in ss.iter() {
            let t = truth.get(&key).copied().unwrap_or(0);
            assert!(e.count - e.error <= t, "key {key}: {e:?} vs true {t}");
            assert!(t <= e.count, "key {key}: {e:?} vs true {t}");
        }
    }

    #[test]
    fn test_zero_capacity() {
        let mut ss = SpaceSaving::new(0);
        for k in 0..100 {
            ss.offer(k % 3);
        }
        assert_eq!(ss.max_count(), 0);
        assert!(ss.is_empty());
    }

    #[test]
    fn test_exact_below_capacity() {
        let mut ss = SpaceSaving::new(10);
        let keys = [1, 2, 2, 3, 3, 3, 4, 4, 4, 4];
        for &k in &keys {
            ss.offer(k);
        }
        assert_eq!(ss.len(), 4);
        assert_eq!(ss.max_count(), 4);
        assert_eq!(ss.estimate(4), Some((4, 0)));
        assert_eq!(ss.estimate(1), Some((1, 0)));
        assert_eq!(ss.estimate(5), None);
        assert_eq!(ss.lower_bound(3), 3);
    }

    #[test]
    fn test_eviction_replaces_smallest() {
        let mut ss = SpaceSaving::new(2);
        for k in [10, 10, 10, 20, 30] {
            ss.offer(k);
        }
        // 20 had the smallest count and is replaced by 30 inheriting its count
        assert_eq!(ss.estimate(20), None);
        assert_eq!(ss.estimate(30), Some((2, 1)));
        assert_eq!(ss.estimate(10), Some((3, 0)));
        assert_eq!(ss.max_count(), 3);

        // ties on count evict the smaller key
        let mut ss = SpaceSaving::new(2);
        for k in [7, 5, 9] {
            ss.offer(k);
        }
        assert_eq!(ss.estimate(5), None);
        assert_eq!(ss.estimate(7), Some((1, 0)));
        assert_eq!(ss.estimate(9), Some((2, 1)));
    }

    #[test]
    fn test_stale_nodes_are_skipped() {
        let mut ss = SpaceSaving::new(2);
        // 1 gets incremented so its first snapshot goes stale
        for k in [1, 2, 1, 1, 3] {
            ss.offer(k);
        }
        assert_eq!(ss.estimate(1), Some((3, 0)));
        assert_eq!(ss.estimate(2), None);
        assert_eq!(ss.estimate(3), Some((2, 1)));
    }

    #[test]
    fn test_space_saving_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for capacity in [1, 5, 50, 200] {
            let keys: Vec<u64> = (0..20_000)
                .map(|_| {
                    // skewed stream: a few heavy keys over a long tail
                    if rng.gen_bool(0.3) {
                        rng.gen_range(0..5)
                    } else {
                        rng.gen_range(0..2_000)
                    }
                })
                .collect();
            let mut ss = SpaceSaving::new(capacity);
            for (i, &k) in keys.iter().enumerate() {
                ss.offer(k);
                if i % 5_000 == 0 {
                    assert_bounds(&ss, &keys[..=i]);
                }
            }
            assert!(ss.len() <= capacity);
            assert_bounds(&ss, &keys);
        }
    }

    #[test]
    fn test_max_count_is_monotone() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ss = SpaceSaving::new(16);
        let mut last = 0;
        for _ in 0..50_000 {
            ss.offer(rng.gen_range(0..100));
            assert!(ss.max_count() >= last);
            last = ss.max_count();
        }
    }

    #[test]
    fn test_matches_exact_when_capacity_suffices() {
        let mut rng = StdRng::seed_from_u64(9);
        let keys: Vec<u64> = (0..10_000).map(|_| rng.gen_range(0..300)).collect();
        let mut ss = SpaceSaving::new(300);
        for &k in &keys {
            ss.offer(k);
        }
        let truth = exact_counts(&keys);
        assert_eq!(ss.max_count(), truth.values().copied().max().unwrap());
        for (key, e) in ss.iter() {
            assert_eq!(e.error, 0);
            assert_eq!(e.count, truth[&key]);
        }
    }

    #[test]
    fn test_full_table_never_drops_offers() {
        let mut rng = StdRng::seed_from_u64(5);
        for capacity in [1, 3, 128] {
            let mut ss = SpaceSaving::new(capacity);
            for i in 1..=20_000u64 {
                let key = rng.gen_range(0..1_000);
                ss.offer(key);
                assert!(ss.estimate(key).is_some(), "offer {i} of {key} was dropped");
                if i % 1_000 == 0 {
                    // every offer adds exactly one to the summed counts
                    let total: u64 = ss.iter().map(|(_, e)| e.count as u64).sum();
                    assert_eq!(total, i);
                }
            }
            assert_eq!(ss.len(), capacity);
        }
    }

    #[test]
    fn test_compaction_keeps_heap_bounded() {
        let mut ss = SpaceSaving::new(4);
        for i in 0..100_000u64 {
            ss.offer(i % 7);
        }
        assert!(ss.heap.len() <= MIN_COMPACT_LEN + 1);
        assert_eq!(ss.len(), 4);
    }
}
