//! Query sessions over a contraction hierarchy
//!
//! Key points:
//! 1. Version-stamped distances (O(1) reset between queries)
//! 2. Bidirectional point-to-point search with parent pointers for paths
//! 3. Sorted target buckets for one-to-many queries, shareable between
//!    sessions

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{ContractionHierarchy, UpwardCsr};

const NO_PARENT: u32 = u32::MAX;

/// Version-stamped distance entry with the arc that reached the node
#[derive(Clone, Copy)]
struct DistEntry {
    dist: u32,
    parent: u32,
    arc: u32,
    version: u32,
}

/// Reusable search state with version stamping
pub(crate) struct SearchState {
    entries: Vec<DistEntry>,
    version: u32,
    heap: BinaryHeap<Reverse<(u32, u32)>>,
}

impl SearchState {
    pub(crate) fn new(n_nodes: usize) -> Self {
        Self {
            entries: vec![
                DistEntry {
                    dist: u32::MAX,
                    parent: NO_PARENT,
                    arc: u32::MAX,
                    version: 0,
                };
                n_nodes
            ],
            version: 0,
            heap: BinaryHeap::with_capacity(1024),
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            // Version wrapped, need full reset
            for entry in &mut self.entries {
                entry.version = 0;
            }
            self.version = 1;
        }
        self.heap.clear();
    }

    #[inline(always)]
    pub(crate) fn dist(&self, node: u32) -> u32 {
        let entry = &self.entries[node as usize];
        if entry.version == self.version {
            entry.dist
        } else {
            u32::MAX
        }
    }

    /// `(parent, arc index)` of a reached non-root node
    fn parent(&self, node: u32) -> Option<(u32, u32)> {
        let entry = &self.entries[node as usize];
        if entry.version == self.version && entry.parent != NO_PARENT {
            Some((entry.parent, entry.arc))
        } else {
            None
        }
    }

    /// Lower the tentative distance of `node`; returns false when `dist`
    /// is no improvement.
    #[inline(always)]
    pub(crate) fn relax(&mut self, node: u32, dist: u32, parent: u32, arc: u32) -> bool {
        if dist >= self.dist(node) {
            return false;
        }
        self.entries[node as usize] = DistEntry {
            dist,
            parent,
            arc,
            version: self.version,
        };
        self.heap.push(Reverse((dist, node)));
        true
    }

    /// Next settled `(dist, node)`, skipping stale heap entries
    #[inline(always)]
    pub(crate) fn pop(&mut self) -> Option<(u32, u32)> {
        while let Some(Reverse((d, u))) = self.heap.pop() {
            if d <= self.dist(u) {
                return Some((d, u));
            }
        }
        None
    }

    /// Lower bound on the next settled distance
    fn min_key(&self) -> Option<u32> {
        self.heap.peek().map(|Reverse((d, _))| *d)
    }
}

/// Sorted bucket structure for O(log n) lookup
#[derive(Debug, Clone, Default)]
struct SortedBuckets {
    // Flat array of (node, target_idx, dist) sorted by node
    items: Vec<(u32, u32, u32)>,
}

impl SortedBuckets {
    fn add(&mut self, node: u32, target_idx: u32, dist: u32) {
        self.items.push((node, target_idx, dist));
    }

    fn sort(&mut self) {
        self.items.sort_unstable_by_key(|(node, _, _)| *node);
    }

    #[inline(always)]
    fn get(&self, node: u32) -> &[(u32, u32, u32)] {
        let start = self.items.partition_point(|(n, _, _)| *n < node);
        let end = self.items[start..].partition_point(|(n, _, _)| *n == node) + start;
        &self.items[start..end]
    }
}

/// Backward search spaces of a fixed target set
///
/// Built once and shared read-only by every session that needs distances
/// to the same targets.
#[derive(Debug, Clone, Default)]
pub struct TargetBuckets {
    targets: Vec<u32>,
    buckets: SortedBuckets,
}

impl TargetBuckets {
    pub fn build(ch: &ContractionHierarchy, targets: &[u32]) -> Self {
        let mut state = SearchState::new(ch.n_nodes as usize);
        let mut buckets = SortedBuckets::default();

        for (idx, &target) in targets.iter().enumerate() {
            state.reset();
            state.relax(target, 0, NO_PARENT, u32::MAX);

            while let Some((d, u)) = state.pop() {
                buckets.add(u, idx as u32, d);
                for i in ch.bwd.range(u) {
                    state.relax(ch.bwd.heads[i], d.saturating_add(ch.bwd.weights[i]), u, i as u32);
                }
            }
        }

        buckets.sort();

        Self {
            targets: targets.to_vec(),
            buckets,
        }
    }

    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Per-worker query session
///
/// ```ignore
/// let mut query = ChQuery::new(&ch);
/// query.reset().add_source(s).add_target(t).run();
/// let hops = query.node_path();
/// ```
pub struct ChQuery<'a> {
    ch: &'a ContractionHierarchy,
    sources: Vec<u32>,
    targets: Vec<u32>,
    forward: SearchState,
    backward: SearchState,
    meeting: Option<u32>,
    distance: u32,
    pinned: Option<TargetBuckets>,
    target_distances: Vec<u32>,
}

impl<'a> ChQuery<'a> {
    pub fn new(ch: &'a ContractionHierarchy) -> Self {
        let n = ch.n_nodes as usize;
        Self {
            ch,
            sources: Vec::new(),
            targets: Vec::new(),
            forward: SearchState::new(n),
            backward: SearchState::new(n),
            meeting: None,
            distance: u32::MAX,
            pinned: None,
            target_distances: Vec::new(),
        }
    }

    pub fn hierarchy(&self) -> &'a ContractionHierarchy {
        self.ch
    }

    /// Forget sources, targets and the last result (pinned targets stay)
    pub fn reset(&mut self) -> &mut Self {
        self.sources.clear();
        self.targets.clear();
        self.meeting = None;
        self.distance = u32::MAX;
        self
    }

    pub fn add_source(&mut self, node: u32) -> &mut Self {
        self.sources.push(node);
        self
    }

    pub fn add_target(&mut self, node: u32) -> &mut Self {
        self.targets.push(node);
        self
    }

    /// Prepare one-to-many queries towards `targets`
    pub fn pin_targets(&mut self, targets: &[u32]) -> &mut Self {
        self.pinned = Some(TargetBuckets::build(self.ch, targets));
        self
    }

    /// Bidirectional search between the current sources and targets
    pub fn run(&mut self) -> &mut Self {
        self.forward.reset();
        self.backward.reset();
        self.meeting = None;
        self.distance = u32::MAX;

        for &s in &self.sources {
            self.forward.relax(s, 0, NO_PARENT, u32::MAX);
        }
        for &t in &self.targets {
            self.backward.relax(t, 0, NO_PARENT, u32::MAX);
        }

        loop {
            let best = self.distance;
            let f_min = self.forward.min_key().filter(|&d| d < best);
            let b_min = self.backward.min_key().filter(|&d| d < best);

            let go_forward = match (f_min, b_min) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(f), Some(b)) => f <= b,
            };

            if go_forward {
                Self::step(
                    &mut self.forward,
                    &self.backward,
                    &self.ch.fwd,
                    &mut self.distance,
                    &mut self.meeting,
                );
            } else {
                Self::step(
                    &mut self.backward,
                    &self.forward,
                    &self.ch.bwd,
                    &mut self.distance,
                    &mut self.meeting,
                );
            }
        }

        self
    }

    /// Settle one node of `search`, checking it against the opposite side
    fn step(
        search: &mut SearchState,
        opposite: &SearchState,
        arcs: &UpwardCsr,
        best: &mut u32,
        meeting: &mut Option<u32>,
    ) {
        let Some((d, u)) = search.pop() else {
            return;
        };

        let other = opposite.dist(u);
        if other != u32::MAX {
            let total = d.saturating_add(other);
            if total < *best {
                *best = total;
                *meeting = Some(u);
            }
        }

        for i in arcs.range(u) {
            search.relax(arcs.heads[i], d.saturating_add(arcs.weights[i]), u, i as u32);
        }
    }

    /// One-to-many distances from the current sources to the pinned targets
    pub fn run_to_pinned_targets(&mut self) -> &mut Self {
        if let Some(pinned) = self.pinned.take() {
            self.search_buckets(&pinned);
            self.pinned = Some(pinned);
        } else {
            self.target_distances.clear();
        }
        self
    }

    /// Distances from `source` to every target of shared `buckets`, in
    /// target order; `u32::MAX` marks unreachable targets.
    pub fn distances_to(&mut self, source: u32, buckets: &TargetBuckets) -> &[u32] {
        self.reset().add_source(source);
        self.search_buckets(buckets);
        &self.target_distances
    }

    fn search_buckets(&mut self, buckets: &TargetBuckets) {
        self.target_distances.clear();
        self.target_distances.resize(buckets.len(), u32::MAX);

        self.forward.reset();
        for &s in &self.sources {
            self.forward.relax(s, 0, NO_PARENT, u32::MAX);
        }

        while let Some((d, u)) = self.forward.pop() {
            for &(_, idx, bd) in buckets.buckets.get(u) {
                let slot = &mut self.target_distances[idx as usize];
                *slot = (*slot).min(d.saturating_add(bd));
            }

            for i in self.ch.fwd.range(u) {
                let head = self.ch.fwd.heads[i];
                let dist = d.saturating_add(self.ch.fwd.weights[i]);
                self.forward.relax(head, dist, u, i as u32);
            }
        }
    }

    /// Shortest distance found by the last [`run`](Self::run), `u32::MAX` if
    /// no target is reachable
    pub fn distance(&self) -> u32 {
        self.distance
    }

    /// Distances computed by the last one-to-many query
    pub fn distances_to_targets(&self) -> &[u32] {
        &self.target_distances
    }

    /// Original-graph node sequence of the last [`run`](Self::run), from a
    /// source to a target, or empty when nothing was reachable.
    pub fn node_path(&self) -> Vec<u32> {
        let Some(meeting) = self.meeting else {
            return Vec::new();
        };

        // Forward half: arcs parent -> child, collected meeting-first
        let mut up_arcs = Vec::new();
        let mut node = meeting;
        while let Some((parent, arc)) = self.forward.parent(node) {
            up_arcs.push((parent, node, self.ch.fwd.middles[arc as usize]));
            node = parent;
        }

        let mut path = vec![node];
        for &(tail, head, middle) in up_arcs.iter().rev() {
            self.ch.unpack_arc(tail, head, middle, &mut path);
        }

        // Backward half: bwd[parent] holds the arc node -> parent
        let mut node = meeting;
        while let Some((parent, arc)) = self.backward.parent(node) {
            self.ch
                .unpack_arc(node, parent, self.ch.bwd.middles[arc as usize], &mut path);
            node = parent;
        }

        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -1-> 1 -1-> 2 -1-> 3 and a slow direct arc 0 -10-> 3
    fn chain() -> ContractionHierarchy {
        ContractionHierarchy::build(4, &[(0, 1, 1), (1, 2, 1), (2, 3, 1), (0, 3, 10)])
    }

    #[test]
    fn test_search_state_reset_forgets_distances() {
        let mut state = SearchState::new(3);
        state.reset();
        assert!(state.relax(1, 5, NO_PARENT, 0));
        assert!(!state.relax(1, 7, NO_PARENT, 0));
        assert_eq!(state.dist(1), 5);
        state.reset();
        assert_eq!(state.dist(1), u32::MAX);
    }

    #[test]
    fn test_point_to_point_directed() {
        let ch = chain();
        let mut query = ChQuery::new(&ch);

        query.reset().add_source(0).add_target(3).run();
        assert_eq!(query.distance(), 3);
        assert_eq!(query.node_path(), vec![0, 1, 2, 3]);

        query.reset().add_source(3).add_target(0).run();
        assert_eq!(query.distance(), u32::MAX);
        assert!(query.node_path().is_empty());
    }

    #[test]
    fn test_same_source_and_target() {
        let ch = chain();
        let mut query = ChQuery::new(&ch);
        query.reset().add_source(2).add_target(2).run();
        assert_eq!(query.distance(), 0);
        assert_eq!(query.node_path(), vec![2]);
    }

    #[test]
    fn test_pinned_targets_match_point_queries() {
        let ch = chain();
        let targets = [3, 0, 2];

        let mut query = ChQuery::new(&ch);
        query.pin_targets(&targets).reset().add_source(1).run_to_pinned_targets();
        assert_eq!(query.distances_to_targets(), &[2, u32::MAX, 1]);

        let buckets = TargetBuckets::build(&ch, &targets);
        assert_eq!(query.distances_to(0, &buckets), &[3, 0, 2]);
    }
}
