//! Node contraction with witness search
//!
//! Nodes are contracted in order of a lazily updated importance (edge
//! difference plus number of already contracted neighbors). A shortcut
//! `u -> x` via `v` is added unless a witness search from `u` that avoids
//! `v` finds a path at most as long; searches that hit the settle limit
//! add the shortcut.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{ContractionHierarchy, SearchState, UpwardCsr, NO_MIDDLE};

/// Settled nodes per witness search
const WITNESS_SETTLE_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy)]
struct WorkArc {
    weight: u32,
    middle: u32,
}

/// Remaining (uncontracted) graph, indexed both ways
struct WorkingGraph {
    out_arcs: Vec<FxHashMap<u32, WorkArc>>,
    in_arcs: Vec<FxHashMap<u32, WorkArc>>,
}

impl WorkingGraph {
    fn new(n_nodes: usize) -> Self {
        Self {
            out_arcs: vec![FxHashMap::default(); n_nodes],
            in_arcs: vec![FxHashMap::default(); n_nodes],
        }
    }

    /// Insert `u -> v`, keeping the lighter arc when one already exists
    fn add_arc(&mut self, u: u32, v: u32, weight: u32, middle: u32) {
        if u == v {
            return;
        }

        let arc = WorkArc { weight, middle };
        let improved = match self.out_arcs[u as usize].get(&v) {
            Some(existing) => weight < existing.weight,
            None => true,
        };

        if improved {
            self.out_arcs[u as usize].insert(v, arc);
            self.in_arcs[v as usize].insert(u, arc);
        }
    }

    /// Dijkstra from `source` avoiding `avoid`, bounded by distance and
    /// settle count. Tentative distances left in `state` are lengths of real
    /// paths, so any of them can serve as a witness.
    fn witness_search(&self, source: u32, avoid: u32, max_dist: u32, state: &mut SearchState) {
        state.reset();
        state.relax(source, 0, u32::MAX, u32::MAX);

        let mut settled = 0usize;
        while let Some((d, u)) = state.pop() {
            if d > max_dist || settled >= WITNESS_SETTLE_LIMIT {
                break;
            }
            settled += 1;

            for (&v, arc) in &self.out_arcs[u as usize] {
                if v == avoid {
                    continue;
                }
                state.relax(v, d.saturating_add(arc.weight), u, u32::MAX);
            }
        }
    }

    /// Shortcuts `(tail, head, weight)` needed to contract `v`
    fn shortcuts_for(&self, v: u32, state: &mut SearchState) -> Vec<(u32, u32, u32)> {
        let outs: Vec<(u32, u32)> = self.out_arcs[v as usize]
            .iter()
            .map(|(&x, arc)| (x, arc.weight))
            .collect();
        let mut shortcuts = Vec::new();

        let Some(max_out) = outs.iter().map(|&(_, w)| w).max() else {
            return shortcuts;
        };

        for (&u, in_arc) in &self.in_arcs[v as usize] {
            self.witness_search(u, v, in_arc.weight.saturating_add(max_out), state);

            for &(x, w_out) in &outs {
                if x == u {
                    continue;
                }
                let via = in_arc.weight.saturating_add(w_out);
                if state.dist(x) > via {
                    shortcuts.push((u, x, via));
                }
            }
        }

        shortcuts
    }

    fn degree(&self, v: u32) -> usize {
        self.out_arcs[v as usize].len() + self.in_arcs[v as usize].len()
    }
}

fn importance(graph: &WorkingGraph, v: u32, deleted: &[u32], state: &mut SearchState) -> i64 {
    let added = graph.shortcuts_for(v, state).len() as i64;
    added - graph.degree(v) as i64 + deleted[v as usize] as i64
}

pub(super) fn contract(n_nodes: u32, arcs: &[(u32, u32, u32)]) -> ContractionHierarchy {
    let n = n_nodes as usize;
    let mut graph = WorkingGraph::new(n);
    for &(u, v, w) in arcs {
        graph.add_arc(u, v, w, NO_MIDDLE);
    }

    let mut state = SearchState::new(n);
    let mut deleted = vec![0u32; n];

    let mut queue: BinaryHeap<Reverse<(i64, u32)>> = (0..n_nodes)
        .map(|v| Reverse((importance(&graph, v, &deleted, &mut state), v)))
        .collect();

    let mut contracted = vec![false; n];
    let mut rank = vec![0u32; n];
    let mut fwd_lists: Vec<Vec<(u32, u32, u32)>> = vec![Vec::new(); n];
    let mut bwd_lists: Vec<Vec<(u32, u32, u32)>> = vec![Vec::new(); n];
    let mut next_rank = 0u32;
    let mut n_shortcuts = 0usize;

    while let Some(Reverse((_, v))) = queue.pop() {
        if contracted[v as usize] {
            continue;
        }

        // Lazy update: re-queue if the node got less attractive
        let current = importance(&graph, v, &deleted, &mut state);
        if let Some(Reverse((next, _))) = queue.peek() {
            if current > *next {
                queue.push(Reverse((current, v)));
                continue;
            }
        }

        let shortcuts = graph.shortcuts_for(v, &mut state);

        let mut outs: Vec<(u32, u32, u32)> = graph.out_arcs[v as usize]
            .drain()
            .map(|(x, arc)| (x, arc.weight, arc.middle))
            .collect();
        let mut ins: Vec<(u32, u32, u32)> = graph.in_arcs[v as usize]
            .drain()
            .map(|(u, arc)| (u, arc.weight, arc.middle))
            .collect();
        outs.sort_unstable();
        ins.sort_unstable();

        for &(x, _, _) in &outs {
            graph.in_arcs[x as usize].remove(&v);
            deleted[x as usize] += 1;
        }
        for &(u, _, _) in &ins {
            graph.out_arcs[u as usize].remove(&v);
            deleted[u as usize] += 1;
        }

        n_shortcuts += shortcuts.len();
        for (u, x, w) in shortcuts {
            graph.add_arc(u, x, w, v);
        }

        fwd_lists[v as usize] = outs;
        bwd_lists[v as usize] = ins;
        contracted[v as usize] = true;
        rank[v as usize] = next_rank;
        next_rank += 1;
    }

    debug!(
        "Contracted {} nodes, {} input arcs, {} shortcuts",
        n_nodes,
        arcs.len(),
        n_shortcuts
    );

    ContractionHierarchy {
        n_nodes,
        rank,
        fwd: UpwardCsr::from_lists(&fwd_lists),
        bwd: UpwardCsr::from_lists(&bwd_lists),
    }
}
