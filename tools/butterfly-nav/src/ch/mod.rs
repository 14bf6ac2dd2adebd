//! Contraction hierarchy shortest-path oracle
//!
//! The hierarchy is built once per network and shared read-only between
//! workers; every worker owns a [`ChQuery`] session holding its mutable
//! search state.
//!
//! Both adjacency arrays are indexed by node id and only hold arcs towards
//! higher-ranked nodes:
//! - `fwd[u]` holds arcs `u -> v` with `rank[v] > rank[u]`
//! - `bwd[v]` holds arcs `u -> v` with `rank[u] > rank[v]`, stored with
//!   head `u` so the backward search can walk them in reverse

mod contraction;
mod query;

pub use query::{ChQuery, TargetBuckets};

pub(crate) use query::SearchState;

use tracing::trace;

/// Middle-node marker of an original (non-shortcut) arc
pub const NO_MIDDLE: u32 = u32::MAX;

/// Upward adjacency in CSR form
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpwardCsr {
    pub offsets: Vec<u64>,
    pub heads: Vec<u32>,
    pub weights: Vec<u32>,
    pub middles: Vec<u32>,
}

impl UpwardCsr {
    pub(crate) fn from_lists(lists: &[Vec<(u32, u32, u32)>]) -> Self {
        let mut csr = Self {
            offsets: Vec::with_capacity(lists.len() + 1),
            ..Self::default()
        };

        let mut offset = 0u64;
        for list in lists {
            csr.offsets.push(offset);
            for &(head, weight, middle) in list {
                csr.heads.push(head);
                csr.weights.push(weight);
                csr.middles.push(middle);
                offset += 1;
            }
        }
        csr.offsets.push(offset);

        csr
    }

    pub fn n_arcs(&self) -> usize {
        self.heads.len()
    }

    /// Arc index range of `node`
    #[inline(always)]
    pub fn range(&self, node: u32) -> std::ops::Range<usize> {
        let start = self.offsets[node as usize] as usize;
        let end = self.offsets[node as usize + 1] as usize;
        start..end
    }

    /// Arc index of `node -> head`, if present
    pub fn find(&self, node: u32, head: u32) -> Option<usize> {
        self.range(node).find(|&i| self.heads[i] == head)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionHierarchy {
    pub n_nodes: u32,
    /// Contraction order: `rank[v]` is the position at which `v` was contracted
    pub rank: Vec<u32>,
    pub fwd: UpwardCsr,
    pub bwd: UpwardCsr,
}

impl ContractionHierarchy {
    /// Contract a graph given as `(tail, head, weight)` arcs. Parallel arcs
    /// keep their minimum weight; self-loops are dropped.
    pub fn build(n_nodes: u32, arcs: &[(u32, u32, u32)]) -> Self {
        contraction::contract(n_nodes, arcs)
    }

    pub fn n_arcs(&self) -> usize {
        self.fwd.n_arcs() + self.bwd.n_arcs()
    }

    pub fn n_shortcuts(&self) -> usize {
        self.fwd
            .middles
            .iter()
            .chain(self.bwd.middles.iter())
            .filter(|&&m| m != NO_MIDDLE)
            .count()
    }

    /// Append the original-graph nodes of arc `tail -> head` (tail excluded,
    /// head included) to `path`, expanding shortcuts recursively.
    pub(crate) fn unpack_arc(&self, tail: u32, head: u32, middle: u32, path: &mut Vec<u32>) {
        if middle == NO_MIDDLE {
            path.push(head);
            return;
        }

        // tail -> middle was recorded in bwd[middle], middle -> head in fwd[middle]
        match self.bwd.find(middle, tail) {
            Some(i) => self.unpack_arc(tail, middle, self.bwd.middles[i], path),
            None => {
                trace!("Missing sub-arc {} -> {} while unpacking", tail, middle);
                path.push(middle);
            }
        }

        match self.fwd.find(middle, head) {
            Some(i) => self.unpack_arc(middle, head, self.fwd.middles[i], path),
            None => {
                trace!("Missing sub-arc {} -> {} while unpacking", middle, head);
                path.push(head);
            }
        }
    }
}
