//! Weighted adjacency graph and ball-growth sampling
//!
//! Nodes are dense `u32` indices `0..n`. Undirected graphs store every
//! edge in both adjacency directions; re-adding an edge overwrites its
//! weight.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::FxHashMap;

use crate::ch::ContractionHierarchy;

/// One step of ball growth around a fixed source: after settling all nodes
/// up to `distance`, `count` nodes (source excluded) have been discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ball {
    pub distance: u32,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct Graph {
    neighbors: Vec<FxHashMap<u32, u32>>,
    directed: bool,
    n_edges: usize,
}

impl Graph {
    /// Undirected graph with `n_nodes` isolated nodes
    pub fn new(n_nodes: u32) -> Self {
        Self::with_direction(n_nodes, false)
    }

    /// Directed graph with `n_nodes` isolated nodes
    pub fn directed(n_nodes: u32) -> Self {
        Self::with_direction(n_nodes, true)
    }

    fn with_direction(n_nodes: u32, directed: bool) -> Self {
        Self {
            neighbors: vec![FxHashMap::default(); n_nodes as usize],
            directed,
            n_edges: 0,
        }
    }

    pub fn add_edge(&mut self, u: u32, v: u32, weight: u32) {
        self.n_edges += 1;
        self.neighbors[u as usize].insert(v, weight);

        if !self.directed {
            self.neighbors[v as usize].insert(u, weight);
        }
    }

    pub fn neighbors(&self, u: u32) -> &FxHashMap<u32, u32> {
        &self.neighbors[u as usize]
    }

    pub fn size(&self) -> u32 {
        self.neighbors.len() as u32
    }

    /// Number of `add_edge` calls (an undirected edge counts once)
    pub fn num_edges(&self) -> usize {
        self.n_edges
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// All stored arcs `(tail, head, weight)`; undirected edges appear once
    /// per direction.
    pub fn arcs(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.neighbors.iter().enumerate().flat_map(|(u, adj)| {
            adj.iter().map(move |(&v, &w)| (u as u32, v, w))
        })
    }

    /// Build the shortest-path oracle over this graph's arcs
    pub fn contraction_hierarchy(&self) -> ContractionHierarchy {
        let arcs: Vec<(u32, u32, u32)> = self.arcs().collect();
        ContractionHierarchy::build(self.size(), &arcs)
    }

    /// Dijkstra from `source`, emitting one [`Ball`] per settled node other
    /// than the source, in settle order. Nodes unreachable from `source`
    /// are not reported.
    pub fn balls(&self, source: u32) -> Vec<Ball> {
        let mut visited = vec![false; self.neighbors.len()];
        let mut balls = Vec::new();
        let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();
        heap.push(Reverse((0, source)));

        let mut visited_count = 0u32;
        while let Some(Reverse((distance, node))) = heap.pop() {
            if visited[node as usize] {
                continue;
            }

            visited[node as usize] = true;
            if node != source {
                visited_count += 1;
                balls.push(Ball {
                    distance,
                    count: visited_count,
                });
            }

            for (&neighbor, &weight) in &self.neighbors[node as usize] {
                if !visited[neighbor as usize] {
                    heap.push(Reverse((distance.saturating_add(weight), neighbor)));
                }
            }
        }

        balls
    }

    /// Number of nodes reachable from `source`, source included
    pub fn connected_component_size(&self, source: u32) -> u32 {
        let mut visited = vec![false; self.neighbors.len()];
        let mut queue = VecDeque::new();
        queue.push_back(source);

        let mut visited_count = 0u32;
        while let Some(node) = queue.pop_front() {
            if visited[node as usize] {
                continue;
            }

            visited[node as usize] = true;
            visited_count += 1;

            for &neighbor in self.neighbors[node as usize].keys() {
                if !visited[neighbor as usize] {
                    queue.push_back(neighbor);
                }
            }
        }

        visited_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -1- 1 -2- 2 -1- 3, plus a shortcut 0 -5- 3 and an isolated node 4
    fn sample_graph() -> Graph {
        let mut g = Graph::new(5);
        g.add_edge(0, 1, 1);
        g.add_edge(1, 2, 2);
        g.add_edge(2, 3, 1);
        g.add_edge(0, 3, 5);
        g
    }

    #[test]
    fn test_undirected_edges_are_mirrored() {
        let g = sample_graph();
        assert_eq!(g.neighbors(1).get(&0), Some(&1));
        assert_eq!(g.neighbors(0).get(&1), Some(&1));
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.arcs().count(), 8);
    }

    #[test]
    fn test_directed_edges_are_not_mirrored() {
        let mut g = Graph::directed(2);
        g.add_edge(0, 1, 3);
        assert_eq!(g.neighbors(0).get(&1), Some(&3));
        assert!(g.neighbors(1).is_empty());
    }

    #[test]
    fn test_readding_edge_overwrites_weight() {
        let mut g = Graph::new(2);
        g.add_edge(0, 1, 7);
        g.add_edge(1, 0, 2);
        assert_eq!(g.neighbors(0).get(&1), Some(&2));
        assert_eq!(g.neighbors(1).get(&0), Some(&2));
    }

    #[test]
    fn test_balls_ranks_and_distances() {
        let g = sample_graph();
        let balls = g.balls(0);

        // 4 is unreachable and the source is omitted
        assert_eq!(
            balls,
            vec![
                Ball { distance: 1, count: 1 },
                Ball { distance: 3, count: 2 },
                Ball { distance: 4, count: 3 },
            ]
        );
    }

    #[test]
    fn test_balls_ties_get_increasing_counts() {
        // Star: every leaf at distance 1
        let mut g = Graph::new(5);
        for leaf in 1..5 {
            g.add_edge(0, leaf, 1);
        }
        let balls = g.balls(0);
        let counts: Vec<u32> = balls.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 2, 3, 4]);
        assert!(balls.iter().all(|b| b.distance == 1));
    }

    #[test]
    fn test_connected_component_size() {
        let g = sample_graph();
        assert_eq!(g.connected_component_size(0), 4);
        assert_eq!(g.connected_component_size(4), 1);
    }
}
