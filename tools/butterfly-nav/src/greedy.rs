//! Greedy routing with long-distance contacts
//!
//! From the current node the walk moves either one hop along a shortest
//! path, or to the sampled long-distance contact closest to the
//! destination, whichever is strictly closer (the local hop wins ties).
//!
//! Local hops follow one shortest path until a contact wins, so every hop
//! either advances along that path or strictly shortens the remaining
//! distance. Zero-weight edges therefore cannot make the walk cycle.

use rand::Rng;
use tracing::trace;

use crate::ch::ChQuery;
use crate::error::{NavError, Result};
use crate::highway::HighwayNetwork;

pub struct GreedyRouter<'h, 'a> {
    highway: &'h HighwayNetwork<'a>,
}

impl<'h, 'a> GreedyRouter<'h, 'a> {
    pub fn new(highway: &'h HighwayNetwork<'a>) -> Self {
        Self { highway }
    }

    /// Shortest-path distance, `u32::MAX` when `t` is unreachable
    pub fn get_distance(&self, s: u32, t: u32, session: &mut ChQuery<'_>) -> u32 {
        distance(session, s, t)
    }

    /// Number of hops of one greedy walk from `start` to `end`
    pub fn greedy_path_length<R: Rng>(
        &self,
        start: u32,
        end: u32,
        rng: &mut R,
        session: &mut ChQuery<'_>,
    ) -> Result<u32> {
        let n_nodes = self.highway.n_nodes();
        for node in [start, end] {
            if node >= n_nodes {
                return Err(NavError::NodeOutOfRange { node, n_nodes });
            }
        }

        let mut current = start;
        let mut hops = 0u32;
        // Shortest path the local hops follow; `current` sits at `position`
        let mut path: Vec<u32> = Vec::new();
        let mut position = 0usize;

        while current != end {
            hops += 1;

            let mut long_distance = u32::MAX;
            let mut long_contact = current;
            self.highway
                .for_each_long_distance_contact(current, rng, session, |contact, session| {
                    let d = distance(session, contact, end);
                    if d < long_distance {
                        long_distance = d;
                        long_contact = contact;
                    }
                });

            if path.is_empty() {
                session.reset().add_source(current).add_target(end).run();
                path = session.node_path();
                position = 0;
            }
            let local = match path.get(position + 1) {
                Some(&next) => next,
                None => {
                    return Err(NavError::Unreachable {
                        from: current,
                        to: end,
                    })
                }
            };
            let local_distance = distance(session, local, end);

            if long_distance < local_distance {
                trace!(
                    "Hop {}: {} -> {} (long, {} left)",
                    hops,
                    current,
                    long_contact,
                    long_distance
                );
                current = long_contact;
                path.clear();
            } else {
                trace!(
                    "Hop {}: {} -> {} (local, {} left)",
                    hops,
                    current,
                    local,
                    local_distance
                );
                current = local;
                position += 1;
            }
        }

        Ok(hops)
    }
}

fn distance(session: &mut ChQuery<'_>, s: u32, t: u32) -> u32 {
    session.reset().add_source(s).add_target(t).run().distance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::ContractionHierarchy;
    use crate::graph::Graph;
    use crate::highway::RoutingParams;
    use crate::lattice::lattice;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(k: u32, q: u32, exponent: f64) -> RoutingParams {
        RoutingParams {
            k,
            q,
            clustering_exponent: exponent,
        }
    }

    #[test]
    fn test_same_node_is_zero_hops() {
        let ch = lattice(8, 1, true).unwrap().contraction_hierarchy();
        let mut highway = HighwayNetwork::new(&ch, params(2, 1, 2.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        highway.initialize(&mut rng);

        let router = GreedyRouter::new(&highway);
        let mut session = ChQuery::new(&ch);
        for s in 0..8 {
            assert_eq!(router.greedy_path_length(s, s, &mut rng, &mut session).unwrap(), 0);
        }
    }

    #[test]
    fn test_without_highways_walks_shortest_path() {
        let ch = lattice(10, 1, true).unwrap().contraction_hierarchy();
        // Empty highway set: only local hops
        let highway = HighwayNetwork::new(&ch, params(3, 1, 2.0)).unwrap();
        let router = GreedyRouter::new(&highway);
        let mut rng = StdRng::seed_from_u64(2);
        let mut session = ChQuery::new(&ch);

        assert_eq!(router.get_distance(0, 5, &mut session), 5);
        assert_eq!(router.greedy_path_length(0, 5, &mut rng, &mut session).unwrap(), 5);
        assert_eq!(router.greedy_path_length(2, 9, &mut rng, &mut session).unwrap(), 3);
    }

    #[test]
    fn test_contacts_never_lengthen_walk() {
        let ch = lattice(6, 2, true).unwrap().contraction_hierarchy();
        let mut highway = HighwayNetwork::new(&ch, params(1, 2, 1.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        highway.initialize(&mut rng);

        let router = GreedyRouter::new(&highway);
        let mut session = ChQuery::new(&ch);
        for (s, t) in [(0, 21), (5, 30), (14, 1)] {
            let hops = router.greedy_path_length(s, t, &mut rng, &mut session).unwrap();
            let shortest = router.get_distance(s, t, &mut session);
            assert!(hops >= 1 && hops <= shortest, "{} -> {}: {} hops", s, t, hops);
        }
    }

    #[test]
    fn test_unreachable_pair_is_an_error() {
        let ch = ContractionHierarchy::build(3, &[(0, 1, 1), (1, 0, 1)]);
        let highway = HighwayNetwork::new(&ch, params(1, 1, 2.0)).unwrap();
        let router = GreedyRouter::new(&highway);
        let mut rng = StdRng::seed_from_u64(4);
        let mut session = ChQuery::new(&ch);

        assert!(matches!(
            router.greedy_path_length(0, 2, &mut rng, &mut session),
            Err(NavError::Unreachable { from: 0, to: 2 })
        ));
        assert!(matches!(
            router.greedy_path_length(0, 7, &mut rng, &mut session),
            Err(NavError::NodeOutOfRange { node: 7, n_nodes: 3 })
        ));
    }

    /// Ring of `n` nodes plus random chords, weights drawn from `0..3`
    fn ring_with_chords(n: u32, rng: &mut StdRng) -> ContractionHierarchy {
        let mut graph = Graph::new(n);
        for u in 0..n {
            graph.add_edge(u, (u + 1) % n, rng.random_range(0..3));
        }
        for _ in 0..n / 2 {
            let u = rng.random_range(0..n);
            let v = rng.random_range(0..n);
            if u != v {
                graph.add_edge(u, v, rng.random_range(0..3));
            }
        }
        graph.contraction_hierarchy()
    }

    #[test]
    fn test_zero_weight_edges_terminate() {
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..100 {
            let ch = ring_with_chords(12, &mut rng);
            let mut highway = HighwayNetwork::new(&ch, params(3, 1, 2.0)).unwrap();
            highway.initialize(&mut rng);

            let router = GreedyRouter::new(&highway);
            let mut session = ChQuery::new(&ch);
            for s in 0..12 {
                for t in 0..12 {
                    let hops = router.greedy_path_length(s, t, &mut rng, &mut session).unwrap();
                    assert_eq!(hops == 0, s == t, "{} -> {}: {} hops", s, t, hops);
                }
            }
        }
    }

    #[test]
    fn test_all_zero_ring_walks_one_path() {
        let mut graph = Graph::new(10);
        for u in 0..10 {
            graph.add_edge(u, (u + 1) % 10, 0);
        }
        let ch = graph.contraction_hierarchy();
        let mut highway = HighwayNetwork::new(&ch, params(1, 2, 2.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(10);
        highway.initialize(&mut rng);

        let router = GreedyRouter::new(&highway);
        let mut session = ChQuery::new(&ch);
        // No contact is ever strictly closer than distance 0
        for t in 1..10 {
            let hops = router.greedy_path_length(0, t, &mut rng, &mut session).unwrap();
            assert!(hops >= 1, "0 -> {}: {} hops", t, hops);
        }
    }
}
