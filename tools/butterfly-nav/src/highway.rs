//! Highway nodes and long-distance contacts
//!
//! A random subset of nodes (each independently with probability `1/k`)
//! are highway nodes. A highway node draws `k * Q` long-distance contacts
//! among the other highway nodes, with probability proportional to
//! `distance^(-clustering_exponent)`. Contacts are drawn afresh on every
//! routing step and never cached.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use tracing::debug;

use crate::ch::{ChQuery, ContractionHierarchy, TargetBuckets};
use crate::error::{NavError, Result};

/// Parameters of the long-range link model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingParams {
    /// Highway nodes make up `1/k` of the network
    pub k: u32,
    /// Contacts per highway node are `k * q`
    pub q: u32,
    pub clustering_exponent: f64,
}

impl RoutingParams {
    /// Conventional parameters for a network of `n_nodes`: `k = round(log2(n))`
    pub fn for_network(n_nodes: u32, q: u32, clustering_exponent: f64) -> Self {
        Self {
            k: default_k(n_nodes),
            q,
            clustering_exponent,
        }
    }

    pub fn with_exponent(self, clustering_exponent: f64) -> Self {
        Self {
            clustering_exponent,
            ..self
        }
    }

    pub fn contacts_per_node(&self) -> u32 {
        self.k.saturating_mul(self.q)
    }

    fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(NavError::InvalidParameter("k must be positive".to_string()));
        }
        if !self.clustering_exponent.is_finite() {
            return Err(NavError::InvalidParameter(format!(
                "clustering exponent {} is not finite",
                self.clustering_exponent
            )));
        }
        Ok(())
    }
}

/// `round(log2(n))`, at least 1
pub fn default_k(n_nodes: u32) -> u32 {
    if n_nodes < 2 {
        return 1;
    }
    ((n_nodes as f64).log2().round() as u32).max(1)
}

pub struct HighwayNetwork<'a> {
    ch: &'a ContractionHierarchy,
    params: RoutingParams,
    is_highway: Vec<bool>,
    nodes: Vec<u32>,
    buckets: TargetBuckets,
}

impl<'a> HighwayNetwork<'a> {
    /// Network with an empty highway set; call [`initialize`](Self::initialize)
    /// before routing.
    pub fn new(ch: &'a ContractionHierarchy, params: RoutingParams) -> Result<Self> {
        params.validate()?;
        if ch.n_nodes == 0 {
            return Err(NavError::InvalidParameter(
                "cannot route on an empty network".to_string(),
            ));
        }

        Ok(Self {
            ch,
            params,
            is_highway: vec![false; ch.n_nodes as usize],
            nodes: Vec::new(),
            buckets: TargetBuckets::default(),
        })
    }

    pub fn hierarchy(&self) -> &'a ContractionHierarchy {
        self.ch
    }

    pub fn params(&self) -> &RoutingParams {
        &self.params
    }

    pub fn n_nodes(&self) -> u32 {
        self.ch.n_nodes
    }

    /// Resample the highway set from scratch
    pub fn initialize<R: Rng>(&mut self, rng: &mut R) {
        let p = 1.0 / self.params.k as f64;

        self.nodes.clear();
        for (node, flag) in self.is_highway.iter_mut().enumerate() {
            *flag = rng.random::<f64>() < p;
            if *flag {
                self.nodes.push(node as u32);
            }
        }

        self.buckets = TargetBuckets::build(self.ch, &self.nodes);
        debug!("Resampled {} highway nodes", self.nodes.len());
    }

    pub fn is_highway(&self, node: u32) -> bool {
        self.is_highway[node as usize]
    }

    pub fn highway_nodes(&self) -> &[u32] {
        &self.nodes
    }

    /// Draw the long-distance contacts of `u` and pass each one, in draw
    /// order, to `callback` together with the session. Returns the number
    /// of draws: 0 when `u` is not a highway node or no other highway node
    /// is reachable.
    pub fn for_each_long_distance_contact<'q, R, F>(
        &self,
        u: u32,
        rng: &mut R,
        session: &mut ChQuery<'q>,
        mut callback: F,
    ) -> usize
    where
        R: Rng,
        F: FnMut(u32, &mut ChQuery<'q>),
    {
        if !self.is_highway(u) {
            return 0;
        }

        let distances = session.distances_to(u, &self.buckets);
        let weights: Vec<f64> = self
            .nodes
            .iter()
            .zip(distances)
            .map(|(&node, &distance)| {
                if node == u || distance == u32::MAX {
                    0.0
                } else {
                    (distance.max(1) as f64).powf(-self.params.clustering_exponent)
                }
            })
            .collect();

        let distribution = match WeightedIndex::new(&weights) {
            Ok(distribution) => distribution,
            Err(e) => {
                debug!("No long-distance contact for highway node {}: {}", u, e);
                return 0;
            }
        };

        let draws = self.params.contacts_per_node() as usize;
        let contacts: Vec<u32> = (0..draws)
            .map(|_| self.nodes[distribution.sample(rng)])
            .collect();

        for contact in contacts {
            callback(contact, session);
        }

        draws
    }
}
