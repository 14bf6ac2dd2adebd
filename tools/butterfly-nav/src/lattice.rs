//! Hypercubic lattice builder
//!
//! Node `index` has coordinates given by its base-`side` digits, least
//! significant digit first. Every node links to its two axis neighbors per
//! dimension with weight 1; with `wrap_around` the lattice is a torus.

use crate::error::{NavError, Result};
use crate::graph::Graph;

pub fn lattice(side: u32, dimension: u32, wrap_around: bool) -> Result<Graph> {
    if side == 0 || dimension == 0 {
        return Err(NavError::InvalidParameter(format!(
            "lattice needs side >= 1 and dimension >= 1, got side {} dimension {}",
            side, dimension
        )));
    }

    let n_nodes = side.checked_pow(dimension).ok_or_else(|| {
        NavError::InvalidParameter(format!(
            "lattice {}^{} does not fit in u32 node ids",
            side, dimension
        ))
    })?;

    // Directed storage: both directions come from the per-node loop
    let mut graph = Graph::directed(n_nodes);
    let mut coords = vec![0u32; dimension as usize];

    for index in 0..n_nodes {
        index_to_coords(index, side, &mut coords);

        for d in 0..dimension as usize {
            let c = coords[d];

            if wrap_around || c > 0 {
                let mut next = coords.clone();
                next[d] = (c + side - 1) % side;
                graph.add_edge(index, coords_to_index(&next, side), 1);
            }

            if wrap_around || c + 1 < side {
                let mut next = coords.clone();
                next[d] = (c + 1) % side;
                graph.add_edge(index, coords_to_index(&next, side), 1);
            }
        }
    }

    Ok(graph)
}

fn index_to_coords(mut index: u32, side: u32, coords: &mut [u32]) {
    for c in coords.iter_mut() {
        *c = index % side;
        index /= side;
    }
}

fn coords_to_index(coords: &[u32], side: u32) -> u32 {
    coords.iter().rev().fold(0, |index, &c| index * side + c)
}
