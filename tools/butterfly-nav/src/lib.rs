//! Navigability estimation for road networks
//!
//! Estimates two exponents of a weighted graph:
//! - the growth dimension, from how fast shortest-path balls fill up
//! - the clustering exponent of long-distance contacts that minimizes the
//!   average greedy path length in a Kleinberg-style small-world model
//!
//! Shortest paths come from a contraction hierarchy ([`ch`]) built once per
//! network; everything random is driven by explicit `StdRng` streams.

pub mod ch;
pub mod cli;
pub mod clustering;
pub mod dimension;
pub mod error;
pub mod formats;
pub mod graph;
pub mod greedy;
pub mod highway;
pub mod lattice;
pub mod minimize;
pub mod network;
pub mod path_length;
pub mod results;
pub mod stability;

pub use ch::{ChQuery, ContractionHierarchy, TargetBuckets};
pub use clustering::{ClusteringExponentEstimator, ExponentEstimate, SearchConfig, SearchStatus};
pub use dimension::{
    estimate_optimal_dimension, minimize_tight_c, tight_c, DimensionConfig, DimensionEstimate,
};
pub use error::{NavError, Result};
pub use graph::{Ball, Graph};
pub use greedy::GreedyRouter;
pub use highway::{HighwayNetwork, RoutingParams};
pub use lattice::lattice;
pub use minimize::{Brent, Convergence, Minimum};
pub use network::NetworkStore;
pub use path_length::{AverageConfig, AverageEstimate, PathLengthEstimator};
pub use results::{CsvResults, ResultSink};
pub use stability::{Spread, StabilityWindow};
