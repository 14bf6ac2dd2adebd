//! Search for the clustering exponent minimizing greedy path length
//!
//! Every objective evaluation builds a fresh [`PathLengthEstimator`] for the
//! candidate exponent; nothing but the oracle is shared between evaluations.

use tracing::{debug, info};

use crate::ch::ContractionHierarchy;
use crate::error::{NavError, Result};
use crate::highway::RoutingParams;
use crate::minimize::{Brent, Convergence};
use crate::path_length::{AverageConfig, AverageEstimate, PathLengthEstimator};
use crate::results::ResultSink;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub guess: f64,
    pub lower: f64,
    pub upper: f64,
    /// Stop once the bracket is narrower than this
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            guess: 1.5,
            lower: 0.01,
            upper: 2.5,
            tolerance: 5e-3,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Converged,
    CutOff,
    /// The guess did not bracket a minimum; the best sampled point is reported
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentEstimate {
    pub exponent: f64,
    pub status: SearchStatus,
    /// Average path length evaluations performed
    pub evaluations: u32,
}

pub struct ClusteringExponentEstimator<'a> {
    name: String,
    ch: &'a ContractionHierarchy,
    params: RoutingParams,
    average: AverageConfig,
    search: SearchConfig,
    seed: Option<u64>,
    sink: Option<&'a dyn ResultSink>,
}

impl<'a> ClusteringExponentEstimator<'a> {
    pub fn new(
        name: impl Into<String>,
        ch: &'a ContractionHierarchy,
        params: RoutingParams,
    ) -> Self {
        Self {
            name: name.into(),
            ch,
            params,
            average: AverageConfig::for_exponent_search(),
            search: SearchConfig::default(),
            seed: None,
            sink: None,
        }
    }

    pub fn with_average_config(mut self, average: AverageConfig) -> Self {
        self.average = average;
        self
    }

    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Derive every evaluation's RNG from `seed` and the exponent
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn ResultSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Converged average greedy path length at `exponent`
    pub fn average_at(&self, exponent: f64) -> Result<AverageEstimate> {
        let params = self.params.with_exponent(exponent);
        let mut estimator =
            PathLengthEstimator::new(&self.name, self.ch, params, self.average.clone())?;

        if let Some(seed) = self.seed {
            estimator = estimator.with_seed(evaluation_seed(seed, exponent));
        }
        if let Some(sink) = self.sink {
            estimator = estimator.with_sink(sink);
        }

        estimator.get_average_greedy_path_length()
    }

    pub fn estimate_optimal_clustering_exponent(&self) -> Result<ExponentEstimate> {
        let SearchConfig {
            guess,
            lower,
            upper,
            tolerance,
            max_iterations,
        } = self.search;

        if !(lower < upper) {
            return Err(NavError::InvalidParameter(format!(
                "empty exponent interval [{}, {}]",
                lower, upper
            )));
        }

        let margin = 1e-3 * (upper - lower);
        let start = guess.clamp(lower + margin, upper - margin);
        if start != guess {
            debug!("Moved guess {} inside [{}, {}]: {}", guess, lower, upper, start);
        }

        let brent = Brent::new(lower, upper, tolerance, max_iterations);
        let mut evaluations = 0u32;
        let result = brent.minimize(
            |exponent| {
                evaluations += 1;
                self.average_at(exponent).map(|estimate| estimate.average)
            },
            start,
        );

        let estimate = match result {
            Ok(minimum) => ExponentEstimate {
                exponent: minimum.x,
                status: match minimum.status {
                    Convergence::Converged => SearchStatus::Converged,
                    Convergence::CutOff => SearchStatus::CutOff,
                },
                evaluations,
            },
            Err(NavError::NotBracketed {
                lower,
                guess,
                upper,
                f_lower,
                f_guess,
                f_upper,
            }) => {
                let (exponent, _) = [(guess, f_guess), (lower, f_lower), (upper, f_upper)]
                    .into_iter()
                    .fold((guess, f64::INFINITY), |best, point| {
                        if point.1 < best.1 {
                            point
                        } else {
                            best
                        }
                    });
                ExponentEstimate {
                    exponent,
                    status: SearchStatus::Boundary,
                    evaluations,
                }
            }
            Err(e) => return Err(e),
        };

        info!(
            "Optimal clustering exponent for {}: {} ({:?}, {} evaluations)",
            self.name, estimate.exponent, estimate.status, estimate.evaluations
        );

        Ok(estimate)
    }
}

/// Seed of the evaluation at `exponent`: SplitMix64 of the base seed mixed
/// with the exponent's bits
fn evaluation_seed(seed: u64, exponent: f64) -> u64 {
    let mut z = (seed ^ exponent.to_bits()).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::lattice;

    fn small_average() -> AverageConfig {
        AverageConfig {
            batch_size: 16,
            fractional_tolerance: 2e-2,
            min_window: 10,
            max_iterations: 200,
            workers: 2,
        }
    }

    #[test]
    fn test_evaluation_seed_depends_on_both_inputs() {
        assert_eq!(evaluation_seed(1, 1.5), evaluation_seed(1, 1.5));
        assert_ne!(evaluation_seed(1, 1.5), evaluation_seed(2, 1.5));
        assert_ne!(evaluation_seed(1, 1.5), evaluation_seed(1, 1.6));
    }

    #[test]
    fn test_average_at_is_reproducible() {
        let ch = lattice(10, 1, true).unwrap().contraction_hierarchy();
        let params = RoutingParams::for_network(10, 1, 1.5);
        let estimator = ClusteringExponentEstimator::new("ring", &ch, params)
            .with_average_config(small_average())
            .with_seed(99);

        let a = estimator.average_at(1.2).unwrap();
        let b = estimator.average_at(1.2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_empty_interval() {
        let ch = lattice(10, 1, true).unwrap().contraction_hierarchy();
        let params = RoutingParams::for_network(10, 1, 1.5);
        let estimator = ClusteringExponentEstimator::new("ring", &ch, params)
            .with_search_config(SearchConfig {
                lower: 2.0,
                upper: 1.0,
                ..SearchConfig::default()
            });
        assert!(matches!(
            estimator.estimate_optimal_clustering_exponent(),
            Err(NavError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_search_stays_in_interval() {
        let ch = lattice(12, 1, true).unwrap().contraction_hierarchy();
        let search = SearchConfig {
            tolerance: 0.5,
            max_iterations: 10,
            ..SearchConfig::default()
        };
        let params = RoutingParams::for_network(12, 1, 1.5);
        let estimator = ClusteringExponentEstimator::new("ring", &ch, params)
            .with_average_config(small_average())
            .with_search_config(search.clone())
            .with_seed(3);

        let estimate = estimator.estimate_optimal_clustering_exponent().unwrap();
        assert!(estimate.exponent >= search.lower && estimate.exponent <= search.upper);
        assert!(estimate.evaluations >= 3);
    }

    /// Single node: every walk has length 0 at any exponent
    fn flat_estimator(ch: &ContractionHierarchy, guess: f64) -> ClusteringExponentEstimator<'_> {
        ClusteringExponentEstimator::new("solo", ch, RoutingParams::for_network(1, 1, 1.5))
            .with_average_config(small_average())
            .with_search_config(SearchConfig {
                guess,
                ..SearchConfig::default()
            })
            .with_seed(1)
    }

    #[test]
    fn test_flat_objective_reports_boundary() {
        let ch = ContractionHierarchy::build(1, &[]);
        let estimate = flat_estimator(&ch, 1.5)
            .estimate_optimal_clustering_exponent()
            .unwrap();

        // Ties keep the guess, the first point considered
        assert_eq!(estimate.status, SearchStatus::Boundary);
        assert_eq!(estimate.exponent, 1.5);
        assert_eq!(estimate.evaluations, 3);
    }

    #[test]
    fn test_guess_outside_interval_is_clamped() {
        let ch = ContractionHierarchy::build(1, &[]);
        let search = SearchConfig::default();

        let high = flat_estimator(&ch, 7.0)
            .estimate_optimal_clustering_exponent()
            .unwrap();
        assert_eq!(high.status, SearchStatus::Boundary);
        assert!(high.exponent < search.upper && high.exponent > search.upper - 0.01);

        let low = flat_estimator(&ch, -1.0)
            .estimate_optimal_clustering_exponent()
            .unwrap();
        assert!(low.exponent > search.lower && low.exponent < search.lower + 0.01);
    }
}
