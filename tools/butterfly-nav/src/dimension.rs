//! Growth-dimension estimation from ball data
//!
//! For a ball sequence `(distance, count)` around a node, the fitted
//! exponent `alpha` is the one that makes `count / distance^alpha` as flat
//! as possible (smallest max/min ratio). The network's dimension is the
//! median of per-node fits over random sample nodes, sampled until the
//! median stops moving.

use rand::Rng;
use tracing::debug;

use crate::error::{NavError, Result};
use crate::graph::{Ball, Graph};
use crate::minimize::{Brent, Convergence};
use crate::stability::{Spread, StabilityWindow};

/// Search interval of the per-node fit
pub const ALPHA_LOWER: f64 = 0.001;
pub const ALPHA_UPPER: f64 = 5.0;

/// Iteration cap of the per-node fit
const FIT_MAX_ITERATIONS: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionConfig {
    /// Starting point of the first per-node fit
    pub guess: f64,
    /// Ignore balls with `count <= skip`
    pub skip: u32,
    /// Ignore balls closer than this
    pub min_distance: u32,
    /// Per-node fit tolerance and allowed drift of the running median
    pub tolerance: f64,
    /// Accepted samples the median must hold still for
    pub window: u32,
    /// Sample nodes tried before giving up
    pub max_attempts: u32,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            guess: 1.5,
            skip: 0,
            min_distance: 0,
            tolerance: 2e-3,
            window: 100,
            max_attempts: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionEstimate {
    pub dimension: f64,
    /// Accepted per-node fits
    pub samples: usize,
    /// Sample nodes whose fit was rejected
    pub discarded: usize,
    pub status: Convergence,
}

/// Max/min ratio of `count / distance^alpha` over the balls that pass the
/// filter, or `None` when no ball yields a finite value.
pub fn tight_c(balls: &[Ball], alpha: f64, skip: u32, min_distance: u32) -> Option<f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for ball in balls {
        if ball.count <= skip || ball.distance < min_distance {
            continue;
        }

        let value = ball.count as f64 / (ball.distance as f64).powf(alpha);
        if !value.is_finite() {
            continue;
        }

        min = min.min(value);
        max = max.max(value);
    }

    if min.is_finite() {
        Some(max / min)
    } else {
        None
    }
}

/// Fit the growth exponent of one ball sequence with Brent's method over
/// `[0.001, 5.0]`, starting at `guess`.
pub fn minimize_tight_c(
    balls: &[Ball],
    guess: f64,
    skip: u32,
    min_distance: u32,
    tolerance: f64,
) -> Result<f64> {
    let no_usable = || NavError::NoUsableBalls { skip, min_distance };

    if tight_c(balls, guess, skip, min_distance).is_none() {
        return Err(no_usable());
    }

    let brent = Brent::new(ALPHA_LOWER, ALPHA_UPPER, tolerance, FIT_MAX_ITERATIONS);
    let minimum = brent.minimize(
        |alpha| tight_c(balls, alpha, skip, min_distance).ok_or_else(no_usable),
        guess,
    )?;

    Ok(minimum.x)
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Median of per-node growth exponents over uniformly random sample nodes
///
/// Samples whose fit is rejected are discarded. Sampling stops once the
/// running median has stayed within `tolerance` for `window` accepted
/// samples, or after `max_attempts` sample nodes (status `CutOff`).
pub fn estimate_optimal_dimension<R: Rng>(
    graph: &Graph,
    config: &DimensionConfig,
    rng: &mut R,
) -> Result<DimensionEstimate> {
    if graph.size() == 0 {
        return Err(NavError::InvalidParameter(
            "cannot estimate the dimension of an empty graph".to_string(),
        ));
    }

    let mut current = config.guess;
    let mut window = StabilityWindow::new(Spread::Absolute, config.tolerance);
    // Kept sorted so the median is a lookup
    let mut samples: Vec<f64> = Vec::new();
    let mut discarded = 0usize;
    let mut status = Convergence::CutOff;

    for _ in 0..config.max_attempts {
        let node = rng.random_range(0..graph.size());
        let balls = graph.balls(node);

        let alpha = match minimize_tight_c(
            &balls,
            current,
            config.skip,
            config.min_distance,
            config.tolerance,
        ) {
            Ok(alpha) => alpha,
            Err(NavError::NotBracketed { .. }) | Err(NavError::NoUsableBalls { .. }) => {
                debug!("Discarding sample node {}", node);
                discarded += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let at = samples.partition_point(|&s| s < alpha);
        samples.insert(at, alpha);
        current = median(&samples);

        debug!("Iteration: {}, Alpha: {}", samples.len(), current);

        window.observe(current);
        if window.held() >= config.window {
            status = Convergence::Converged;
            break;
        }
    }

    Ok(DimensionEstimate {
        dimension: current,
        samples: samples.len(),
        discarded,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::lattice;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Balls growing exactly like `1000 * d^a0`
    fn synthetic_balls(a0: f64) -> Vec<Ball> {
        (1..=200u32)
            .map(|d| Ball {
                distance: d,
                count: (1000.0 * (d as f64).powf(a0)).round() as u32,
            })
            .collect()
    }

    #[test]
    fn test_tight_c_filters() {
        let balls = vec![
            Ball { distance: 1, count: 1 },
            Ball { distance: 2, count: 4 },
            Ball { distance: 4, count: 16 },
        ];
        assert_eq!(tight_c(&balls, 2.0, 0, 0), Some(1.0));
        assert_eq!(tight_c(&balls, 1.0, 0, 0), Some(4.0));
        assert_eq!(tight_c(&balls, 1.0, 1, 0), Some(2.0));
        assert_eq!(tight_c(&balls, 1.0, 0, 3), Some(1.0));
        assert_eq!(tight_c(&balls, 1.0, 16, 0), None);
        assert_eq!(tight_c(&[], 1.0, 0, 0), None);
    }

    #[test]
    fn test_tight_c_skips_zero_distance() {
        let balls = vec![
            Ball { distance: 0, count: 1 },
            Ball { distance: 2, count: 4 },
        ];
        assert_eq!(tight_c(&balls, 1.0, 0, 0), Some(1.0));
    }

    #[test]
    fn test_fit_recovers_exponent() {
        for a0 in [1.3, 1.7, 2.5] {
            let balls = synthetic_balls(a0);
            let alpha = minimize_tight_c(&balls, 1.5, 0, 0, 5e-4).unwrap();
            assert!((alpha - a0).abs() < 5e-3, "a0 = {}, fit = {}", a0, alpha);
        }
    }

    #[test]
    fn test_tight_c_minimal_at_true_exponent() {
        let a0 = 1.7;
        let balls = synthetic_balls(a0);
        let at_truth = tight_c(&balls, a0, 0, 0).unwrap();

        for step in 0..=40 {
            let alpha = 1.0 + step as f64 * 0.05;
            let value = tight_c(&balls, alpha, 0, 0).unwrap();
            assert!(value >= at_truth - 1e-12, "alpha = {}", alpha);
        }
    }

    #[test]
    fn test_empty_filter_rejected() {
        let balls = synthetic_balls(1.5);
        assert!(matches!(
            minimize_tight_c(&balls, 1.5, 0, 1000, 1e-3),
            Err(NavError::NoUsableBalls { min_distance: 1000, .. })
        ));
    }

    #[test]
    fn test_boundary_guess_rejected() {
        // Constant counts: flattest at alpha -> 0, the lower bound wins
        let balls: Vec<Ball> = (1..50).map(|d| Ball { distance: d, count: 10 }).collect();
        assert!(matches!(
            minimize_tight_c(&balls, 1.5, 0, 0, 1e-3),
            Err(NavError::NotBracketed { .. })
        ));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[1.0, 2.0, 10.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 4.0, 10.0]), 3.0);
    }

    #[test]
    fn test_torus_dimensions_are_ordered() {
        let config = DimensionConfig::default();

        let square = lattice(16, 2, true).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let d2 = estimate_optimal_dimension(&square, &config, &mut rng).unwrap();

        let cube = lattice(16, 3, true).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let d3 = estimate_optimal_dimension(&cube, &config, &mut rng).unwrap();

        assert!(d2.dimension > 1.7 && d2.dimension < 2.1, "2D: {}", d2.dimension);
        assert!(d3.dimension > 2.2 && d3.dimension < 2.7, "3D: {}", d3.dimension);
        assert!(d3.dimension > d2.dimension);
        assert_eq!(d2.status, Convergence::Converged);
    }

    #[test]
    fn test_attempt_budget_cuts_off() {
        let ring = lattice(32, 1, true).unwrap();
        let config = DimensionConfig {
            max_attempts: 5,
            ..DimensionConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let estimate = estimate_optimal_dimension(&ring, &config, &mut rng).unwrap();

        assert_eq!(estimate.status, Convergence::CutOff);
        assert_eq!(estimate.samples + estimate.discarded, 5);
    }
}
