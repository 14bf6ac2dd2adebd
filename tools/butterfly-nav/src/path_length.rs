//! Monte Carlo estimate of the average greedy path length
//!
//! Each iteration resamples the highway set and routes a batch of random
//! `(start, end)` pairs in parallel. Iterations continue until the running
//! average has held within a relative tolerance for at least
//! `max(min_window, iteration / 2)` iterations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::ch::{ChQuery, ContractionHierarchy};
use crate::error::{NavError, Result};
use crate::greedy::GreedyRouter;
use crate::highway::{HighwayNetwork, RoutingParams};
use crate::minimize::Convergence;
use crate::results::ResultSink;
use crate::stability::{Spread, StabilityWindow};

#[derive(Debug, Clone, PartialEq)]
pub struct AverageConfig {
    /// Greedy walks per iteration
    pub batch_size: u32,
    /// Allowed `(max - min) / min` of the running average
    pub fractional_tolerance: f64,
    /// Minimum number of iterations the average must hold
    pub min_window: u32,
    pub max_iterations: u32,
    /// Parallel workers per batch
    pub workers: usize,
}

impl Default for AverageConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            fractional_tolerance: 5e-4,
            min_window: 10,
            max_iterations: 100_000,
            workers: rayon::current_num_threads(),
        }
    }
}

impl AverageConfig {
    /// Per-evaluation settings of the exponent search: 100 walks per worker
    pub fn for_exponent_search() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: 100 * defaults.workers as u32,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageEstimate {
    pub average: f64,
    /// Average rounded to a multiple of `tolerance`, as recorded
    pub rounded: f64,
    /// Final relative spread of the stability window
    pub tolerance: f64,
    pub iterations: u32,
    pub status: Convergence,
}

pub struct PathLengthEstimator<'a> {
    name: String,
    highway: HighwayNetwork<'a>,
    config: AverageConfig,
    rng: StdRng,
    sink: Option<&'a dyn ResultSink>,
}

impl<'a> PathLengthEstimator<'a> {
    pub fn new(
        name: impl Into<String>,
        ch: &'a ContractionHierarchy,
        params: RoutingParams,
        config: AverageConfig,
    ) -> Result<Self> {
        if config.batch_size == 0 || config.workers == 0 || config.max_iterations == 0 {
            return Err(NavError::InvalidParameter(format!(
                "batch size, workers and iteration budget must be positive (got {:?})",
                config
            )));
        }

        Ok(Self {
            name: name.into(),
            highway: HighwayNetwork::new(ch, params)?,
            config,
            rng: StdRng::from_os_rng(),
            sink: None,
        })
    }

    /// Replace the entropy-seeded master RNG
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn ResultSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn highway(&self) -> &HighwayNetwork<'a> {
        &self.highway
    }

    /// Resample the highway set from the master RNG
    pub fn initialize(&mut self) {
        self.highway.initialize(&mut self.rng);
    }

    /// Sum of `num_trials` greedy path lengths over the current highway set,
    /// one RNG stream per worker drawn from the master RNG
    pub fn total_greedy_path_length(&mut self, num_trials: u32) -> Result<f64> {
        let seeds: Vec<u64> = (0..self.config.workers)
            .map(|_| self.rng.random::<u64>())
            .collect();
        self.total_greedy_path_length_with_seeds(num_trials, &seeds)
    }

    /// Same as [`total_greedy_path_length`](Self::total_greedy_path_length)
    /// with one worker per given seed. Partial sums are added in worker
    /// order.
    pub fn total_greedy_path_length_with_seeds(
        &self,
        num_trials: u32,
        seeds: &[u64],
    ) -> Result<f64> {
        let workers = seeds.len() as u32;
        let partials: Vec<Result<f64>> = seeds
            .par_iter()
            .enumerate()
            .map(|(i, &seed)| self.worker_total(i as u32, workers, num_trials, seed))
            .collect();

        let mut total = 0.0;
        for partial in partials {
            total += partial?;
        }
        Ok(total)
    }

    /// Trials `worker, worker + workers, ...` below `num_trials`, with an RNG
    /// seeded by `seed` and a private query session
    pub fn worker_total(
        &self,
        worker: u32,
        workers: u32,
        num_trials: u32,
        seed: u64,
    ) -> Result<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = ChQuery::new(self.highway.hierarchy());
        let router = GreedyRouter::new(&self.highway);
        let n_nodes = self.highway.n_nodes();

        let mut total = 0.0;
        for _ in (worker..num_trials).step_by(workers.max(1) as usize) {
            let start = rng.random_range(0..n_nodes);
            let end = rng.random_range(0..n_nodes);
            total += router.greedy_path_length(start, end, &mut rng, &mut session)? as f64;
        }

        Ok(total)
    }

    /// Run batches until the average greedy path length stabilizes
    pub fn get_average_greedy_path_length(&mut self) -> Result<AverageEstimate> {
        let exponent = self.highway.params().clustering_exponent;
        info!("Testing exponent: {}", exponent);

        let batch_size = self.config.batch_size;
        let mut window = StabilityWindow::new(Spread::Relative, self.config.fractional_tolerance);
        let mut total = 0.0;
        let mut iteration = 0u32;
        let mut average = 0.0;
        let mut status = Convergence::CutOff;

        while iteration < self.config.max_iterations {
            self.initialize();
            total += self.total_greedy_path_length(batch_size)?;
            iteration += 1;

            average = total / (iteration as f64 * batch_size as f64);
            debug!("Iteration: {}, Average path length: {}", iteration, average);

            window.observe(average);
            if window.held() >= self.config.min_window.max(iteration / 2) {
                status = Convergence::Converged;
                break;
            }
        }

        let tolerance = window.spread();
        let rounded = round_to_tolerance(average, tolerance);

        if let Some(sink) = self.sink {
            let params = self.highway.params();
            if let Err(e) =
                sink.record_clustering_exponent(&self.name, params.k, params.q, exponent, rounded)
            {
                warn!("Failed to record average path length for {}: {}", self.name, e);
            }
        }

        Ok(AverageEstimate {
            average,
            rounded,
            tolerance,
            iterations: iteration,
            status,
        })
    }
}

/// `round(value / tolerance) * tolerance`, or `value` when the tolerance
/// cannot serve as a step
pub fn round_to_tolerance(value: f64, tolerance: f64) -> f64 {
    if tolerance > 0.0 && tolerance.is_finite() {
        (value / tolerance).round() * tolerance
    } else {
        value
    }
}
