//! CLI commands for butterfly-nav

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use crate::clustering::{ClusteringExponentEstimator, SearchConfig};
use crate::dimension::{estimate_optimal_dimension, minimize_tight_c, DimensionConfig};
use crate::highway::{default_k, RoutingParams};
use crate::lattice::lattice;
use crate::network::NetworkStore;
use crate::path_length::{AverageConfig, PathLengthEstimator};
use crate::results::{CsvResults, ResultSink};

/// Fit tolerance for the single-node lattice dimension
const LATTICE_FIT_TOLERANCE: f64 = 5e-4;

/// Reference exponent of the optimal-vs-dimension comparison
const REFERENCE_EXPONENT: f64 = 2.0;

#[derive(Parser)]
#[command(name = "butterfly-nav")]
#[command(about = "Navigability exponents of road networks", long_about = None)]
pub struct Cli {
    /// Directory holding <name>.raw networks and <name>.ch caches
    #[arg(long, global = true, default_value = "road_networks")]
    pub networks_dir: PathBuf,

    /// Directory for CSV results
    #[arg(long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// Seed all randomness (default: entropy)
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate the growth dimension of non-region networks
    Dimensions {
        /// Ignore the first balls around each node
        #[arg(long, default_value = "0")]
        skip: u32,

        /// Ignore balls closer than this
        #[arg(long, default_value = "0")]
        min_distance: u32,

        /// Only this network
        #[arg(long)]
        name: Option<String>,

        /// Estimate the two-letter region networks instead of the others
        #[arg(long)]
        regions: bool,
    },

    /// Search the optimal clustering exponent of every network in a shard
    Clustering {
        /// Shard index
        #[arg(long)]
        offset: u32,

        /// Number of shards
        #[arg(long)]
        total: u32,

        /// Contacts per highway node, in units of k
        #[arg(long, default_value = "1")]
        q: u32,

        #[command(flatten)]
        estimator: EstimatorArgs,
    },

    /// Fit the dimension and optimal clustering exponent of a lattice
    Lattice {
        #[arg(long)]
        dimension: u32,

        /// Nodes per side
        #[arg(long, default_value = "16")]
        side: u32,

        /// Open boundaries instead of a torus
        #[arg(long)]
        no_wrap: bool,

        #[arg(long, default_value = "1")]
        q: u32,

        #[command(flatten)]
        estimator: EstimatorArgs,
    },

    /// Compare greedy path length at exponent 2 and at the estimated dimension
    OptimalVsDimension {
        #[arg(long)]
        offset: u32,

        #[arg(long)]
        total: u32,

        #[command(flatten)]
        estimator: EstimatorArgs,
    },
}

/// Overrides of the Monte Carlo and exponent search settings
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct EstimatorArgs {
    /// Greedy walks per iteration of the average
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Relative spread the running average must hold within
    #[arg(long)]
    pub fractional_tolerance: Option<f64>,

    /// Iteration budget of each average
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Bracket width at which the exponent search stops
    #[arg(long)]
    pub search_tolerance: Option<f64>,
}

impl EstimatorArgs {
    pub fn average(&self, defaults: AverageConfig) -> AverageConfig {
        AverageConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            fractional_tolerance: self
                .fractional_tolerance
                .unwrap_or(defaults.fractional_tolerance),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            ..defaults
        }
    }

    pub fn search(&self, defaults: SearchConfig) -> SearchConfig {
        SearchConfig {
            tolerance: self.search_tolerance.unwrap_or(defaults.tolerance),
            ..defaults
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub networks_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            networks_dir: PathBuf::from("road_networks"),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Cli {
    pub fn paths(&self) -> DataPaths {
        DataPaths {
            networks_dir: self.networks_dir.clone(),
            data_dir: self.data_dir.clone(),
        }
    }

    pub fn run(self) -> Result<()> {
        let paths = self.paths();
        let store = NetworkStore::new(&paths.networks_dir);
        let results = CsvResults::new(&paths.data_dir);

        match self.command {
            Commands::Dimensions {
                skip,
                min_distance,
                name,
                regions,
            } => {
                let names = match name {
                    Some(name) => vec![name],
                    None if regions => store.region_names()?,
                    None => store.other_names()?,
                };
                run_dimensions(&store, &results, &names, skip, min_distance, self.seed)
            }
            Commands::Clustering {
                offset,
                total,
                q,
                estimator,
            } => {
                ensure!(offset < total, "offset {} must be below total {}", offset, total);
                for names in [store.region_names()?, store.other_names()?] {
                    run_clustering(
                        &store,
                        &results,
                        &names,
                        offset,
                        total,
                        q,
                        &estimator,
                        self.seed,
                    )?;
                }
                Ok(())
            }
            Commands::Lattice {
                dimension,
                side,
                no_wrap,
                q,
                estimator,
            } => run_lattice(&results, dimension, side, !no_wrap, q, &estimator, self.seed),
            Commands::OptimalVsDimension {
                offset,
                total,
                estimator,
            } => {
                ensure!(offset < total, "offset {} must be below total {}", offset, total);
                run_optimal_vs_dimension(&store, &results, offset, total, &estimator, self.seed)
            }
        }
    }
}

fn master_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn round_two_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn run_dimensions(
    store: &NetworkStore,
    results: &CsvResults,
    names: &[String],
    skip: u32,
    min_distance: u32,
    seed: Option<u64>,
) -> Result<()> {
    let recorded = results.dimension_names(skip, min_distance)?;
    let config = DimensionConfig {
        skip,
        min_distance,
        ..DimensionConfig::default()
    };
    let mut rng = master_rng(seed);

    for name in names {
        if recorded.contains(name) {
            info!("Dimension for {} already exists", name);
            continue;
        }

        let start = Instant::now();
        let graph = store
            .load_graph(name)
            .with_context(|| format!("Failed to load network {}", name))?;
        info!("Loaded {} ({} nodes) in {}", name, graph.size(), format_duration(start.elapsed()));

        let start = Instant::now();
        let estimate = estimate_optimal_dimension(&graph, &config, &mut rng)?;
        let dimension = round_two_decimals(estimate.dimension);
        info!(
            "Dimension for {}: {} ({:?}, {} samples, {} discarded) in {}",
            name,
            dimension,
            estimate.status,
            estimate.samples,
            estimate.discarded,
            format_duration(start.elapsed())
        );

        results.record_dimension(name, skip, min_distance, dimension)?;
    }

    Ok(())
}

fn run_clustering(
    store: &NetworkStore,
    results: &CsvResults,
    names: &[String],
    offset: u32,
    total: u32,
    q: u32,
    args: &EstimatorArgs,
    seed: Option<u64>,
) -> Result<()> {
    for (i, name) in names.iter().enumerate() {
        if i as u32 % total != offset {
            continue;
        }

        let start = Instant::now();
        let ch = store
            .load_or_build_ch(name)
            .with_context(|| format!("Failed to load contraction hierarchy for {}", name))?;
        info!("Loaded contraction hierarchy for {} in {}", name, format_duration(start.elapsed()));

        let params = RoutingParams::for_network(ch.n_nodes, q, 1.5);
        if results
            .optimal_clustering_exponent_names(params.k, q)?
            .contains(name)
        {
            info!("Optimal clustering exponent for {} already exists", name);
            continue;
        }

        let mut estimator = ClusteringExponentEstimator::new(name, &ch, params)
            .with_average_config(args.average(AverageConfig::for_exponent_search()))
            .with_search_config(args.search(SearchConfig::default()))
            .with_sink(results);
        if let Some(seed) = seed {
            estimator = estimator.with_seed(seed);
        }

        let start = Instant::now();
        let estimate = estimator.estimate_optimal_clustering_exponent()?;
        info!(
            "Optimal clustering exponent for {}: {} in {}",
            name,
            estimate.exponent,
            format_duration(start.elapsed())
        );

        results.record_optimal_clustering_exponent(name, params.k, q, estimate.exponent)?;
    }

    Ok(())
}

/// `2D_16-wrap`, `3D_128`
pub fn lattice_name(dimension: u32, side: u32, wrap_around: bool) -> String {
    format!(
        "{}D_{}{}",
        dimension,
        side,
        if wrap_around { "-wrap" } else { "" }
    )
}

fn run_lattice(
    results: &CsvResults,
    dimension: u32,
    side: u32,
    wrap_around: bool,
    q: u32,
    args: &EstimatorArgs,
    seed: Option<u64>,
) -> Result<()> {
    let name = lattice_name(dimension, side, wrap_around);

    let start = Instant::now();
    let graph = lattice(side, dimension, wrap_around)?;
    info!("Generated lattice {} in {}", name, format_duration(start.elapsed()));

    let k = default_k(graph.size());
    if results.optimal_clustering_exponent_names(k, q)?.contains(&name) {
        info!("Optimal clustering exponent for {} already exists", name);
        return Ok(());
    }

    // On a torus every node looks the same, so node 0 stands for all
    let start = Instant::now();
    let balls = graph.balls(0);
    let estimated = minimize_tight_c(&balls, dimension as f64, 0, 0, LATTICE_FIT_TOLERANCE)
        .with_context(|| format!("Failed to fit the dimension of {}", name))?;
    let estimated = round_two_decimals(estimated);
    info!("Dimension for {}: {} in {}", name, estimated, format_duration(start.elapsed()));
    results.record_dimension(&name, 0, 0, estimated)?;

    let start = Instant::now();
    let ch = graph.contraction_hierarchy();
    info!("Built contraction hierarchy for {} in {}", name, format_duration(start.elapsed()));

    let params = RoutingParams {
        k,
        q,
        clustering_exponent: estimated,
    };
    let search = args.search(SearchConfig {
        guess: estimated,
        ..Default::default()
    });
    let mut estimator = ClusteringExponentEstimator::new(&name, &ch, params)
        .with_average_config(args.average(AverageConfig::for_exponent_search()))
        .with_search_config(search)
        .with_sink(results);
    if let Some(seed) = seed {
        estimator = estimator.with_seed(seed);
    }

    let start = Instant::now();
    let estimate = estimator.estimate_optimal_clustering_exponent()?;
    info!(
        "Optimal clustering exponent for {}: {} in {}",
        name,
        estimate.exponent,
        format_duration(start.elapsed())
    );

    results.record_optimal_clustering_exponent(&name, k, q, estimate.exponent)?;
    Ok(())
}

fn run_optimal_vs_dimension(
    store: &NetworkStore,
    results: &CsvResults,
    offset: u32,
    total: u32,
    args: &EstimatorArgs,
    seed: Option<u64>,
) -> Result<()> {
    let estimates: Vec<(String, f64)> = results
        .dimension_estimates(0, 0)?
        .into_iter()
        .filter(|(name, _)| name.chars().count() == 2)
        .collect();
    if estimates.is_empty() {
        bail!(
            "No region dimension estimates in {}; run `butterfly-nav dimensions --regions` first",
            results.dir().display()
        );
    }

    let config = args.average(AverageConfig {
        batch_size: 1000,
        fractional_tolerance: 1e-2,
        ..AverageConfig::default()
    });

    for (i, (name, dimension)) in estimates.iter().enumerate() {
        if i as u32 % total != offset {
            continue;
        }

        let start = Instant::now();
        let ch = store
            .load_or_build_ch(name)
            .with_context(|| format!("Failed to load contraction hierarchy for {}", name))?;
        info!("Loaded contraction hierarchy for {} in {}", name, format_duration(start.elapsed()));

        let mut averages = [0.0; 2];
        for (slot, exponent) in [REFERENCE_EXPONENT, *dimension].into_iter().enumerate() {
            let params = RoutingParams::for_network(ch.n_nodes, 1, exponent);
            let mut estimator =
                PathLengthEstimator::new(name, &ch, params, config.clone())?.with_sink(results);
            if let Some(seed) = seed {
                estimator = estimator.with_seed(seed.wrapping_add(slot as u64));
            }

            let start = Instant::now();
            averages[slot] = estimator.get_average_greedy_path_length()?.average;
            info!(
                "Greedy path length for {} when alpha = {}: {} in {}",
                name,
                exponent,
                averages[slot],
                format_duration(start.elapsed())
            );
        }

        results.record_optimal_vs_dimension(
            name,
            *dimension,
            REFERENCE_EXPONENT,
            averages[1],
            averages[0],
        )?;
    }

    Ok(())
}

/// `1h 2m 3s 4ms`, dropping leading zero units
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let seconds = millis / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m {}s {}ms", hours, minutes % 60, seconds % 60, millis % 1000)
    } else if minutes > 0 {
        format!("{}m {}s {}ms", minutes, seconds % 60, millis % 1000)
    } else if seconds > 0 {
        format!("{}s {}ms", seconds, millis % 1000)
    } else {
        format!("{}ms", millis)
    }
}
