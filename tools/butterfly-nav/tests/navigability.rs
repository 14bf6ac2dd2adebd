use butterfly_nav::ch::ChQuery;
use butterfly_nav::results::ResultSink;
use butterfly_nav::{
    AverageConfig, ClusteringExponentEstimator, CsvResults, GreedyRouter, NetworkStore,
    PathLengthEstimator, RoutingParams, SearchConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 8-node cycle with unit weights
const CYCLE: &str = "8\n0 1 1\n1 2 1\n2 3 1\n3 4 1\n4 5 1\n5 6 1\n6 7 1\n7 0 1\n";

fn store_with_cycle() -> (tempfile::TempDir, NetworkStore) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cycle.raw"), CYCLE).unwrap();
    let store = NetworkStore::new(dir.path());
    (dir, store)
}

fn small_average(workers: usize) -> AverageConfig {
    AverageConfig {
        batch_size: 16,
        fractional_tolerance: 2e-2,
        min_window: 10,
        max_iterations: 200,
        workers,
    }
}

fn cycle_params() -> RoutingParams {
    RoutingParams {
        k: 2,
        q: 1,
        clustering_exponent: 1.5,
    }
}

#[test]
fn test_clustering_search_on_cycle() {
    let (_dir, store) = store_with_cycle();
    let ch = store.load_or_build_ch("cycle").unwrap();

    let search = SearchConfig {
        tolerance: 0.2,
        max_iterations: 20,
        ..SearchConfig::default()
    };
    let run = || {
        ClusteringExponentEstimator::new("cycle", &ch, cycle_params())
            .with_average_config(small_average(2))
            .with_search_config(search.clone())
            .with_seed(2024)
            .estimate_optimal_clustering_exponent()
            .unwrap()
    };

    let first = run();
    assert!(first.exponent >= 0.01 && first.exponent <= 2.5, "{:?}", first);
    assert_eq!(first, run());
}

#[test]
fn test_seeded_averages_repeat() {
    let (_dir, store) = store_with_cycle();
    let ch = store.load_or_build_ch("cycle").unwrap();

    let average = |seed: u64| {
        PathLengthEstimator::new("cycle", &ch, cycle_params(), small_average(3))
            .unwrap()
            .with_seed(seed)
            .get_average_greedy_path_length()
            .unwrap()
    };

    assert_eq!(average(11), average(11));
}

#[test]
fn test_single_worker_matches_serial_walks() {
    let (_dir, store) = store_with_cycle();
    let ch = store.load_or_build_ch("cycle").unwrap();

    let mut estimator = PathLengthEstimator::new("cycle", &ch, cycle_params(), small_average(1))
        .unwrap()
        .with_seed(7);
    estimator.initialize();
    let total = estimator.total_greedy_path_length_with_seeds(40, &[42]).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut session = ChQuery::new(&ch);
    let router = GreedyRouter::new(estimator.highway());
    let mut serial = 0.0;
    for _ in 0..40 {
        let start = rng.random_range(0..8);
        let end = rng.random_range(0..8);
        serial += router.greedy_path_length(start, end, &mut rng, &mut session).unwrap() as f64;
    }

    assert_eq!(total, serial);
}

#[test]
fn test_averages_are_recorded() {
    let (dir, store) = store_with_cycle();
    let ch = store.load_or_build_ch("cycle").unwrap();
    assert!(store.ch_path("cycle").is_file());

    let results = CsvResults::new(dir.path().join("data"));
    let estimate = PathLengthEstimator::new("cycle", &ch, cycle_params(), small_average(2))
        .unwrap()
        .with_seed(1)
        .with_sink(&results)
        .get_average_greedy_path_length()
        .unwrap();

    assert_eq!(
        results.clustering_exponent_averages("cycle", 2, 1).unwrap(),
        vec![(1.5, estimate.rounded)]
    );

    results.record_optimal_clustering_exponent("cycle", 2, 1, 1.5).unwrap();
    assert!(results.optimal_clustering_exponent_names(2, 1).unwrap().contains("cycle"));
}
