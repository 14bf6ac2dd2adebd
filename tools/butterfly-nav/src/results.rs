//! Append-only CSV result files
//!
//! One file per result kind in the data directory, no header row:
//! - `clustering-exponent.csv`: `name,k,Q,exponent,average_path_length`
//! - `optimal-clustering-exponent-acc.csv`: `name,k,Q,optimal_exponent`
//! - `dimension.csv`: `name,skip,min_distance,dimension`
//! - `optimal-vs-dimension.csv`:
//!   `name,estimated_dimension,reference_exponent,at_estimated,at_reference`

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;

pub const CLUSTERING_EXPONENT_FILE: &str = "clustering-exponent.csv";
pub const OPTIMAL_CLUSTERING_EXPONENT_FILE: &str = "optimal-clustering-exponent-acc.csv";
pub const DIMENSION_FILE: &str = "dimension.csv";
pub const OPTIMAL_VS_DIMENSION_FILE: &str = "optimal-vs-dimension.csv";

/// Destination of estimator results
pub trait ResultSink: Sync {
    fn record_clustering_exponent(
        &self,
        name: &str,
        k: u32,
        q: u32,
        exponent: f64,
        average_path_length: f64,
    ) -> Result<()>;

    fn record_optimal_clustering_exponent(
        &self,
        name: &str,
        k: u32,
        q: u32,
        exponent: f64,
    ) -> Result<()>;

    fn record_dimension(
        &self,
        name: &str,
        skip: u32,
        min_distance: u32,
        dimension: f64,
    ) -> Result<()>;

    fn record_optimal_vs_dimension(
        &self,
        name: &str,
        estimated_dimension: f64,
        reference_exponent: f64,
        at_estimated: f64,
        at_reference: f64,
    ) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ClusteringExponentRow {
    name: String,
    k: u32,
    q: u32,
    exponent: f64,
    average_path_length: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct OptimalExponentRow {
    name: String,
    k: u32,
    q: u32,
    optimal_exponent: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct DimensionRow {
    name: String,
    skip: u32,
    min_distance: u32,
    dimension: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct OptimalVsDimensionRow {
    name: String,
    estimated_dimension: f64,
    reference_exponent: f64,
    at_estimated: f64,
    at_reference: f64,
}

/// CSV files under one data directory
#[derive(Debug, Clone)]
pub struct CsvResults {
    dir: PathBuf,
}

impl CsvResults {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append<T: Serialize>(&self, file: &str, row: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    /// All rows of `file`; a missing file has none
    fn rows<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
        Ok(rows)
    }

    /// Names with an optimal clustering exponent recorded for `(k, q)`
    pub fn optimal_clustering_exponent_names(&self, k: u32, q: u32) -> Result<FxHashSet<String>> {
        Ok(self
            .rows::<OptimalExponentRow>(OPTIMAL_CLUSTERING_EXPONENT_FILE)?
            .into_iter()
            .filter(|row| row.k == k && row.q == q)
            .map(|row| row.name)
            .collect())
    }

    /// Names with a dimension recorded for `(skip, min_distance)`
    pub fn dimension_names(&self, skip: u32, min_distance: u32) -> Result<FxHashSet<String>> {
        Ok(self
            .dimension_estimates(skip, min_distance)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Recorded dimensions for `(skip, min_distance)` in order of first
    /// appearance; a name recorded twice keeps its latest value.
    pub fn dimension_estimates(&self, skip: u32, min_distance: u32) -> Result<Vec<(String, f64)>> {
        let mut estimates: Vec<(String, f64)> = Vec::new();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();

        for row in self.rows::<DimensionRow>(DIMENSION_FILE)? {
            if row.skip != skip || row.min_distance != min_distance {
                continue;
            }
            match index.get(&row.name) {
                Some(&i) => estimates[i].1 = row.dimension,
                None => {
                    index.insert(row.name.clone(), estimates.len());
                    estimates.push((row.name, row.dimension));
                }
            }
        }

        Ok(estimates)
    }

    /// Recorded `(exponent, average_path_length)` pairs of one network
    pub fn clustering_exponent_averages(
        &self,
        name: &str,
        k: u32,
        q: u32,
    ) -> Result<Vec<(f64, f64)>> {
        Ok(self
            .rows::<ClusteringExponentRow>(CLUSTERING_EXPONENT_FILE)?
            .into_iter()
            .filter(|row| row.name == name && row.k == k && row.q == q)
            .map(|row| (row.exponent, row.average_path_length))
            .collect())
    }
}

impl ResultSink for CsvResults {
    fn record_clustering_exponent(
        &self,
        name: &str,
        k: u32,
        q: u32,
        exponent: f64,
        average_path_length: f64,
    ) -> Result<()> {
        self.append(
            CLUSTERING_EXPONENT_FILE,
            &ClusteringExponentRow {
                name: name.to_string(),
                k,
                q,
                exponent,
                average_path_length,
            },
        )
    }

    fn record_optimal_clustering_exponent(
        &self,
        name: &str,
        k: u32,
        q: u32,
        exponent: f64,
    ) -> Result<()> {
        self.append(
            OPTIMAL_CLUSTERING_EXPONENT_FILE,
            &OptimalExponentRow {
                name: name.to_string(),
                k,
                q,
                optimal_exponent: exponent,
            },
        )
    }

    fn record_dimension(
        &self,
        name: &str,
        skip: u32,
        min_distance: u32,
        dimension: f64,
    ) -> Result<()> {
        self.append(
            DIMENSION_FILE,
            &DimensionRow {
                name: name.to_string(),
                skip,
                min_distance,
                dimension,
            },
        )
    }

    fn record_optimal_vs_dimension(
        &self,
        name: &str,
        estimated_dimension: f64,
        reference_exponent: f64,
        at_estimated: f64,
        at_reference: f64,
    ) -> Result<()> {
        self.append(
            OPTIMAL_VS_DIMENSION_FILE,
            &OptimalVsDimensionRow {
                name: name.to_string(),
                estimated_dimension,
                reference_exponent,
                at_estimated,
                at_reference,
            },
        )
    }
}
