//! Road network directory: `<name>.raw` edge lists and `<name>.ch` oracle
//! caches side by side

use std::fs;
use std::path::{Path, PathBuf};

use butterfly_common::{suggest_network, Error as CommonError};
use tracing::{info, warn};

use crate::ch::ContractionHierarchy;
use crate::error::Result;
use crate::formats::{read_raw_graph, ChFile};
use crate::graph::Graph;

pub const RAW_EXTENSION: &str = "raw";
pub const CH_EXTENSION: &str = "ch";

#[derive(Debug, Clone)]
pub struct NetworkStore {
    dir: PathBuf,
}

impl NetworkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stems of all `.raw` files, sorted
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(RAW_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Networks named by a two-letter region code
    pub fn region_names(&self) -> Result<Vec<String>> {
        Ok(self.names()?.into_iter().filter(|n| is_region(n)).collect())
    }

    pub fn other_names(&self) -> Result<Vec<String>> {
        Ok(self.names()?.into_iter().filter(|n| !is_region(n)).collect())
    }

    pub fn raw_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, RAW_EXTENSION))
    }

    pub fn ch_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, CH_EXTENSION))
    }

    /// Fail with a "did you mean" suggestion when `name` has no raw file
    fn require(&self, name: &str) -> Result<PathBuf> {
        let path = self.raw_path(name);
        if path.is_file() {
            return Ok(path);
        }

        let available = self.names().unwrap_or_default();
        Err(CommonError::NetworkNotFound {
            name: name.to_string(),
            suggestion: suggest_network(name, &available),
        }
        .into())
    }

    pub fn load_graph(&self, name: &str) -> Result<Graph> {
        let path = self.require(name)?;
        Ok(read_raw_graph(path)?)
    }

    /// Load the cached oracle, or build it from the raw network and cache it
    pub fn load_or_build_ch(&self, name: &str) -> Result<ContractionHierarchy> {
        let ch_path = self.ch_path(name);
        if ch_path.is_file() {
            match ChFile::read(&ch_path) {
                Ok(ch) => return Ok(ch),
                Err(e) => warn!("Ignoring unreadable cache {}: {}", ch_path.display(), e),
            }
        }

        let graph = self.load_graph(name)?;
        info!(
            "Building contraction hierarchy for {} ({} nodes, {} edges)",
            name,
            graph.size(),
            graph.num_edges()
        );
        let ch = graph.contraction_hierarchy();

        if let Err(e) = ChFile::write(&ch_path, &ch) {
            warn!("Failed to cache {}: {}", ch_path.display(), e);
        }

        Ok(ch)
    }
}

fn is_region(name: &str) -> bool {
    name.chars().count() == 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NavError;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, NetworkStore) {
        let dir = tempfile::tempdir().unwrap();
        for (file, contents) in files {
            std::fs::write(dir.path().join(file), contents).unwrap();
        }
        let store = NetworkStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_names_partitioned() {
        let (_dir, store) = store_with(&[
            ("HI.raw", "1\n"),
            ("CA.raw", "1\n"),
            ("berlin.raw", "1\n"),
            ("notes.txt", ""),
            ("HI.ch", ""),
        ]);

        assert_eq!(store.names().unwrap(), vec!["CA", "HI", "berlin"]);
        assert_eq!(store.region_names().unwrap(), vec!["CA", "HI"]);
        assert_eq!(store.other_names().unwrap(), vec!["berlin"]);
    }

    #[test]
    fn test_unknown_name_suggests() {
        let (_dir, store) = store_with(&[("berlin.raw", "1\n")]);

        match store.load_graph("berln") {
            Err(NavError::Network(CommonError::NetworkNotFound { suggestion, .. })) => {
                assert_eq!(suggestion.as_deref(), Some("berlin"));
            }
            other => panic!("expected NetworkNotFound, got {:?}", other.map(|g| g.size())),
        }
    }

    #[test]
    fn test_ch_is_cached() {
        let (_dir, store) = store_with(&[("tri.raw", "3\n0 1 1\n1 2 1\n2 0 5\n")]);

        assert!(!store.ch_path("tri").exists());
        let built = store.load_or_build_ch("tri").unwrap();
        assert!(store.ch_path("tri").exists());

        let cached = store.load_or_build_ch("tri").unwrap();
        assert_eq!(built, cached);
    }

    #[test]
    fn test_corrupt_cache_is_rebuilt() {
        let (_dir, store) = store_with(&[
            ("tri.raw", "3\n0 1 1\n1 2 1\n2 0 5\n"),
            ("tri.ch", "garbage"),
        ]);

        let ch = store.load_or_build_ch("tri").unwrap();
        assert_eq!(ch.n_nodes, 3);
        assert_eq!(ChFile::read(store.ch_path("tri")).unwrap(), ch);
    }
}
