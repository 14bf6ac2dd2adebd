//! Error types and utilities for butterfly-osm toolkit
//!
//! Provides the shared error type and fuzzy matching for network name lookup.

use std::fmt;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Find the best fuzzy match using character-based scoring with a few
/// name-shape bonuses.
///
/// Combines Jaro-Winkler (70%) and Normalized Levenshtein (30%), then:
/// - Component bonus: up to +12% when the input matches one part of a
///   compound name (`bay-area`, `new_york`)
/// - Length bonus: up to +10% for long names of similar length
///
/// Minimum threshold: 0.65 similarity
fn find_best_fuzzy_match(input: &str, candidates: &[String]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    let input_lower = input.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0f64;

    let min_threshold = 0.65;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let combined_score = (jw_score * 0.7) + (lev_score * 0.3);

        let mut shape_bonus = 0.0;

        if candidate_lower.contains('-') || candidate_lower.contains('_') {
            for part in candidate_lower.split(&['-', '_'][..]) {
                if part.len() >= 4 {
                    let part_similarity = jaro_winkler(&input_lower, part);
                    if part_similarity > 0.85 {
                        shape_bonus += 0.12 * part_similarity;
                    }
                }
            }
        }

        if input_lower.len() >= 8 && candidate_lower.len() >= 8 {
            let length_ratio = 1.0
                - ((input_lower.len() as f64 - candidate_lower.len() as f64).abs()
                    / input_lower.len().max(candidate_lower.len()) as f64);
            if length_ratio > 0.7 {
                shape_bonus += 0.1 * length_ratio;
            }
        }

        let final_score = combined_score + shape_bonus;

        if final_score >= min_threshold && final_score > best_score {
            best_score = final_score;
            best_match = Some(candidate.clone());
        }
    }

    best_match
}

/// Suggest an available network name for a possibly misspelled one.
///
/// Returns `None` when `name` is available as given. Network files are
/// looked up case-sensitively, so a name that only differs in case
/// suggests the stored spelling (`hi` -> `HI`).
pub fn suggest_network(name: &str, available: &[String]) -> Option<String> {
    if available.iter().any(|candidate| candidate == name) {
        return None;
    }

    if let Some(candidate) = available
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
    {
        return Some(candidate.clone());
    }

    find_best_fuzzy_match(name, available)
}

/// Main error type for butterfly-osm operations
#[derive(Debug)]
pub enum Error {
    /// Network name has no raw file in the network directory
    NetworkNotFound {
        name: String,
        suggestion: Option<String>,
    },

    /// Input file exists but could not be parsed
    MalformedInput(String),

    /// File I/O error
    IoError(std::io::Error),

    /// Invalid configuration or parameters
    InvalidInput(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NetworkNotFound { name, suggestion } => {
                write!(f, "Network '{name}' not found")?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean '{suggestion}'?)")?;
                }
                Ok(())
            }
            Error::MalformedInput(msg) => {
                write!(f, "Malformed input: {msg}")
            }
            Error::IoError(err) => {
                write!(f, "I/O error: {err}")
            }
            Error::InvalidInput(msg) => {
                write!(f, "Invalid input: {msg}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

/// Convenience result type for butterfly-osm operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_suggest_network_exact_match() {
        let available = names(&["HI", "CA", "berlin"]);
        assert_eq!(suggest_network("HI", &available), None);
        assert_eq!(suggest_network("berlin", &available), None);
    }

    #[test]
    fn test_suggest_network_case_only() {
        let available = names(&["HI", "CA", "berlin"]);
        assert_eq!(suggest_network("hi", &available), Some("HI".to_string()));
        assert_eq!(
            suggest_network("Berlin", &available),
            Some("berlin".to_string())
        );
    }

    #[test]
    fn test_suggest_network_typos() {
        let available = names(&["berlin", "paris", "bay-area", "new_york"]);
        assert_eq!(
            suggest_network("berln", &available),
            Some("berlin".to_string())
        );
        assert_eq!(
            suggest_network("pariss", &available),
            Some("paris".to_string())
        );
        assert_eq!(
            suggest_network("newyork", &available),
            Some("new_york".to_string())
        );
    }

    #[test]
    fn test_suggest_network_no_match() {
        let available = names(&["HI", "CA"]);
        assert_eq!(suggest_network("totally-unrelated", &available), None);
        assert_eq!(suggest_network("anything", &[]), None);
    }

    #[test]
    fn test_network_not_found_display() {
        let err = Error::NetworkNotFound {
            name: "berln".to_string(),
            suggestion: Some("berlin".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Network 'berln' not found (did you mean 'berlin'?)"
        );

        let err = Error::NetworkNotFound {
            name: "nowhere".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Network 'nowhere' not found");
    }
}
