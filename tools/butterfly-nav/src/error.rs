//! Typed errors for the estimation library

use thiserror::Error;

use crate::formats::FormatError;

#[derive(Debug, Error)]
pub enum NavError {
    /// The initial guess does not enclose a minimum: the objective at the
    /// guess is not strictly below its value at both interval bounds.
    #[error(
        "guess {guess} does not bracket a minimum in [{lower}, {upper}] \
         (f(lower) = {f_lower}, f(guess) = {f_guess}, f(upper) = {f_upper})"
    )]
    NotBracketed {
        lower: f64,
        guess: f64,
        upper: f64,
        f_lower: f64,
        f_guess: f64,
        f_upper: f64,
    },

    /// Every ball was removed by the skip / minimum-distance filter
    #[error("no ball survives skip = {skip}, min_distance = {min_distance}")]
    NoUsableBalls { skip: u32, min_distance: u32 },

    #[error("node {to} is unreachable from node {from}")]
    Unreachable { from: u32, to: u32 },

    #[error("node {node} out of range for a graph of {n_nodes} nodes")]
    NodeOutOfRange { node: u32, n_nodes: u32 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Network(#[from] butterfly_common::Error),

    #[error("result file error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NavError>;
