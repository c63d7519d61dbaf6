//! Public error types.

use serde::{Deserialize, Serialize};

/// Which input point set an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSetKind {
    Observed,
    Model,
}

impl std::fmt::Display for PointSetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observed => f.write_str("observed"),
            Self::Model => f.write_str("model"),
        }
    }
}

/// Errors surfaced by the correspondence search.
///
/// Per-iteration degenerate samples are absorbed by the search loop and never
/// appear here unless no iteration produced a usable homography.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("insufficient {set} points: need {needed}, got {got}")]
    InsufficientPoints {
        set: PointSetKind,
        needed: usize,
        got: usize,
    },

    #[error("non-finite {set} point at index {index}")]
    NonFinitePoint { set: PointSetKind, index: usize },

    #[error("no valid fit: all {iterations} evaluated iterations were degenerate")]
    NoValidFit { iterations: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
