//! Search output.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::homography::project;

/// Bookkeeping for one search run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitStats {
    /// Iterations requested by the caller.
    pub iterations_requested: usize,
    /// Iterations actually evaluated (fewer only when the time budget expired).
    pub iterations_evaluated: usize,
    /// Iterations whose sample produced no usable homography.
    pub degenerate_iterations: usize,
    /// Global index of the iteration that produced the returned fit.
    pub best_iteration: usize,
    /// True when the time budget cut the search short.
    pub timed_out: bool,
}

/// Best transform found by the correspondence search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Model → image homography (3x3, row-major, `h33 = 1`).
    pub homography: [[f64; 3]; 3],
    /// Sum over model points of the squared distance to the assigned
    /// observed point, in the scorer's space.
    pub error: f64,
    /// Observed index assigned to each model point (many-to-one allowed).
    pub correspondence: Vec<usize>,
    pub stats: FitStats,
}

impl FitResult {
    pub(crate) fn new(
        h: &Matrix3<f64>,
        error: f64,
        correspondence: Vec<usize>,
        stats: FitStats,
    ) -> Self {
        Self {
            homography: matrix3_to_array(h),
            error,
            correspondence,
            stats,
        }
    }

    /// The homography as an `nalgebra` matrix.
    pub fn matrix(&self) -> Matrix3<f64> {
        let h = &self.homography;
        Matrix3::new(
            h[0][0], h[0][1], h[0][2],
            h[1][0], h[1][1], h[1][2],
            h[2][0], h[2][1], h[2][2],
        )
    }

    /// Map a model point into the image.
    pub fn project(&self, model_xy: [f64; 2]) -> [f64; 2] {
        project(&self.matrix(), model_xy)
    }

    /// Map every model point into the image.
    pub fn project_all(&self, model: &[[f64; 2]]) -> Vec<[f64; 2]> {
        let h = self.matrix();
        model.iter().map(|&m| project(&h, m)).collect()
    }

    /// Observed point assigned to each model point.
    ///
    /// `observed` should be the slice the fit ran on; `None` when it is too
    /// short to hold every assigned index.
    pub fn matched_points(&self, observed: &[[f64; 2]]) -> Option<Vec<[f64; 2]>> {
        self.correspondence
            .iter()
            .map(|&i| observed.get(i).copied())
            .collect()
    }

    /// Root-mean-square distance between model points and their matches.
    pub fn rms_error(&self) -> f64 {
        if self.correspondence.is_empty() {
            return f64::NAN;
        }
        (self.error / self.correspondence.len() as f64).sqrt()
    }

    /// Number of distinct observed points used by the correspondence.
    pub fn distinct_matches(&self) -> usize {
        let mut idx = self.correspondence.clone();
        idx.sort_unstable();
        idx.dedup();
        idx.len()
    }
}

pub(crate) fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}
