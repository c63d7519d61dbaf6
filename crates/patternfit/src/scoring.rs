//! Scoring functions for candidate homographies.
//!
//! A [`Scorer`] turns a candidate model → image homography into an aggregate
//! squared-distance error and a correspondence (model index → observed
//! index). Assignment is greedy nearest-neighbour: several model points may
//! claim the same observed point.

use nalgebra::Matrix3;

use crate::homography::{invert, project};

/// Per-worker buffers reused across iterations.
#[derive(Debug, Clone, Default)]
pub struct ScoreScratch {
    /// Observed index assigned to each model point.
    pub correspondence: Vec<usize>,
    /// Projected coordinates (space depends on the scorer).
    pub projected: Vec<[f64; 2]>,
}

impl ScoreScratch {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            correspondence: Vec::with_capacity(n),
            projected: Vec::with_capacity(n),
        }
    }
}

/// Scores a candidate homography against the full point sets.
pub trait Scorer: Send + Sync {
    /// Score `h` (model → image).
    ///
    /// Returns `None` when the candidate cannot be scored (projection to
    /// infinity, singular inverse). Otherwise returns the error; when it is
    /// below `bound`, `scratch.correspondence` holds one observed index per
    /// model point. Implementations may stop early and return any value
    /// `>= bound` once the error can no longer beat it.
    fn score(
        &self,
        h: &Matrix3<f64>,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        bound: f64,
        scratch: &mut ScoreScratch,
    ) -> Option<f64>;
}

#[inline]
fn dist2(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Index and squared distance of the point in `candidates` closest to `q`.
///
/// Ties keep the lowest index; non-finite candidates never win.
#[inline]
pub(crate) fn nearest(candidates: &[[f64; 2]], q: [f64; 2]) -> Option<(usize, f64)> {
    let mut best_idx = usize::MAX;
    let mut best_d2 = f64::INFINITY;
    for (i, &c) in candidates.iter().enumerate() {
        let d2 = dist2(c, q);
        if d2 < best_d2 {
            best_d2 = d2;
            best_idx = i;
        }
    }
    (best_idx != usize::MAX).then_some((best_idx, best_d2))
}

/// Projects every model point into image space and matches it to the
/// nearest observed point. Error is in squared image units.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborScorer;

impl Scorer for NearestNeighborScorer {
    fn score(
        &self,
        h: &Matrix3<f64>,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        bound: f64,
        scratch: &mut ScoreScratch,
    ) -> Option<f64> {
        scratch.projected.clear();
        for &m in model {
            let p = project(h, m);
            if !(p[0].is_finite() && p[1].is_finite()) {
                return None;
            }
            scratch.projected.push(p);
        }

        scratch.correspondence.clear();
        let mut total = 0.0;
        for &p in &scratch.projected {
            let (idx, d2) = nearest(observed, p)?;
            scratch.correspondence.push(idx);
            total += d2;
            if total >= bound {
                return Some(total);
            }
        }
        Some(total)
    }
}

/// Maps observed points into model space through `h⁻¹` and, for every model
/// point, picks the nearest mapped observed point. Error is in squared model
/// units.
///
/// Observed points on the vanishing line of `h⁻¹` cannot be matched and are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSpaceScorer;

impl Scorer for ModelSpaceScorer {
    fn score(
        &self,
        h: &Matrix3<f64>,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        bound: f64,
        scratch: &mut ScoreScratch,
    ) -> Option<f64> {
        let h_inv = invert(h)?;

        scratch.projected.clear();
        scratch
            .projected
            .extend(observed.iter().map(|&o| project(&h_inv, o)));

        scratch.correspondence.clear();
        let mut total = 0.0;
        for &m in model {
            let (idx, d2) = nearest(&scratch.projected, m)?;
            scratch.correspondence.push(idx);
            total += d2;
            if total >= bound {
                return Some(total);
            }
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn shift(dx: f64, dy: f64) -> Matrix3<f64> {
        Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0)
    }

    #[test]
    fn nearest_prefers_lowest_index_on_ties() {
        let pts = [[1.0, 0.0], [-1.0, 0.0], [0.0, 5.0]];
        assert_eq!(nearest(&pts, [0.0, 0.0]), Some((0, 1.0)));
        assert_eq!(nearest(&[], [0.0, 0.0]), None);
        assert_eq!(nearest(&[[f64::NAN, 0.0]], [0.0, 0.0]), None);
    }

    #[test]
    fn image_space_error_and_assignment() {
        let model = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
        let observed = [[1.0, 1.0], [11.0, 1.0], [1.0, 11.5], [50.0, 50.0]];
        let mut scratch = ScoreScratch::default();

        let err = NearestNeighborScorer
            .score(&shift(1.0, 1.0), &observed, &model, f64::INFINITY, &mut scratch)
            .unwrap();
        assert_relative_eq!(err, 0.25, epsilon = 1e-12);
        assert_eq!(scratch.correspondence, vec![0, 1, 2]);
    }

    #[test]
    fn many_model_points_may_share_one_observed_point() {
        let model = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.5, 0.5]];
        let observed = [[0.5, 0.5]];
        let mut scratch = ScoreScratch::default();

        let err = NearestNeighborScorer
            .score(&Matrix3::identity(), &observed, &model, f64::INFINITY, &mut scratch)
            .unwrap();
        assert_eq!(scratch.correspondence, vec![0; 5]);
        assert_relative_eq!(err, 4.0 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn early_abandon_never_undercuts_bound() {
        let model = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
        let observed = [[3.0, 0.0], [13.0, 0.0], [3.0, 10.0]];
        let mut scratch = ScoreScratch::default();

        let full = NearestNeighborScorer
            .score(&Matrix3::identity(), &observed, &model, f64::INFINITY, &mut scratch)
            .unwrap();
        assert_relative_eq!(full, 27.0, epsilon = 1e-12);

        let cut = NearestNeighborScorer
            .score(&Matrix3::identity(), &observed, &model, 10.0, &mut scratch)
            .unwrap();
        assert!(cut >= 10.0);
    }

    #[test]
    fn projection_to_infinity_is_unscorable() {
        // Maps x = 0 to the line at infinity.
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        let model = [[0.0, 1.0], [1.0, 1.0]];
        let observed = [[1.0, 1.0]];
        let mut scratch = ScoreScratch::default();
        assert!(NearestNeighborScorer
            .score(&h, &observed, &model, f64::INFINITY, &mut scratch)
            .is_none());
    }

    #[test]
    fn model_space_scorer_measures_in_model_units() {
        // Image = 2 × model.
        let h = Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0);
        let model = [[0.0, 0.0], [10.0, 0.0]];
        let observed = [[0.0, 2.0], [20.0, 0.0], [100.0, 100.0]];
        let mut scratch = ScoreScratch::default();

        let err = ModelSpaceScorer
            .score(&h, &observed, &model, f64::INFINITY, &mut scratch)
            .unwrap();
        // First model point is 1 model unit from observed[0] mapped back.
        assert_relative_eq!(err, 1.0, epsilon = 1e-12);
        assert_eq!(scratch.correspondence, vec![0, 1]);

        let img = NearestNeighborScorer
            .score(&h, &observed, &model, f64::INFINITY, &mut scratch)
            .unwrap();
        assert_relative_eq!(img, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn model_space_scorer_rejects_singular_h() {
        let h = Matrix3::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0);
        let mut scratch = ScoreScratch::default();
        assert!(ModelSpaceScorer
            .score(&h, &[[0.0, 0.0]], &[[1.0, 1.0]], f64::INFINITY, &mut scratch)
            .is_none());
    }
}
