//! Detector boundary: scored line segments → observed points.
//!
//! The segment detector is external. Callers filter its output by score and
//! flatten the surviving endpoints before running the search.

use serde::{Deserialize, Serialize};

/// Score threshold applied to detector segments by default.
pub const DEFAULT_MIN_SCORE: f32 = 0.97;

/// A detected line segment with its detector confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub p0: [f64; 2],
    pub p1: [f64; 2],
    pub score: f32,
}

impl LineSegment {
    pub fn new(p0: [f64; 2], p1: [f64; 2], score: f32) -> Self {
        Self { p0, p1, score }
    }
}

/// Endpoints of every segment scoring strictly above `min_score`.
///
/// All `p0` endpoints come first (in segment order), followed by all `p1`
/// endpoints. Shared endpoints are not merged.
pub fn flatten_endpoints(segments: &[LineSegment], min_score: f32) -> Vec<[f64; 2]> {
    let kept: Vec<&LineSegment> = segments.iter().filter(|s| s.score > min_score).collect();
    tracing::debug!(
        "{} of {} segments above score {}",
        kept.len(),
        segments.len(),
        min_score
    );
    kept.iter()
        .map(|s| s.p0)
        .chain(kept.iter().map(|s| s.p1))
        .collect()
}
