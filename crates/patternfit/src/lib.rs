//! patternfit: locate a known planar point pattern in unordered image points.
//!
//! Given candidate points extracted from an image (e.g. endpoints of detected
//! line segments) and the fixed reference geometry of a planar pattern (e.g.
//! the line intersections of a tennis court), the crate searches for the
//! homography mapping the pattern into the image. The search is a random
//! sample consensus over *unpaired* sets:
//!
//! 1. **Sample** – draw a few observed points and, independently, a few model
//!    points.
//! 2. **Solve** – DLT homography pairing the two samples in draw order.
//! 3. **Score** – project every model point, match it to the nearest observed
//!    point, sum the squared distances.
//! 4. **Select** – keep the lowest-error candidate across all iterations.
//!
//! # Public API
//! - [`fit`] / [`fit_with_rng`] for the plain contract
//! - [`CorrespondenceSearch`] + [`FitConfig`] for seeding, parallelism, time
//!   budgets and pluggable [`SampleStrategy`] / [`Scorer`] implementations
//! - [`segments`] and [`court`] for the detector boundary and reference
//!   geometry

mod config;
pub mod court;
mod error;
pub mod homography;
mod result;
mod sampling;
mod scoring;
mod search;
pub mod segments;

pub use config::{FitConfig, DEFAULT_MIN_SEPARATION, MIN_SAMPLE_SIZE};
pub use error::{FitError, PointSetKind};
pub use homography::HomographyError;
pub use result::{FitResult, FitStats};
pub use sampling::{NonDegenerateSampler, Sample, SampleStrategy, UniformSampler};
pub use scoring::{ModelSpaceScorer, NearestNeighborScorer, ScoreScratch, Scorer};
pub use search::{fit, fit_with_rng, CorrespondenceSearch};
