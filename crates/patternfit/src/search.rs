//! Random-sampling correspondence search.
//!
//! Each iteration draws a sample from both point sets, solves the homography
//! pairing the two samples in draw order, and scores it against the full
//! point sets. The best candidate is an explicit fold value: every chunk of
//! iterations folds its own best, and chunk bests are reduced by
//! `(error, iteration)` so that parallel and sequential runs agree.

use std::ops::Range;
use std::time::Instant;

use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::FitConfig;
use crate::error::{FitError, PointSetKind};
use crate::homography::{estimate_homography, has_coincident_pair, project};
use crate::result::{FitResult, FitStats};
use crate::sampling::{Sample, SampleStrategy, UniformSampler};
use crate::scoring::{NearestNeighborScorer, ScoreScratch, Scorer};

/// Best candidate of a fold.
#[derive(Debug, Clone)]
struct Candidate {
    error: f64,
    iteration: usize,
    homography: Matrix3<f64>,
    correspondence: Vec<usize>,
}

impl Candidate {
    /// Strictly lower error wins; equal errors keep the earlier iteration.
    fn beats(&self, other: &Candidate) -> bool {
        self.error < other.error
            || (self.error == other.error && self.iteration < other.iteration)
    }
}

/// Fold state for a range of iterations.
#[derive(Debug, Clone, Default)]
struct Outcome {
    best: Option<Candidate>,
    evaluated: usize,
    degenerate: usize,
    timed_out: bool,
}

impl Outcome {
    fn merge(self, other: Outcome) -> Outcome {
        let best = match (self.best, other.best) {
            (Some(a), Some(b)) => Some(if b.beats(&a) { b } else { a }),
            (a, b) => a.or(b),
        };
        Outcome {
            best,
            evaluated: self.evaluated + other.evaluated,
            degenerate: self.degenerate + other.degenerate,
            timed_out: self.timed_out || other.timed_out,
        }
    }

    fn best_error(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |c| c.error)
    }
}

/// Random sample consensus over unpaired point sets.
///
/// The sample strategy and the scoring function are pluggable; the loop,
/// seeding, parallelism and best-result reduction stay the same.
///
/// ```
/// use patternfit::{CorrespondenceSearch, FitConfig};
///
/// let model = [[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 3.0], [1.0, 2.0]];
/// let observed: Vec<[f64; 2]> = model.iter().map(|p| [10.0 + 2.0 * p[0], 5.0 + 2.0 * p[1]]).collect();
///
/// let search = CorrespondenceSearch::new(FitConfig::new(5000, 4).with_seed(1));
/// let fit = search.fit(&observed, &model).unwrap();
/// assert!(fit.error < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct CorrespondenceSearch<S = UniformSampler, C = NearestNeighborScorer> {
    config: FitConfig,
    sampler: S,
    scorer: C,
}

impl CorrespondenceSearch {
    /// Search with uniform sampling and image-space nearest-neighbour scoring.
    pub fn new(config: FitConfig) -> Self {
        Self {
            config,
            sampler: UniformSampler,
            scorer: NearestNeighborScorer,
        }
    }
}

impl Default for CorrespondenceSearch {
    fn default() -> Self {
        Self::new(FitConfig::default())
    }
}

impl<S, C> CorrespondenceSearch<S, C>
where
    S: SampleStrategy,
    C: Scorer,
{
    /// Replace the sample strategy.
    pub fn with_sampler<S2: SampleStrategy>(self, sampler: S2) -> CorrespondenceSearch<S2, C> {
        CorrespondenceSearch {
            config: self.config,
            sampler,
            scorer: self.scorer,
        }
    }

    /// Replace the scoring function.
    pub fn with_scorer<C2: Scorer>(self, scorer: C2) -> CorrespondenceSearch<S, C2> {
        CorrespondenceSearch {
            config: self.config,
            sampler: self.sampler,
            scorer,
        }
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Run the search with seeded per-chunk RNG streams.
    ///
    /// Chunk `c` covers iterations `[c * chunk_size, (c + 1) * chunk_size)`
    /// and draws from a stream derived from `(seed, c)`, so the result does
    /// not depend on `parallel`, and a run with more iterations evaluates a
    /// superset of the samples of a shorter one.
    pub fn fit(&self, observed: &[[f64; 2]], model: &[[f64; 2]]) -> Result<FitResult, FitError> {
        self.validate(observed, model)?;
        let cfg = &self.config;
        let deadline = cfg.time_budget.map(|b| Instant::now() + b);
        let n_chunks = cfg.iterations.div_ceil(cfg.chunk_size);

        tracing::debug!(
            "correspondence search: {} observed, {} model, {} iterations in {} chunks, sample size {}",
            observed.len(),
            model.len(),
            cfg.iterations,
            n_chunks,
            cfg.sample_size
        );

        let outcome = if cfg.parallel && n_chunks > 1 {
            self.fit_chunks_parallel(observed, model, n_chunks, deadline)
        } else {
            self.fit_chunks_sequential(observed, model, n_chunks, deadline)
        };
        self.finish(outcome)
    }

    /// Run the search drawing every sample from a caller-supplied RNG.
    ///
    /// Iterations run sequentially in a single stream; continuing the same
    /// stream for more iterations can only lower the error.
    pub fn fit_with_rng<R: Rng + ?Sized>(
        &self,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        rng: &mut R,
    ) -> Result<FitResult, FitError> {
        self.validate(observed, model)?;
        let deadline = self.config.time_budget.map(|b| Instant::now() + b);
        let outcome = self.run_range(
            rng,
            observed,
            model,
            0..self.config.iterations,
            f64::INFINITY,
            deadline,
        );
        self.finish(outcome)
    }

    fn validate(&self, observed: &[[f64; 2]], model: &[[f64; 2]]) -> Result<(), FitError> {
        self.config.validate()?;
        let needed = self.config.sample_size;
        for (set, pts) in [(PointSetKind::Observed, observed), (PointSetKind::Model, model)] {
            if pts.len() < needed {
                return Err(FitError::InsufficientPoints {
                    set,
                    needed,
                    got: pts.len(),
                });
            }
            let non_finite = pts.iter().position(|p| !(p[0].is_finite() && p[1].is_finite()));
            if let Some(index) = non_finite {
                return Err(FitError::NonFinitePoint { set, index });
            }
        }
        Ok(())
    }

    fn chunk_range(&self, chunk: usize) -> Range<usize> {
        let start = chunk * self.config.chunk_size;
        start..(start + self.config.chunk_size).min(self.config.iterations)
    }

    fn fit_chunks_sequential(
        &self,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        n_chunks: usize,
        deadline: Option<Instant>,
    ) -> Outcome {
        let mut total = Outcome::default();
        for chunk in 0..n_chunks {
            let mut rng = chunk_rng(self.config.seed, chunk);
            // Anything not below the running best would lose the reduction anyway.
            let bound = total.best_error();
            let outcome = self.run_range(
                &mut rng,
                observed,
                model,
                self.chunk_range(chunk),
                bound,
                deadline,
            );
            total = total.merge(outcome);
            if total.timed_out {
                break;
            }
        }
        total
    }

    #[cfg(feature = "parallel")]
    fn fit_chunks_parallel(
        &self,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        n_chunks: usize,
        deadline: Option<Instant>,
    ) -> Outcome {
        use rayon::prelude::*;

        (0..n_chunks)
            .into_par_iter()
            .map(|chunk| {
                let mut rng = chunk_rng(self.config.seed, chunk);
                self.run_range(
                    &mut rng,
                    observed,
                    model,
                    self.chunk_range(chunk),
                    f64::INFINITY,
                    deadline,
                )
            })
            .reduce(Outcome::default, Outcome::merge)
    }

    #[cfg(not(feature = "parallel"))]
    fn fit_chunks_parallel(
        &self,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        n_chunks: usize,
        deadline: Option<Instant>,
    ) -> Outcome {
        self.fit_chunks_sequential(observed, model, n_chunks, deadline)
    }

    /// Fold one contiguous range of iterations drawn from `rng`.
    ///
    /// Candidates are only recorded when their error is below `bound`.
    fn run_range<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        iterations: Range<usize>,
        bound: f64,
        deadline: Option<Instant>,
    ) -> Outcome {
        let mut sample = Sample::new(
            observed,
            model,
            self.config.sample_size,
            self.config.min_separation,
        );
        let mut scratch = ScoreScratch::with_capacity(model.len().max(observed.len()));
        let mut out = Outcome::default();
        let mut bound = bound;

        for iteration in iterations {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                out.timed_out = true;
                break;
            }
            out.evaluated += 1;

            self.sampler.draw(rng, observed, model, &mut sample);
            if sample.has_coincident_points() {
                out.degenerate += 1;
                continue;
            }

            let Ok(h) = estimate_homography(&sample.model_points, &sample.observed_points) else {
                out.degenerate += 1;
                continue;
            };
            if merges_model_points(&h, model, sample.observed_min_sq(), &mut scratch.projected) {
                out.degenerate += 1;
                continue;
            }
            let Some(error) = self.scorer.score(&h, observed, model, bound, &mut scratch) else {
                out.degenerate += 1;
                continue;
            };

            if error < bound {
                tracing::trace!("iteration {}: error {:.6} (was {:.6})", iteration, error, bound);
                bound = error;
                match out.best.as_mut() {
                    Some(best) => {
                        best.error = error;
                        best.iteration = iteration;
                        best.homography = h;
                        best.correspondence.clone_from(&scratch.correspondence);
                    }
                    None => {
                        out.best = Some(Candidate {
                            error,
                            iteration,
                            homography: h,
                            correspondence: scratch.correspondence.clone(),
                        });
                    }
                }
            }
        }
        out
    }

    fn finish(&self, outcome: Outcome) -> Result<FitResult, FitError> {
        if outcome.timed_out {
            tracing::warn!(
                "time budget expired after {} of {} iterations",
                outcome.evaluated,
                self.config.iterations
            );
        }
        let Some(best) = outcome.best else {
            tracing::warn!(
                "no valid fit: {} of {} evaluated iterations were degenerate",
                outcome.degenerate,
                outcome.evaluated
            );
            return Err(FitError::NoValidFit {
                iterations: outcome.evaluated,
            });
        };

        let stats = FitStats {
            iterations_requested: self.config.iterations,
            iterations_evaluated: outcome.evaluated,
            degenerate_iterations: outcome.degenerate,
            best_iteration: best.iteration,
            timed_out: outcome.timed_out,
        };
        tracing::info!(
            "best fit: error {:.6} at iteration {} ({} evaluated, {} degenerate)",
            best.error,
            best.iteration,
            stats.iterations_evaluated,
            stats.degenerate_iterations
        );
        Ok(FitResult::new(
            &best.homography,
            best.error,
            best.correspondence,
            stats,
        ))
    }
}

/// True when `h` sends two model points closer together than
/// `sqrt(min_dist_sq)` in the image. Uses `buf` as scratch.
fn merges_model_points(
    h: &Matrix3<f64>,
    model: &[[f64; 2]],
    min_dist_sq: f64,
    buf: &mut Vec<[f64; 2]>,
) -> bool {
    if min_dist_sq <= 0.0 {
        return false;
    }
    buf.clear();
    buf.extend(model.iter().map(|&m| project(h, m)));
    has_coincident_pair(buf, min_dist_sq)
}

/// Independent stream for chunk `chunk` of a run seeded with `seed`.
fn chunk_rng(seed: u64, chunk: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (chunk as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Fit with default settings and an explicit iteration count and sample size.
pub fn fit(
    observed: &[[f64; 2]],
    model: &[[f64; 2]],
    iterations: usize,
    sample_size: usize,
) -> Result<FitResult, FitError> {
    CorrespondenceSearch::new(FitConfig::new(iterations, sample_size)).fit(observed, model)
}

/// Like [`fit`], drawing every sample from `rng`.
pub fn fit_with_rng<R: Rng + ?Sized>(
    observed: &[[f64; 2]],
    model: &[[f64; 2]],
    iterations: usize,
    sample_size: usize,
    rng: &mut R,
) -> Result<FitResult, FitError> {
    CorrespondenceSearch::new(FitConfig::new(iterations, sample_size))
        .fit_with_rng(observed, model, rng)
}
