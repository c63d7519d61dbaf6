//! Sample strategies for the correspondence search.
//!
//! A strategy fills a [`Sample`] with `size` observed indices and `size`
//! model indices per iteration. The two draws are independent: no pairing
//! between observed and model points is assumed.

use rand::Rng;

use crate::homography::{has_coincident_pair, has_collinear_triple, separation_threshold};

/// Reusable per-worker sample buffers.
///
/// Index pools persist across draws so that each draw is a partial
/// Fisher–Yates shuffle costing `O(size)` instead of `O(n)`. The sample also
/// carries the squared distance below which two drawn points of a set count
/// as coincident.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Drawn observed indices, in draw order.
    pub observed: Vec<usize>,
    /// Drawn model indices, in draw order.
    pub model: Vec<usize>,
    /// Observed coordinates aligned with `observed`.
    pub observed_points: Vec<[f64; 2]>,
    /// Model coordinates aligned with `model`.
    pub model_points: Vec<[f64; 2]>,
    observed_pool: Vec<usize>,
    model_pool: Vec<usize>,
    observed_min_sq: f64,
    model_min_sq: f64,
    size: usize,
}

impl Sample {
    /// Buffers for drawing `size` points from each set.
    ///
    /// `min_separation` is a fraction of each set's bounding-box diagonal;
    /// see [`FitConfig::min_separation`](crate::FitConfig::min_separation).
    pub fn new(
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        size: usize,
        min_separation: f64,
    ) -> Self {
        debug_assert!(size <= observed.len() && size <= model.len());
        Self {
            observed: Vec::with_capacity(size),
            model: Vec::with_capacity(size),
            observed_points: Vec::with_capacity(size),
            model_points: Vec::with_capacity(size),
            observed_pool: (0..observed.len()).collect(),
            model_pool: (0..model.len()).collect(),
            observed_min_sq: separation_threshold(observed, min_separation),
            model_min_sq: separation_threshold(model, min_separation),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Squared coincidence distance in the observed (image) set.
    pub fn observed_min_sq(&self) -> f64 {
        self.observed_min_sq
    }

    /// True when either drawn set holds two coincident points.
    pub fn has_coincident_points(&self) -> bool {
        has_coincident_pair(&self.observed_points, self.observed_min_sq)
            || has_coincident_pair(&self.model_points, self.model_min_sq)
    }

    /// Draw `size` distinct observed indices, then `size` distinct model
    /// indices, uniformly without replacement, and gather their coordinates.
    pub fn draw_uniform<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
    ) {
        partial_shuffle(rng, &mut self.observed_pool, self.size, &mut self.observed);
        partial_shuffle(rng, &mut self.model_pool, self.size, &mut self.model);

        self.observed_points.clear();
        self.observed_points
            .extend(self.observed.iter().map(|&i| observed[i]));
        self.model_points.clear();
        self.model_points.extend(self.model.iter().map(|&i| model[i]));
    }
}

/// Move `k` uniformly chosen pool entries to the front and copy them to `out`.
fn partial_shuffle<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &mut [usize],
    k: usize,
    out: &mut Vec<usize>,
) {
    let n = pool.len();
    out.clear();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        pool.swap(i, j);
        out.push(pool[i]);
    }
}

/// How each iteration picks its observed and model subsets.
pub trait SampleStrategy: Send + Sync {
    /// Fill `sample` for one iteration.
    fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        sample: &mut Sample,
    );
}

/// Independent uniform draws from both point sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSampler;

impl SampleStrategy for UniformSampler {
    #[inline]
    fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        sample: &mut Sample,
    ) {
        sample.draw_uniform(rng, observed, model);
    }
}

/// Uniform draws, redrawn while either subset has a collinear triple or two
/// coincident points.
///
/// After `max_attempts` draws the last one is kept and left for the
/// homography solver to reject.
#[derive(Debug, Clone, Copy)]
pub struct NonDegenerateSampler {
    pub max_attempts: usize,
}

impl Default for NonDegenerateSampler {
    fn default() -> Self {
        Self { max_attempts: 32 }
    }
}

impl SampleStrategy for NonDegenerateSampler {
    fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        observed: &[[f64; 2]],
        model: &[[f64; 2]],
        sample: &mut Sample,
    ) {
        for _ in 0..self.max_attempts.max(1) {
            sample.draw_uniform(rng, observed, model);
            if !sample.has_coincident_points()
                && !has_collinear_triple(&sample.observed_points)
                && !has_collinear_triple(&sample.model_points)
            {
                return;
            }
        }
    }
}
