use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Smallest sample that determines a projective homography.
pub const MIN_SAMPLE_SIZE: usize = 4;

/// Default [`FitConfig::min_separation`].
pub const DEFAULT_MIN_SEPARATION: f64 = 0.005;

/// Configuration for the random-sampling correspondence search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Number of sampling iterations.
    ///
    /// Large counts (10⁵–10⁶) are needed on real detector output; tests can
    /// use a few thousand.
    pub iterations: usize,
    /// Points drawn from each set per iteration (≥ 4).
    pub sample_size: usize,
    /// Base seed. Chunk `c` draws from its own stream derived from
    /// `(seed, c)`.
    pub seed: u64,
    /// Evaluate chunks on the rayon pool (requires the `parallel` feature;
    /// ignored otherwise). Results are identical either way.
    pub parallel: bool,
    /// Iterations per RNG stream and per unit of parallel work.
    pub chunk_size: usize,
    /// Coincidence tolerance, as a fraction of a point set's bounding-box
    /// diagonal.
    ///
    /// A sample holding two points closer than this, or a candidate that
    /// projects two model points closer than this (measured against the
    /// observed set), is degenerate. Repeated detector endpoints would
    /// otherwise yield homographies that fold the whole model onto one
    /// observation. `0.0` disables the check.
    pub min_separation: f64,
    /// Optional wall-clock budget, checked between iterations. When it
    /// expires the best fit found so far is returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_budget: Option<Duration>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            iterations: 500_000,
            sample_size: MIN_SAMPLE_SIZE,
            seed: 0,
            parallel: true,
            chunk_size: 4096,
            min_separation: DEFAULT_MIN_SEPARATION,
            time_budget: None,
        }
    }
}

impl FitConfig {
    /// Default configuration with an explicit iteration count and sample size.
    pub fn new(iterations: usize, sample_size: usize) -> Self {
        Self {
            iterations,
            sample_size,
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_min_separation(mut self, fraction: f64) -> Self {
        self.min_separation = fraction;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), FitError> {
        if self.iterations == 0 {
            return Err(FitError::InvalidConfig("iterations must be >= 1".into()));
        }
        if self.sample_size < MIN_SAMPLE_SIZE {
            return Err(FitError::InvalidConfig(format!(
                "sample_size must be >= {MIN_SAMPLE_SIZE}, got {}",
                self.sample_size
            )));
        }
        if self.chunk_size == 0 {
            return Err(FitError::InvalidConfig("chunk_size must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&self.min_separation) {
            return Err(FitError::InvalidConfig(format!(
                "min_separation must be in [0, 1), got {}",
                self.min_separation
            )));
        }
        Ok(())
    }
}
