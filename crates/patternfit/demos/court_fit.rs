//! Locate a tennis court in a synthetic detector output.
//!
//! Projects the court model through a known camera homography, turns the
//! court lines into scored segments with jittered endpoints, adds clutter,
//! runs the search and prints the result as JSON. Exits with an error when
//! the fit strays from the true camera by more than a few pixels.
//!
//! Usage: `cargo run --release --example court_fit [iterations] [seed]`

use nalgebra::Matrix3;
use patternfit::court::{image_to_top_down, max_deviation, tennis_court_points, top_down_size};
use patternfit::homography::project;
use patternfit::segments::{flatten_endpoints, LineSegment, DEFAULT_MIN_SCORE};
use patternfit::{CorrespondenceSearch, FitConfig, NonDegenerateSampler};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;

/// Largest accepted distance between fitted and true court points.
const MAX_DEVIATION_PX: f64 = 5.0;
/// Resolution of the rectified top-down view.
const PX_PER_FT: f64 = 4.0;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let defaults = FitConfig::default();
    let iterations: usize = match args.get(1) {
        Some(s) => s.parse()?,
        None => defaults.iterations,
    };
    let seed: u64 = match args.get(2) {
        Some(s) => s.parse()?,
        None => defaults.seed,
    };

    let camera = Matrix3::new(
        9.5, 4.0, 180.0,
        -0.4, 6.0, 210.0,
        -0.0008, 0.009, 1.0,
    );
    let model = tennis_court_points();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut jitter = |p: [f64; 2]| {
        [
            p[0] + rng.gen_range(-0.7..0.7),
            p[1] + rng.gen_range(-0.7..0.7),
        ]
    };

    // Court lines as (model index, model index) pairs.
    let lines = [(0, 1), (3, 2), (0, 3), (1, 2), (4, 5), (7, 6), (8, 11), (9, 10), (12, 13)];
    let mut segments: Vec<LineSegment> = lines
        .iter()
        .map(|&(a, b)| {
            let p0 = jitter(project(&camera, model[a]));
            let p1 = jitter(project(&camera, model[b]));
            LineSegment::new(p0, p1, 0.99)
        })
        .collect();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(2));
    for _ in 0..6 {
        let p0 = [rng.gen_range(0.0..1280.0), rng.gen_range(0.0..720.0)];
        let p1 = [p0[0] + rng.gen_range(-80.0..80.0), p0[1] + rng.gen_range(-80.0..80.0)];
        segments.push(LineSegment::new(p0, p1, rng.gen_range(0.5..1.0)));
    }

    let observed = flatten_endpoints(&segments, DEFAULT_MIN_SCORE);
    tracing::info!(
        "{} segments -> {} observed points, {} model points",
        segments.len(),
        observed.len(),
        model.len()
    );

    let search = CorrespondenceSearch::new(FitConfig::new(iterations, 4).with_seed(seed))
        .with_sampler(NonDegenerateSampler::default());
    let result = search.fit(&observed, &model)?;

    let deviation = max_deviation(&result.matrix(), &camera);
    tracing::info!(
        "rms match distance {:.3}px, max deviation from true camera {:.3}px",
        result.rms_error(),
        deviation
    );
    if deviation > MAX_DEVIATION_PX {
        tracing::warn!(
            "fit does not locate the court ({} distinct matches for {} model points)",
            result.distinct_matches(),
            model.len()
        );
        return Err(format!(
            "deviation {deviation:.1}px exceeds {MAX_DEVIATION_PX}px; try more iterations"
        )
        .into());
    }

    let [w, h] = top_down_size(PX_PER_FT);
    if let Some(warp) = image_to_top_down(&result.matrix(), PX_PER_FT) {
        tracing::info!("image -> {}x{} top-down view:{:.5}", w, h, warp);
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
