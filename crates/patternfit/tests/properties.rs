use std::time::Duration;

use approx::assert_relative_eq;
use nalgebra::Matrix3;
use patternfit::court::{max_deviation, tennis_court_points};
use patternfit::homography::project;
use patternfit::segments::{flatten_endpoints, LineSegment, DEFAULT_MIN_SCORE};
use patternfit::{
    fit, fit_with_rng, CorrespondenceSearch, FitConfig, FitError, NonDegenerateSampler,
    PointSetKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn perspective() -> Matrix3<f64> {
    Matrix3::new(
        8.0, -1.2, 310.0,
        0.6, 6.5, 95.0,
        0.0015, -0.003, 1.0,
    )
}

/// Five points with no projective symmetry.
fn asymmetric_model() -> Vec<[f64; 2]> {
    vec![[0.0, 0.0], [40.0, 3.0], [37.0, 25.0], [-4.0, 22.0], [15.0, 9.0]]
}

fn random_points(rng: &mut StdRng, n: usize, extent: f64) -> Vec<[f64; 2]> {
    (0..n)
        .map(|_| [rng.gen_range(0.0..extent), rng.gen_range(0.0..extent)])
        .collect()
}

#[test]
fn fixed_seed_gives_identical_results() {
    let mut rng = StdRng::seed_from_u64(42);
    let observed = random_points(&mut rng, 20, 500.0);
    let model = random_points(&mut rng, 7, 50.0);

    let cfg = FitConfig::new(4000, 4).with_seed(99).with_chunk_size(512);
    let search = CorrespondenceSearch::new(cfg);
    let a = search.fit(&observed, &model).unwrap();
    let b = search.fit(&observed, &model).unwrap();
    assert_eq!(a, b);

    let c = fit_with_rng(&observed, &model, 1500, 4, &mut StdRng::seed_from_u64(7)).unwrap();
    let d = fit_with_rng(&observed, &model, 1500, 4, &mut StdRng::seed_from_u64(7)).unwrap();
    assert_eq!(c, d);
}

#[test]
fn more_iterations_never_increase_error() {
    let mut rng = StdRng::seed_from_u64(3);
    let observed = random_points(&mut rng, 25, 300.0);
    let model = random_points(&mut rng, 8, 30.0);

    for seed in 0..3 {
        let n = 1000;
        let m = 2500;
        let short = CorrespondenceSearch::new(FitConfig::new(n, 4).with_seed(seed))
            .fit(&observed, &model)
            .unwrap();
        let long = CorrespondenceSearch::new(FitConfig::new(n + m, 4).with_seed(seed))
            .fit(&observed, &model)
            .unwrap();
        assert!(long.error <= short.error, "seed {seed}: {} > {}", long.error, short.error);
    }
}

#[test]
fn noise_free_view_recovers_homography() {
    let h = perspective();
    let model = asymmetric_model();
    let observed: Vec<[f64; 2]> = model.iter().map(|&m| project(&h, m)).collect();

    let result = CorrespondenceSearch::new(FitConfig::new(3000, 4).with_seed(11))
        .fit(&observed, &model)
        .unwrap();

    assert!(result.error < 1e-6, "error {}", result.error);
    for (m, o) in model.iter().zip(&observed) {
        let p = result.project(*m);
        assert_relative_eq!(p[0], o[0], epsilon = 1e-6);
        assert_relative_eq!(p[1], o[1], epsilon = 1e-6);
    }
    let recovered = result.matrix();
    for (a, b) in recovered.iter().zip(h.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-8, max_relative = 1e-6);
    }
}

#[test]
fn recovers_pattern_among_distractors() {
    let h = perspective();
    let model = asymmetric_model();
    let mut observed: Vec<[f64; 2]> = model.iter().map(|&m| project(&h, m)).collect();
    let mut rng = StdRng::seed_from_u64(5);
    observed.extend(random_points(&mut rng, 3, 600.0));

    let result = CorrespondenceSearch::new(FitConfig::new(40_000, 4).with_seed(2))
        .with_sampler(NonDegenerateSampler::default())
        .fit(&observed, &model)
        .unwrap();

    assert!(result.error < 1e-6, "error {}", result.error);
    assert_eq!(result.correspondence, vec![0, 1, 2, 3, 4]);
}

#[test]
fn too_few_observed_points() {
    let observed = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    let model = asymmetric_model();
    assert_eq!(
        fit(&observed, &model, 100, 4),
        Err(FitError::InsufficientPoints {
            set: PointSetKind::Observed,
            needed: 4,
            got: 3
        })
    );
}

#[test]
fn too_few_model_points() {
    let observed = asymmetric_model();
    let model = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    assert!(matches!(
        fit(&observed, &model, 100, 4),
        Err(FitError::InsufficientPoints {
            set: PointSetKind::Model,
            ..
        })
    ));
}

#[test]
fn collinear_observations_never_fit() {
    let observed: Vec<[f64; 2]> = (0..10).map(|i| [i as f64 * 3.0, i as f64 * 1.5 + 2.0]).collect();
    let model = asymmetric_model();

    let err = CorrespondenceSearch::new(FitConfig::new(500, 4).with_seed(1).with_chunk_size(64))
        .fit(&observed, &model)
        .unwrap_err();
    assert_eq!(err, FitError::NoValidFit { iterations: 500 });
}

#[test]
fn several_model_points_can_share_an_observation() {
    let observed = [[0.0, 0.0], [10.0, 0.0], [10.0, 8.0], [1.0, 9.0]];
    let model = [
        [0.0, 0.0],
        [0.5, 0.2],
        [10.0, 0.0],
        [9.7, 0.4],
        [10.0, 8.0],
        [9.6, 8.3],
        [1.0, 9.0],
        [1.3, 8.8],
    ];

    let result = fit(&observed, &model, 2000, 4).unwrap();
    assert_eq!(result.correspondence.len(), model.len());
    assert!(result.distinct_matches() <= observed.len());
    assert!(result.correspondence.iter().all(|&i| i < observed.len()));
}

#[test]
fn error_scales_with_square_of_point_scale() {
    let mut rng = StdRng::seed_from_u64(21);
    let observed = random_points(&mut rng, 15, 100.0);
    let model = random_points(&mut rng, 6, 100.0);
    let s = 4.0;
    let observed_s: Vec<[f64; 2]> = observed.iter().map(|p| [p[0] * s, p[1] * s]).collect();
    let model_s: Vec<[f64; 2]> = model.iter().map(|p| [p[0] * s, p[1] * s]).collect();

    let search = CorrespondenceSearch::new(FitConfig::new(3000, 4).with_seed(8));
    let a = search.fit(&observed, &model).unwrap();
    let b = search.fit(&observed_s, &model_s).unwrap();

    assert_relative_eq!(b.error, a.error * s * s, max_relative = 1e-9);
    assert_eq!(a.correspondence, b.correspondence);
    assert_eq!(a.stats.best_iteration, b.stats.best_iteration);
}

#[test]
fn time_budget_stops_early() {
    let mut rng = StdRng::seed_from_u64(1);
    let observed = random_points(&mut rng, 30, 100.0);
    let model = random_points(&mut rng, 10, 100.0);

    let cfg = FitConfig::new(50_000_000, 4).with_time_budget(Duration::from_millis(100));
    let result = CorrespondenceSearch::new(cfg).fit(&observed, &model).unwrap();
    assert!(result.stats.timed_out);
    assert!(result.stats.iterations_evaluated < 50_000_000);
}

#[test]
fn segments_feed_the_search() {
    let h = perspective();
    let model = asymmetric_model();
    let img: Vec<[f64; 2]> = model.iter().map(|&m| project(&h, m)).collect();
    let segments = vec![
        LineSegment::new(img[0], img[1], 0.99),
        LineSegment::new(img[2], img[3], 0.985),
        LineSegment::new(img[4], img[0], 0.98),
        LineSegment::new([5.0, 5.0], [600.0, 20.0], 0.3),
    ];
    let observed = flatten_endpoints(&segments, 0.97);
    assert_eq!(observed.len(), 6);

    let result = CorrespondenceSearch::new(FitConfig::new(20_000, 4).with_seed(4))
        .fit(&observed, &model)
        .unwrap();
    assert!(result.error < 1e-6, "error {}", result.error);
}

#[test]
fn jittered_court_segments_locate_the_court() {
    let camera = Matrix3::new(
        9.5, 4.0, 180.0,
        -0.4, 6.0, 210.0,
        -0.0008, 0.009, 1.0,
    );
    let model = tennis_court_points();
    let mut rng = StdRng::seed_from_u64(1);
    let mut jittered = |i: usize| {
        let p = project(&camera, model[i]);
        [
            p[0] + rng.gen_range(-0.7..0.7),
            p[1] + rng.gen_range(-0.7..0.7),
        ]
    };

    // Lines meeting at a court corner report that corner once per line.
    let lines = [(0, 1), (3, 2), (0, 3), (1, 2), (4, 5), (7, 6), (8, 11), (9, 10), (12, 13)];
    let mut segments: Vec<LineSegment> = lines
        .iter()
        .map(|&(a, b)| LineSegment::new(jittered(a), jittered(b), 0.99))
        .collect();
    segments.push(LineSegment::new([900.0, 600.0], [980.0, 640.0], 0.6));
    let observed = flatten_endpoints(&segments, DEFAULT_MIN_SCORE);
    assert_eq!(observed.len(), 18);

    let result = CorrespondenceSearch::new(FitConfig::new(200_000, 4).with_seed(3))
        .with_sampler(NonDegenerateSampler::default())
        .fit(&observed, &model)
        .unwrap();

    let deviation = max_deviation(&result.matrix(), &camera);
    assert!(
        deviation < 5.0,
        "deviation {deviation:.2}px, error {}, correspondence {:?}",
        result.error,
        result.correspondence
    );
    assert!(result.distinct_matches() >= 12, "{:?}", result.correspondence);
}
