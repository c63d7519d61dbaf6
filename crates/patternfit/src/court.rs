//! Reference geometry for a tennis court.
//!
//! Coordinates are in feet with the origin at one doubles corner: `x` runs
//! along the 78 ft length, `y` across the 36 ft doubles width.

use nalgebra::Matrix3;

use crate::homography::{invert, project};

/// Court length (baseline to baseline), feet.
pub const COURT_LENGTH_FT: f64 = 78.0;
/// Doubles width, feet.
pub const COURT_WIDTH_FT: f64 = 36.0;
/// Singles sideline inset from the doubles sideline, feet.
pub const ALLEY_WIDTH_FT: f64 = 4.5;
/// Service line distance from the baseline, feet.
pub const SERVICE_LINE_FROM_BASELINE_FT: f64 = 18.0;

/// Painted-line intersections of a tennis court.
///
/// Order: the four doubles corners, the four singles/baseline corners, the
/// four singles/service-line corners, then the two service T junctions.
pub fn tennis_court_points() -> Vec<[f64; 2]> {
    let l = COURT_LENGTH_FT;
    let w = COURT_WIDTH_FT;
    let a = ALLEY_WIDTH_FT;
    let s = SERVICE_LINE_FROM_BASELINE_FT;
    vec![
        [0.0, 0.0],
        [l, 0.0],
        [l, w],
        [0.0, w],
        [0.0, a],
        [l, a],
        [l, w - a],
        [0.0, w - a],
        [s, a],
        [l - s, a],
        [l - s, w - a],
        [s, w - a],
        [s, w / 2.0],
        [l - s, w / 2.0],
    ]
}

/// Output size, in pixels, of a top-down court view at `px_per_ft`.
pub fn top_down_size(px_per_ft: f64) -> [u32; 2] {
    [
        (COURT_LENGTH_FT * px_per_ft).round() as u32,
        (COURT_WIDTH_FT * px_per_ft).round() as u32,
    ]
}

/// Homography taking image pixels to a top-down court view at `px_per_ft`.
///
/// `model_to_image` is a fitted court → image homography; the returned map
/// sends the court into a `top_down_size(px_per_ft)` frame. `None` when the
/// fit is not invertible.
pub fn image_to_top_down(model_to_image: &Matrix3<f64>, px_per_ft: f64) -> Option<Matrix3<f64>> {
    let scale = Matrix3::new(px_per_ft, 0.0, 0.0, 0.0, px_per_ft, 0.0, 0.0, 0.0, 1.0);
    invert(model_to_image).map(|to_model| scale * to_model)
}

/// Reflection `k` (0..4) of a court point about the centre lines; 0 is the
/// identity.
fn mirror(p: [f64; 2], k: usize) -> [f64; 2] {
    let x = if k & 1 == 0 { p[0] } else { COURT_LENGTH_FT - p[0] };
    let y = if k & 2 == 0 { p[1] } else { COURT_WIDTH_FT - p[1] };
    [x, y]
}

/// Largest image distance between court points projected by `fit` and by
/// `reference`, in pixels.
///
/// The court maps onto itself under reflection about either centre line, so
/// a fit only determines the camera up to those mirrors; the closest of the
/// four labellings is reported.
pub fn max_deviation(fit: &Matrix3<f64>, reference: &Matrix3<f64>) -> f64 {
    let pts = tennis_court_points();
    (0..4)
        .map(|k| {
            pts.iter()
                .map(|&p| {
                    let a = project(fit, mirror(p, k));
                    let b = project(reference, p);
                    let d = (a[0] - b[0]).hypot(a[1] - b[1]);
                    if d.is_nan() {
                        f64::INFINITY
                    } else {
                        d
                    }
                })
                .fold(0.0, f64::max)
        })
        .fold(f64::INFINITY, f64::min)
}
