//! Plane-to-plane homography estimation via DLT with Hartley normalization.
//!
//! Provides:
//! - Exact 4-point solve (8 equations, 8 unknowns, `h33 = 1`).
//! - Least-squares DLT from ≥4 point correspondences.
//! - Projection, inversion and sample degeneracy checks (collinear triples,
//!   coincident points).

use nalgebra::{DMatrix, Matrix3, SMatrix, SVector, Vector3};

/// Triangle area (in normalized units) below which three points count as collinear.
const COLLINEAR_EPS: f64 = 1e-8;
/// Smallest |det| accepted for a normalized homography.
const MIN_NORMALIZED_DET: f64 = 1e-10;
/// Homogeneous `w` magnitude below which a point projects to infinity.
const MIN_W: f64 = 1e-15;

// ── Error type ───────────────────────────────────────────────────────────

/// Failure to estimate a homography from a set of correspondences.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HomographyError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("src and dst lengths differ: {src} vs {dst}")]
    LengthMismatch { src: usize, dst: usize },
    /// Collinear or repeated points, a singular system, or a non-finite solution.
    #[error("degenerate sample: {0}")]
    Degenerate(&'static str),
}

// ── Projection ───────────────────────────────────────────────────────────

/// Project a 2D point through a 3×3 homography: H * [x, y, 1]^T → [u, v].
///
/// Returns `[NaN, NaN]` when the point maps to infinity.
#[inline]
pub fn project(h: &Matrix3<f64>, p: [f64; 2]) -> [f64; 2] {
    let q = h * Vector3::new(p[0], p[1], 1.0);
    if q[2].abs() < MIN_W {
        return [f64::NAN, f64::NAN];
    }
    [q[0] / q[2], q[1] / q[2]]
}

/// Inverse homography rescaled so that `h33 = 1` where possible.
pub fn invert(h: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let inv = h.try_inverse()?;
    if !inv.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(normalize_scale(inv))
}

fn normalize_scale(h: Matrix3<f64>) -> Matrix3<f64> {
    let scale = h[(2, 2)];
    if scale.abs() < MIN_W {
        h
    } else {
        h / scale
    }
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Centroid and isotropic scale that move `pts` to the origin with mean
/// distance sqrt(2).
fn normalization_params(pts: &[[f64; 2]]) -> (f64, f64, f64) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (cx, cy, s)
}

fn normalizing_transform(cx: f64, cy: f64, s: f64) -> Matrix3<f64> {
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn denormalizing_transform(cx: f64, cy: f64, s: f64) -> Matrix3<f64> {
    Matrix3::new(1.0 / s, 0.0, cx, 0.0, 1.0 / s, cy, 0.0, 0.0, 1.0)
}

fn normalize_quad(pts: &[[f64; 2]; 4]) -> ((f64, f64, f64), [[f64; 2]; 4]) {
    let (cx, cy, s) = normalization_params(pts);
    let out = pts.map(|p| [s * (p[0] - cx), s * (p[1] - cy)]);
    ((cx, cy, s), out)
}

// ── Degeneracy ───────────────────────────────────────────────────────────

#[inline]
fn cross(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// True when any three of `pts` are (nearly) collinear.
///
/// The tolerance is relative to the spread of the point set, so the test is
/// invariant to translation and uniform scaling. Repeated points count as
/// collinear.
pub fn has_collinear_triple(pts: &[[f64; 2]]) -> bool {
    let n = pts.len();
    if n < 3 {
        return false;
    }
    let (_, _, s) = normalization_params(pts);
    let tol = COLLINEAR_EPS / (s * s);
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if cross(pts[i], pts[j], pts[k]).abs() <= tol {
                    return true;
                }
            }
        }
    }
    false
}

/// True when two of `pts` are closer than `sqrt(min_dist_sq)`.
pub fn has_coincident_pair(pts: &[[f64; 2]], min_dist_sq: f64) -> bool {
    pts.iter().enumerate().any(|(i, a)| {
        pts[i + 1..]
            .iter()
            .any(|b| (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) < min_dist_sq)
    })
}

/// Squared length of the bounding-box diagonal of `pts`, scaled by
/// `fraction²`. Zero for an empty set.
pub fn separation_threshold(pts: &[[f64; 2]], fraction: f64) -> f64 {
    let Some(first) = pts.first() else {
        return 0.0;
    };
    let (mut lo, mut hi) = (*first, *first);
    for p in pts {
        lo = [lo[0].min(p[0]), lo[1].min(p[1])];
        hi = [hi[0].max(p[0]), hi[1].max(p[1])];
    }
    let (dx, dy) = (hi[0] - lo[0], hi[1] - lo[1]);
    fraction * fraction * (dx * dx + dy * dy)
}

fn quad_is_degenerate(q: &[[f64; 2]; 4]) -> bool {
    // Already normalized: unit tolerance applies directly.
    (0..4).any(|skip| {
        let mut t = [[0.0; 2]; 3];
        let mut k = 0;
        for (i, p) in q.iter().enumerate() {
            if i != skip {
                t[k] = *p;
                k += 1;
            }
        }
        cross(t[0], t[1], t[2]).abs() <= COLLINEAR_EPS
    })
}

// ── 4-point solve ────────────────────────────────────────────────────────

/// Exact homography mapping the four `src` points onto the four `dst` points.
///
/// Solves the 8×8 linear system obtained by fixing `h33 = 1`, in Hartley
/// normalized coordinates. Quads with a collinear triple, a singular system,
/// or a near-singular result are reported as [`HomographyError::Degenerate`].
pub fn estimate_homography_4pt(
    src: &[[f64; 2]; 4],
    dst: &[[f64; 2]; 4],
) -> Result<Matrix3<f64>, HomographyError> {
    let ((scx, scy, ss), src_n) = normalize_quad(src);
    let ((dcx, dcy, ds), dst_n) = normalize_quad(dst);

    if quad_is_degenerate(&src_n) || quad_is_degenerate(&dst_n) {
        return Err(HomographyError::Degenerate("collinear points in sample"));
    }

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let [x, y] = src_n[i];
        let [u, v] = dst_n[i];

        // u * (h6 x + h7 y + 1) = h0 x + h1 y + h2
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -x * u;
        a[(r, 7)] = -y * u;
        b[r] = u;

        // v * (h6 x + h7 y + 1) = h3 x + h4 y + h5
        let r = 2 * i + 1;
        a[(r, 3)] = x;
        a[(r, 4)] = y;
        a[(r, 5)] = 1.0;
        a[(r, 6)] = -x * v;
        a[(r, 7)] = -y * v;
        b[r] = v;
    }

    let h = a
        .lu()
        .solve(&b)
        .ok_or(HomographyError::Degenerate("singular 8x8 system"))?;
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

    finish(
        h_norm,
        normalizing_transform(scx, scy, ss),
        denormalizing_transform(dcx, dcy, ds),
    )
}

/// Validate a normalized solution and map it back to pixel/model units.
fn finish(
    h_norm: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst_inv: Matrix3<f64>,
) -> Result<Matrix3<f64>, HomographyError> {
    if !h_norm.iter().all(|v| v.is_finite()) {
        return Err(HomographyError::Degenerate("non-finite solution"));
    }
    let det = h_norm.determinant();
    if !(det.abs() > MIN_NORMALIZED_DET * h_norm.norm().powi(3)) {
        return Err(HomographyError::Degenerate("near-singular homography"));
    }

    let h = t_dst_inv * h_norm * t_src;
    let scale = h[(2, 2)];
    if !scale.is_finite() || scale.abs() < MIN_W {
        return Err(HomographyError::Degenerate("h33 vanishes"));
    }
    Ok(h / scale)
}

// ── DLT ──────────────────────────────────────────────────────────────────

/// Estimate homography from ≥4 point correspondences using DLT.
///
/// Returns the 3×3 homography H such that `dst ≈ project(H, src)`.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    let n = src.len();
    if n != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: n,
            dst: dst.len(),
        });
    }
    if n < 4 {
        return Err(HomographyError::TooFewPoints { needed: 4, got: n });
    }

    let (scx, scy, ss) = normalization_params(src);
    let (dcx, dcy, ds) = normalization_params(dst);

    // Build 2n × 9 matrix A
    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (ss * (src[i][0] - scx), ss * (src[i][1] - scy));
        let (dx, dy) = (ds * (dst[i][0] - dcx), ds * (dst[i][1] - dcy));

        // Row 2i:   [  0  0  0 | -sx -sy -1 | dy*sx  dy*sy  dy ]
        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        // Row 2i+1: [ sx  sy  1 |  0  0  0 | -dx*sx -dx*sy -dx ]
        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of the smallest eigenvalue of A^T A.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);

    let mut order: Vec<usize> = (0..9).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[i].abs().total_cmp(&eig.eigenvalues[j].abs()));
    let min_idx = order[0];
    let largest = eig.eigenvalues[order[8]].abs();

    // A second (near-)zero eigenvalue means the null space is not unique.
    if eig.eigenvalues[order[1]].abs() <= 1e-12 * largest.max(1.0) {
        return Err(HomographyError::Degenerate("rank-deficient DLT system"));
    }

    let h_vec: Vec<f64> = (0..9).map(|j| eig.eigenvectors[(j, min_idx)]).collect();
    let h_norm = Matrix3::new(
        h_vec[0], h_vec[1], h_vec[2],
        h_vec[3], h_vec[4], h_vec[5],
        h_vec[6], h_vec[7], h_vec[8],
    );

    finish(
        h_norm,
        normalizing_transform(scx, scy, ss),
        denormalizing_transform(dcx, dcy, ds),
    )
}

/// Estimate a homography from equally sized correspondence slices.
///
/// Uses the exact 4-point solve for exactly four pairs and the least-squares
/// DLT otherwise.
pub fn estimate_homography(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    match (<&[[f64; 2]; 4]>::try_from(src), <&[[f64; 2]; 4]>::try_from(dst)) {
        (Ok(s), Ok(d)) => estimate_homography_4pt(s, d),
        _ => estimate_homography_dlt(src, dst),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
