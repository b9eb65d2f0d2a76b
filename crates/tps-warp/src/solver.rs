use faer::prelude::SpSolver;

use crate::coefficients::{TpsCoefficients, TpsNonAffineTerm};
use crate::error::WarpError;
use crate::kernel::radial_basis;

/// Relative residual threshold above which a direct LU solution is rejected
/// and the solver falls back to the least-squares route.
const DIRECT_SOLVE_RESIDUAL_TOL: f64 = 1e-8;

/// Options controlling which components of the solved warp are kept.
///
/// These are applied as a post-pass on the solved coefficients, so disabling
/// a component never changes how the linear system is built or solved.
#[derive(Debug, Clone)]
pub struct TpsSolverOptions {
    /// Keep the affine translation (`a4`). When `false`, `a4` is zeroed.
    pub apply_affine_translation: bool,
    /// Keep the affine scale. When `false`, the gradient columns `a1..a3`
    /// are normalized to unit length.
    pub apply_affine_scale: bool,
    /// Keep the affine rotation. When `false`, the gradient columns are
    /// replaced by a diagonal map that preserves their lengths.
    pub apply_affine_rotation: bool,
    /// Keep the non-affine (radial) part. When `false`, all non-affine
    /// terms are dropped and only the affine map remains.
    pub apply_non_affine_warp: bool,
}

impl Default for TpsSolverOptions {
    fn default() -> Self {
        Self {
            apply_affine_translation: true,
            apply_affine_scale: true,
            apply_affine_rotation: true,
            apply_non_affine_warp: true,
        }
    }
}

/// Solve thin-plate spline warp coefficients from paired 3D landmarks.
///
/// The landmark sets are paired by index: `source_landmarks[i]` maps onto
/// `destination_landmarks[i]`. The returned coefficients reproduce every
/// destination landmark when evaluated at its source landmark (the
/// interpolation property) and deform the rest of space smoothly.
///
/// # Arguments
///
/// * `source_landmarks` - Landmarks in the source configuration.
/// * `destination_landmarks` - Corresponding landmarks in the destination
///   configuration, same length as `source_landmarks`.
///
/// # Errors
///
/// * [`WarpError::InvalidLandmarkCount`] when either set is empty or the
///   lengths differ.
/// * [`WarpError::SingularSystemUnrecoverable`] when no finite solution
///   exists (e.g. non-finite input coordinates).
///
/// Example:
/// ```
/// use tps_warp::solve_coefficients;
///
/// let source = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
/// let destination = [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0]];
/// let coefs = solve_coefficients(&source, &destination)?;
/// let warped = coefs.warp_point([0.0, 0.0, 0.0]);
/// assert!(warped.iter().all(|v| v.is_finite()));
/// # Ok::<(), tps_warp::WarpError>(())
/// ```
pub fn solve_coefficients(
    source_landmarks: &[[f64; 3]],
    destination_landmarks: &[[f64; 3]],
) -> Result<TpsCoefficients, WarpError> {
    solve_coefficients_with(
        source_landmarks,
        destination_landmarks,
        &TpsSolverOptions::default(),
    )
}

/// Solve thin-plate spline warp coefficients with explicit solver options.
///
/// Behaves as [`solve_coefficients`], then applies the component toggles in
/// `options` to the solved coefficients.
pub fn solve_coefficients_with(
    source_landmarks: &[[f64; 3]],
    destination_landmarks: &[[f64; 3]],
    options: &TpsSolverOptions,
) -> Result<TpsCoefficients, WarpError> {
    validate_landmarks(source_landmarks, destination_landmarks)?;

    // a system containing non-finite coordinates has no finite solution
    if !all_finite(source_landmarks) || !all_finite(destination_landmarks) {
        return Err(WarpError::SingularSystemUnrecoverable);
    }

    let now = std::time::Instant::now();

    let num_pairs = source_landmarks.len();
    let l_mat = build_design_matrix(source_landmarks);
    let rhs = build_rhs(destination_landmarks);

    // With at least 4 pairs the polynomial block can be fully determined, so
    // try the direct factorization first: factor once, solve the three
    // per-axis right-hand sides in a single call.
    let direct_solution = if num_pairs >= 4 {
        let solution = l_mat.as_ref().partial_piv_lu().solve(rhs.as_ref());
        if solution_is_usable(&l_mat, &solution, &rhs) {
            Some(solution)
        } else {
            None
        }
    } else {
        None
    };

    let (solution, strategy) = match direct_solution {
        Some(solution) => (solution, "lu"),
        // Under-determined (fewer than 4 pairs) or rank-deficient landmark
        // geometry: minimum-norm least-squares via the SVD pseudo-inverse.
        None => (solve_least_squares(&l_mat, &rhs)?, "svd"),
    };

    log::debug!(
        "tps solve: {} landmark pairs, strategy: {}, elapsed: {:?}",
        num_pairs,
        strategy,
        now.elapsed()
    );

    // The solution rows are laid out per axis as [w0..wn, a4, a1, a2, a3].
    let mut coefs = TpsCoefficients {
        a4: solution_row(&solution, num_pairs),
        a1: solution_row(&solution, num_pairs + 1),
        a2: solution_row(&solution, num_pairs + 2),
        a3: solution_row(&solution, num_pairs + 3),
        non_affine_terms: source_landmarks
            .iter()
            .enumerate()
            .map(|(i, control_point)| TpsNonAffineTerm {
                weight: solution_row(&solution, i),
                control_point: *control_point,
            })
            .collect(),
    };

    apply_options(&mut coefs, options);

    Ok(coefs)
}

/// Check the structural preconditions on a landmark pairing.
fn validate_landmarks(
    source_landmarks: &[[f64; 3]],
    destination_landmarks: &[[f64; 3]],
) -> Result<(), WarpError> {
    if source_landmarks.is_empty()
        || destination_landmarks.is_empty()
        || source_landmarks.len() != destination_landmarks.len()
    {
        return Err(WarpError::InvalidLandmarkCount {
            source_len: source_landmarks.len(),
            destination_len: destination_landmarks.len(),
        });
    }
    Ok(())
}

fn all_finite(points: &[[f64; 3]]) -> bool {
    points.iter().flatten().all(|v| v.is_finite())
}

/// Build the `(N+4)x(N+4)` design matrix `L`:
///
/// ```text
/// |K  P|
/// |PT 0|
/// ```
///
/// where `K[i][j] = U(||source_i - source_j||)` (the diagonal is `U(0) = 0`),
/// `P` holds `[1, x_i, y_i, z_i]` per landmark, `PT` is its transpose and the
/// bottom-right 4x4 block is zero.
fn build_design_matrix(source_landmarks: &[[f64; 3]]) -> faer::Mat<f64> {
    let num_pairs = source_landmarks.len();
    let mut l_mat = faer::Mat::<f64>::zeros(num_pairs + 4, num_pairs + 4);

    for (row, pi) in source_landmarks.iter().enumerate() {
        // the K block
        for (col, pj) in source_landmarks.iter().enumerate() {
            l_mat.write(row, col, radial_basis(pi, pj));
        }

        // the P block and its transpose
        l_mat.write(row, num_pairs, 1.0);
        l_mat.write(row, num_pairs + 1, pi[0]);
        l_mat.write(row, num_pairs + 2, pi[1]);
        l_mat.write(row, num_pairs + 3, pi[2]);

        l_mat.write(num_pairs, row, 1.0);
        l_mat.write(num_pairs + 1, row, pi[0]);
        l_mat.write(num_pairs + 2, row, pi[1]);
        l_mat.write(num_pairs + 3, row, pi[2]);
    }

    l_mat
}

/// Build the `(N+4)x3` right-hand-side matrix whose column `k` holds the
/// destination `k`-coordinates in the first `N` rows and zeros in the last 4.
fn build_rhs(destination_landmarks: &[[f64; 3]]) -> faer::Mat<f64> {
    let num_pairs = destination_landmarks.len();
    let mut rhs = faer::Mat::<f64>::zeros(num_pairs + 4, 3);

    for (row, p) in destination_landmarks.iter().enumerate() {
        rhs.write(row, 0, p[0]);
        rhs.write(row, 1, p[1]);
        rhs.write(row, 2, p[2]);
    }

    rhs
}

/// Check that a direct solution is finite and actually solves the system.
///
/// A rank-deficient landmark geometry (coincident, collinear or coplanar
/// landmarks) makes `L` singular; partial-pivot LU then yields non-finite
/// entries or a large residual rather than an error.
fn solution_is_usable(
    l_mat: &faer::Mat<f64>,
    solution: &faer::Mat<f64>,
    rhs: &faer::Mat<f64>,
) -> bool {
    let solution_norm = solution.norm_max();
    if !solution_norm.is_finite() {
        return false;
    }

    let residual = l_mat.as_ref() * solution.as_ref() - rhs.as_ref();
    let scale = (l_mat.norm_max() * solution_norm + rhs.norm_max()).max(1.0);

    residual.norm_max() <= DIRECT_SOLVE_RESIDUAL_TOL * scale
}

/// Minimum-norm least-squares solve via the SVD pseudo-inverse,
/// `x = V * S^+ * U^T * b`, truncating singular values below
/// `dim * eps * s_max`.
fn solve_least_squares(
    l_mat: &faer::Mat<f64>,
    rhs: &faer::Mat<f64>,
) -> Result<faer::Mat<f64>, WarpError> {
    let dim = l_mat.nrows();

    let svd = l_mat.svd();
    let singular_values = svd.s_diagonal();
    let cutoff = dim as f64 * f64::EPSILON * singular_values.read(0);

    let ut_rhs = svd.u().transpose() * rhs.as_ref();

    let mut scaled = faer::Mat::<f64>::zeros(dim, 3);
    for i in 0..dim {
        let sv = singular_values.read(i);
        if sv > cutoff {
            for k in 0..3 {
                scaled.write(i, k, ut_rhs.read(i, k) / sv);
            }
        }
    }

    let solution = svd.v() * scaled.as_ref();

    if solution.norm_max().is_finite() {
        Ok(solution)
    } else {
        Err(WarpError::SingularSystemUnrecoverable)
    }
}

#[inline]
fn solution_row(solution: &faer::Mat<f64>, row: usize) -> [f64; 3] {
    [
        solution.read(row, 0),
        solution.read(row, 1),
        solution.read(row, 2),
    ]
}

fn apply_options(coefs: &mut TpsCoefficients, options: &TpsSolverOptions) {
    if !options.apply_affine_translation {
        coefs.a4 = [0.0; 3];
    }
    if !options.apply_affine_scale {
        coefs.a1 = normalized(&coefs.a1);
        coefs.a2 = normalized(&coefs.a2);
        coefs.a3 = normalized(&coefs.a3);
    }
    if !options.apply_affine_rotation {
        coefs.a1 = [length3(&coefs.a1), 0.0, 0.0];
        coefs.a2 = [0.0, length3(&coefs.a2), 0.0];
        coefs.a3 = [0.0, 0.0, length3(&coefs.a3)];
    }
    if !options.apply_non_affine_warp {
        coefs.non_affine_terms.clear();
    }
}

#[inline]
fn length3(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn normalized(v: &[f64; 3]) -> [f64; 3] {
    let len = length3(v);
    if len > 0.0 {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        *v
    }
}
