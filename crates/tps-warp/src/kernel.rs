/// Compute the Euclidean distance between two 3D points.
///
/// # Arguments
///
/// * `a` - A point in 3D space.
/// * `b` - Another point in 3D space.
///
/// # Returns
///
/// The Euclidean distance between the two points.
#[inline]
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// Evaluate the thin-plate spline radial basis kernel between two 3D points.
///
/// This is the `U(||p - q||)` term of the TPS literature. For warps embedded
/// in 3D the fundamental solution of the biharmonic equation is proportional
/// to the distance itself, so `U(r) = -r` is used here. The 2D form
/// `r^2 * log(r)` does not apply to 3D warping and must not be substituted.
///
/// `U(0) = 0`, so a landmark contributes no radial term at its own position.
///
/// # Arguments
///
/// * `control_point` - The landmark (control point) of the radial term.
/// * `p` - The query point.
///
/// # Returns
///
/// The scalar kernel response.
///
/// Example:
/// ```
/// use tps_warp::kernel::radial_basis;
///
/// let u = radial_basis(&[0.0, 0.0, 0.0], &[3.0, 0.0, 4.0]);
/// assert_eq!(u, -5.0);
/// ```
#[inline]
pub fn radial_basis(control_point: &[f64; 3], p: &[f64; 3]) -> f64 {
    -euclidean_distance(control_point, p)
}
