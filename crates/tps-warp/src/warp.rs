use rayon::{iter::ParallelIterator, slice::ParallelSliceMut};

use crate::coefficients::TpsCoefficients;
use crate::kernel::radial_basis;

/// Number of points each parallel worker evaluates per chunk.
const PARALLEL_CHUNK_SIZE: usize = 8192;

impl TpsCoefficients {
    /// Warp a sequence of 3D points, preserving order and count.
    ///
    /// Equivalent to calling [`warp_point`](Self::warp_point) on every
    /// element, but evaluated as a matrix product: the queries are stacked
    /// into an `M x (N+4)` evaluation matrix (kernel responses against all
    /// control points, then the `[1, x, y, z]` polynomial columns) and
    /// multiplied by the `(N+4) x 3` coefficient matrix. Chunks of the input
    /// are processed in parallel.
    pub fn warp_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        self.warp_points_blended(points, 1.0)
    }

    /// Warp a sequence of 3D points, blending each result with its input as
    /// in [`warp_point_blended`](Self::warp_point_blended).
    pub fn warp_points_blended(&self, points: &[[f64; 3]], blend: f64) -> Vec<[f64; 3]> {
        let mut rv = points.to_vec();
        self.warp_points_inplace(&mut rv, blend);
        rv
    }

    /// Warp a buffer of 3D points in place (e.g. a mesh vertex buffer),
    /// blending each result with its input.
    ///
    /// `blend = 1.0` fully warps the buffer; `blend = 0.0` leaves it
    /// untouched.
    pub fn warp_points_inplace(&self, points: &mut [[f64; 3]], blend: f64) {
        let now = std::time::Instant::now();

        let coef_mat = self.coefficient_matrix();
        points
            .par_chunks_mut(PARALLEL_CHUNK_SIZE)
            .for_each(|chunk| warp_chunk_inplace(self, &coef_mat, chunk, blend));

        log::debug!(
            "tps batch warp: {} points, {} terms, elapsed: {:?}",
            points.len(),
            self.non_affine_terms.len(),
            now.elapsed()
        );
    }

    /// Stack the solved coefficients into the `(N+4) x 3` matrix consumed by
    /// the batch evaluation, one output axis per column, rows laid out as
    /// `[w0..wn, a4, a1, a2, a3]` to match the evaluation matrix columns.
    fn coefficient_matrix(&self) -> faer::Mat<f64> {
        let num_terms = self.non_affine_terms.len();
        let mut coef_mat = faer::Mat::<f64>::zeros(num_terms + 4, 3);

        for (row, term) in self.non_affine_terms.iter().enumerate() {
            coef_mat.write(row, 0, term.weight[0]);
            coef_mat.write(row, 1, term.weight[1]);
            coef_mat.write(row, 2, term.weight[2]);
        }
        for k in 0..3 {
            coef_mat.write(num_terms, k, self.a4[k]);
            coef_mat.write(num_terms + 1, k, self.a1[k]);
            coef_mat.write(num_terms + 2, k, self.a2[k]);
            coef_mat.write(num_terms + 3, k, self.a3[k]);
        }

        coef_mat
    }
}

fn warp_chunk_inplace(
    coefs: &TpsCoefficients,
    coef_mat: &faer::Mat<f64>,
    chunk: &mut [[f64; 3]],
    blend: f64,
) {
    let num_terms = coefs.non_affine_terms().len();

    // evaluation matrix: one row per query, kernel responses against every
    // control point followed by the polynomial terms [1, x, y, z]
    let mut eval_mat = faer::Mat::<f64>::zeros(chunk.len(), num_terms + 4);
    for (row, p) in chunk.iter().enumerate() {
        for (col, term) in coefs.non_affine_terms().iter().enumerate() {
            eval_mat.write(row, col, radial_basis(&term.control_point, p));
        }
        eval_mat.write(row, num_terms, 1.0);
        eval_mat.write(row, num_terms + 1, p[0]);
        eval_mat.write(row, num_terms + 2, p[1]);
        eval_mat.write(row, num_terms + 3, p[2]);
    }

    let mut warped = faer::Mat::<f64>::zeros(chunk.len(), 3);
    faer::linalg::matmul::matmul(
        warped.as_mut(),
        eval_mat.as_ref(),
        coef_mat.as_ref(),
        None,
        1.0,
        faer::Parallelism::None,
    );

    for (row, p) in chunk.iter_mut().enumerate() {
        for k in 0..3 {
            p[k] += blend * (warped.read(row, k) - p[k]);
        }
    }
}
