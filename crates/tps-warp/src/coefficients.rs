use crate::kernel::radial_basis;

/// A single non-affine term of a solved warp.
///
/// The control point is kept next to its weight because both are needed at
/// evaluation time: the term contributes `weight * U(||control_point - p||)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TpsNonAffineTerm {
    /// The solved radial weight, one component per output axis.
    pub weight: [f64; 3],
    /// The source landmark this weight belongs to.
    pub control_point: [f64; 3],
}

/// Solved thin-plate spline warp coefficients.
///
/// The warp evaluates, per output axis, as
///
/// `f(p) = a4 + a1*p.x + a2*p.y + a3*p.z + SUM{ wi * U(||ci - p||) }`
///
/// where `a4` is the affine translation, `a1..a3` are the columns of the
/// affine linear map, and the `wi`/`ci` pairs are the non-affine terms.
///
/// Instances are immutable once solved and hold no interior state, so they
/// can be evaluated concurrently from any number of threads.
#[derive(Debug, Clone, PartialEq)]
pub struct TpsCoefficients {
    pub(crate) a1: [f64; 3],
    pub(crate) a2: [f64; 3],
    pub(crate) a3: [f64; 3],
    pub(crate) a4: [f64; 3],
    pub(crate) non_affine_terms: Vec<TpsNonAffineTerm>,
}

impl TpsCoefficients {
    /// Get the `x`-gradient column of the affine map.
    #[inline]
    pub fn a1(&self) -> [f64; 3] {
        self.a1
    }

    /// Get the `y`-gradient column of the affine map.
    #[inline]
    pub fn a2(&self) -> [f64; 3] {
        self.a2
    }

    /// Get the `z`-gradient column of the affine map.
    #[inline]
    pub fn a3(&self) -> [f64; 3] {
        self.a3
    }

    /// Get the affine translation vector.
    #[inline]
    pub fn a4(&self) -> [f64; 3] {
        self.a4
    }

    /// Get as reference the non-affine terms, one per source landmark.
    pub fn non_affine_terms(&self) -> &[TpsNonAffineTerm] {
        &self.non_affine_terms
    }

    /// Warp a single 3D point.
    ///
    /// All three output axes are evaluated together, since the per-axis
    /// coefficients are stored side by side as `[f64; 3]` vectors.
    pub fn warp_point(&self, p: [f64; 3]) -> [f64; 3] {
        // affine part: a4 + a1*x + a2*y + a3*z
        let mut rv = [
            self.a4[0] + self.a1[0] * p[0] + self.a2[0] * p[1] + self.a3[0] * p[2],
            self.a4[1] + self.a1[1] * p[0] + self.a2[1] * p[1] + self.a3[1] * p[2],
            self.a4[2] + self.a1[2] * p[0] + self.a2[2] * p[1] + self.a3[2] * p[2],
        ];

        // non-affine part: wi * U(||ci - p||)
        for term in &self.non_affine_terms {
            let u = radial_basis(&term.control_point, &p);
            rv[0] += term.weight[0] * u;
            rv[1] += term.weight[1] * u;
            rv[2] += term.weight[2] * u;
        }

        rv
    }

    /// Warp a single 3D point, blending between the input point and its
    /// fully warped image.
    ///
    /// `blend = 0.0` returns the point unchanged, `blend = 1.0` is equivalent
    /// to [`warp_point`](Self::warp_point); values in between interpolate
    /// linearly. Interactive hosts use this to fade a warp in and out.
    pub fn warp_point_blended(&self, p: [f64; 3], blend: f64) -> [f64; 3] {
        let warped = self.warp_point(p);
        [
            p[0] + blend * (warped[0] - p[0]),
            p[1] + blend * (warped[1] - p[1]),
            p[2] + blend * (warped[2] - p[2]),
        ]
    }
}

impl std::fmt::Display for TpsCoefficients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TpsCoefficients{{a1 = {:?}, a2 = {:?}, a3 = {:?}, a4 = {:?}",
            self.a1, self.a2, self.a3, self.a4
        )?;
        for (i, term) in self.non_affine_terms.iter().enumerate() {
            write!(
                f,
                ", w{} = {{weight = {:?}, control_point = {:?}}}",
                i, term.weight, term.control_point
            )?;
        }
        write!(f, "}}")
    }
}
