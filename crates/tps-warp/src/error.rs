use thiserror::Error;

/// Error types for the thin-plate spline solver.
#[derive(Debug, Error)]
pub enum WarpError {
    /// Invalid input data - landmark sequences are empty or their lengths differ.
    #[error("invalid landmark count: source has {source_len} landmarks, destination has {destination_len} (expected equal, non-zero lengths)")]
    InvalidLandmarkCount {
        /// Number of source landmarks provided.
        source_len: usize,
        /// Number of destination landmarks provided.
        destination_len: usize,
    },

    /// The linear system has no finite solution, even via the least-squares
    /// fallback (e.g. non-finite input coordinates).
    #[error("singular system unrecoverable: no finite warp coefficients exist for the given landmarks")]
    SingularSystemUnrecoverable,
}
