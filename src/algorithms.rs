use std::fmt;

mod k_means;

pub use k_means::compute_centroid;
pub use k_means::k_means;
pub use k_means::nearest_centroid;
pub use k_means::EmptyClusters;
pub use k_means::KMeans;
pub use k_means::Metadata as KMeansMetadata;

/// Common errors thrown by algorithms.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The input point set is empty.
    EmptyInput,

    /// Input sets don't have matching lengths.
    InputLenMismatch { expected: usize, actual: usize },

    /// The convergence tolerance is not a ratio in `[0, 1]`.
    InvalidTolerance(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "input contains no points"),
            Error::InputLenMismatch { expected, actual } => write!(
                f,
                "input sets don't have the same length (expected {expected} items, got {actual})",
            ),
            Error::InvalidTolerance(tolerance) => {
                write!(f, "tolerance must be within [0, 1], got {tolerance}")
            }
        }
    }
}

impl std::error::Error for Error {}
