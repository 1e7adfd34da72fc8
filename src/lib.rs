//! A multithreaded implementation of Lloyd's k-means algorithm for large sets
//! of 2D points.
//!
//! # Crate Layout
//!
//! The clustering engine lives in [`k_means`] and its configurable form
//! [`KMeans`].  The latter also implements the [`Partition`] trait, so that it
//! can be used wherever a part ID per point is all that is needed.
//!
//! Work is spread over the current [rayon] thread pool.  Install a custom
//! pool with [`rayon::ThreadPool::install`] to control the thread count.
//!
//! # Size policies
//!
//! Given `n` points and `k` clusters:
//!
//! - `k <= 1`: all points form a single cluster centered on their mean,
//! - `1 < k < n`: Lloyd iterations run until at most `n * tolerance` points
//!   change cluster during one iteration,
//! - `k >= n`: each point is its own cluster.
//!
//! # Example
//!
//! ```rust
//! use lloyd::Point;
//! use rand::SeedableRng as _;
//!
//! let mut points = [
//!     Point::new(0.0, 0.0),
//!     Point::new(0.0, 1.0),
//!     Point::new(10.0, 0.0),
//!     Point::new(10.0, 1.0),
//! ];
//! let mut rng = rand_pcg::Pcg64::seed_from_u64(5);
//!
//! let centroids = lloyd::k_means(&mut points, 2, &mut rng).unwrap();
//!
//! assert_eq!(centroids.len(), 2);
//! assert_eq!(centroids.iter().map(|c| c.count).sum::<usize>(), 4);
//! assert!(points.iter().all(|p| p.group < 2));
//! ```

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    rust_2018_idioms
)]

mod algorithms;
mod geometry;

pub use crate::algorithms::*;
pub use crate::geometry::BoundingBox;
pub use crate::geometry::Centroid;
pub use crate::geometry::Point;
pub use crate::geometry::Point2D;

pub use nalgebra;
pub use rand;
pub use rayon;

/// The `Partition` trait allows for partitioning data.
///
/// Partitioning algorithms implement this trait.
///
/// The generic argument `M` defines the input of the algorithms (e.g. a set
/// of 2D points).
///
/// The input partition must be of the correct size and its contents may or may
/// not be used by the algorithms.
pub trait Partition<M> {
    /// Diagnostic data returned for a specific run of the algorithm.
    type Metadata;

    /// Error details, should the algorithm fail to run.
    type Error;

    /// Partition the given data and output the part ID of each element in
    /// `part_ids`.
    ///
    /// Part IDs must be contiguous and start from zero, meaning the number of
    /// parts is one plus the maximum of `part_ids`.  If a lower ID does not
    /// appear in the array, the part is assumed to be empty.
    fn partition(&mut self, part_ids: &mut [usize], data: M)
        -> Result<Self::Metadata, Self::Error>;
}
