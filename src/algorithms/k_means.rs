//! Lloyd's k-means algorithm, parallelized over points and clusters.
//!
//! After a random initial assignment, each iteration goes through four phases,
//! each one a rayon parallel loop that must complete before the next starts:
//!
//! 1. zero: reset the cluster accumulators,
//! 2. accumulate: sum the coordinates of the points of each cluster,
//! 3. average: divide sums by cluster populations,
//! 4. reassign: move each point to its nearest centroid, counting moves.
//!
//! Iterations stop once the number of moves falls under a fraction of the
//! point count, or once the iteration cap is reached.

use super::Error;
use crate::geometry::Centroid;
use crate::geometry::Point;
use crate::geometry::Point2D;
use rand::Rng;
use rayon::prelude::*;
use std::mem;

/// Default fraction of points allowed to change cluster during the last
/// iteration.
const TOLERANCE: f64 = 1e-4;

const MAX_ITER: usize = 1000;

/// Number of accumulation chunks handed to each thread of the pool.
const CHUNKS_PER_THREAD: usize = 4;

/// Returns the index of the centroid nearest to `point`.
///
/// Distance is the squared euclidean distance.  On ties, the lowest index wins.
/// Centroids with non-finite distances (e.g. NaN coordinates) are never
/// selected.
///
/// Returns `None` if `centroids` is empty.
pub fn nearest_centroid(point: &Point2D, centroids: &[Centroid]) -> Option<usize> {
    let mut nearest = None;
    let mut min_distance = f64::INFINITY;
    for (idx, centroid) in centroids.iter().enumerate() {
        let distance = (centroid.position - point).norm_squared();
        if distance < min_distance {
            min_distance = distance;
            nearest = Some(idx);
        }
    }
    nearest
}

/// Computes the centroid of the whole point set and moves every point to
/// group 0.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] if `points` is empty.
pub fn compute_centroid(points: &mut [Point]) -> Result<Centroid, Error> {
    if points.is_empty() {
        return Err(Error::EmptyInput);
    }

    points.par_iter_mut().for_each(|p| p.group = 0);

    let mut centroids = [Centroid::zero()];
    accumulate(points, &mut centroids);
    average(&mut centroids);

    Ok(centroids[0])
}

/// Clusters `points` into at most `cluster_count` groups, with the default
/// settings of [`KMeans`].
///
/// The group of each point is written in [`Point::group`].  The returned
/// vector has one item if `cluster_count <= 1`, `cluster_count` items if
/// `1 < cluster_count < points.len()`, and `points.len()` items otherwise.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] if `points` is empty.
pub fn k_means<R>(
    points: &mut [Point],
    cluster_count: usize,
    rng: &mut R,
) -> Result<Vec<Centroid>, Error>
where
    R: Rng + ?Sized,
{
    KMeans::new(rng, cluster_count)
        .run(points)
        .map(|metadata| metadata.centroids)
}

/// What to do with clusters that lose all their points.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EmptyClusters {
    /// Leave the cluster empty.  Its centroid becomes NaN and no point is ever
    /// assigned to it again.
    #[default]
    Keep,

    /// Move the centroid onto a point drawn at random from the input, so that
    /// it can attract points during the next reassignment.
    Reseed,
}

/// Diagnostic data returned by [`KMeans`].
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Cluster centroids, indexed by group.
    pub centroids: Vec<Centroid>,

    /// Number of Lloyd iterations that were run.  Zero when the size of the
    /// input made iterations unnecessary.
    pub iteration_count: usize,

    /// Whether the run stopped because few enough points moved, rather than
    /// because it reached `max_iter`.
    pub converged: bool,
}

/// # Lloyd's k-means
///
/// Clusters points around `cluster_count` centroids, starting from a random
/// assignment drawn from `rng`.
///
/// # Example
///
/// ```rust
/// use lloyd::Partition as _;
/// use lloyd::Point2D;
/// use rand::SeedableRng as _;
///
/// let points = [
///     Point2D::new(0.0, 0.0),
///     Point2D::new(0.0, 1.0),
///     Point2D::new(10.0, 0.0),
///     Point2D::new(10.0, 1.0),
///     Point2D::new(5.0, 20.0),
/// ];
/// let mut partition = [0; 5];
///
/// let mut k_means = lloyd::KMeans::new(rand_pcg::Pcg64::seed_from_u64(2), 2);
/// k_means.empty_clusters = lloyd::EmptyClusters::Reseed;
/// let metadata = k_means.partition(&mut partition, &points[..]).unwrap();
///
/// let point_count: usize = metadata.centroids.iter().map(|c| c.count).sum();
/// assert_eq!(point_count, 5);
/// assert!(partition.iter().all(|group| *group < 2));
/// ```
#[derive(Debug)]
pub struct KMeans<R> {
    /// Source of the initial assignment and of reseeded centroids.
    pub rng: R,

    pub cluster_count: usize,

    /// Iterations stop once at most `floor(n * tolerance)` points changed
    /// cluster, `n` being the number of points.  Zero means iterations run
    /// until no point moves.
    pub tolerance: f64,

    /// Maximum number of iterations.  At least one iteration is run.
    pub max_iter: usize,

    pub empty_clusters: EmptyClusters,
}

impl<R> KMeans<R>
where
    R: Rng,
{
    pub fn new(rng: R, cluster_count: usize) -> Self {
        Self {
            rng,
            cluster_count,
            tolerance: TOLERANCE,
            max_iter: MAX_ITER,
            empty_clusters: EmptyClusters::default(),
        }
    }

    /// Clusters `points`, writing the group of each point in [`Point::group`].
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] if `points` is empty,
    /// - [`Error::InvalidTolerance`] if `tolerance` is not within `[0, 1]`.
    pub fn run(&mut self, points: &mut [Point]) -> Result<Metadata, Error> {
        if points.is_empty() {
            return Err(Error::EmptyInput);
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(Error::InvalidTolerance(self.tolerance));
        }

        if self.cluster_count <= 1 {
            let centroid = compute_centroid(points)?;
            return Ok(Metadata {
                centroids: vec![centroid],
                iteration_count: 0,
                converged: true,
            });
        }

        if points.len() <= self.cluster_count {
            let centroids = points
                .par_iter_mut()
                .enumerate()
                .map(|(idx, p)| {
                    p.group = idx;
                    Centroid {
                        position: p.position,
                        count: 1,
                    }
                })
                .collect();
            return Ok(Metadata {
                centroids,
                iteration_count: 0,
                converged: true,
            });
        }

        self.initialize(points);
        Ok(self.iterate(points))
    }

    fn initialize(&mut self, points: &mut [Point]) {
        for p in points {
            p.group = self.rng.gen_range(0..self.cluster_count);
        }
    }

    /// Runs Lloyd iterations from the current assignment.
    fn iterate(&mut self, points: &mut [Point]) -> Metadata {
        debug_assert!(1 < self.cluster_count && self.cluster_count < points.len());

        let max_changed = (points.len() as f64 * self.tolerance) as usize;
        let mut centroids = vec![Centroid::zero(); self.cluster_count];
        let mut iteration_count = 0;

        let (changed, converged) = loop {
            iteration_count += 1;

            let span = tracing::info_span!("zero");
            let enter = span.enter();

            centroids
                .par_iter_mut()
                .for_each(|centroid| *centroid = Centroid::zero());

            mem::drop(enter);
            let span = tracing::info_span!("accumulate");
            let enter = span.enter();

            accumulate(points, &mut centroids);

            mem::drop(enter);
            let span = tracing::info_span!("average");
            let enter = span.enter();

            average(&mut centroids);
            self.handle_empty_clusters(points, &mut centroids);

            mem::drop(enter);
            let span = tracing::info_span!("reassign");
            let enter = span.enter();

            let changed = reassign(points, &centroids);

            mem::drop(enter);

            tracing::info!(iteration_count, changed, max_changed, "reassigned points");

            if changed <= max_changed {
                break (changed, true);
            }
            if self.max_iter <= iteration_count {
                tracing::warn!(
                    iteration_count,
                    changed,
                    max_changed,
                    "reached max_iter before convergence"
                );
                break (changed, false);
            }
        };

        if changed != 0 {
            // Populations must match the final assignment.
            recount(points, &mut centroids);
        }

        Metadata {
            centroids,
            iteration_count,
            converged,
        }
    }

    fn handle_empty_clusters(&mut self, points: &[Point], centroids: &mut [Centroid]) {
        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            if centroid.count != 0 {
                continue;
            }
            match self.empty_clusters {
                EmptyClusters::Keep => tracing::debug!(cluster, "empty cluster"),
                EmptyClusters::Reseed => {
                    let donor = self.rng.gen_range(0..points.len());
                    centroid.position = points[donor].position;
                    tracing::info!(cluster, donor, "reseeded empty cluster");
                }
            }
        }
    }
}

impl<'a, R> crate::Partition<&'a [Point2D]> for KMeans<R>
where
    R: Rng,
{
    type Metadata = Metadata;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        points: &'a [Point2D],
    ) -> Result<Self::Metadata, Self::Error> {
        if part_ids.len() != points.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: points.len(),
            });
        }

        let mut points: Vec<Point> = points.par_iter().map(|p| Point::from(*p)).collect();
        let metadata = self.run(&mut points)?;

        part_ids
            .par_iter_mut()
            .zip(&points)
            .for_each(|(part_id, p)| *part_id = p.group);

        Ok(metadata)
    }
}

/// Length of the chunks points are split into during accumulation.
///
/// Depends only on its arguments and on the size of the thread pool, so that
/// sums are reproducible.  Per-chunk accumulators never outnumber points.
fn chunk_len(point_count: usize, cluster_count: usize) -> usize {
    let max_chunk_count = rayon::current_num_threads() * CHUNKS_PER_THREAD;
    let chunk_count = usize::clamp(point_count / cluster_count, 1, max_chunk_count);
    point_count.div_ceil(chunk_count)
}

/// Adds the coordinates and the count of each point into the centroid of its
/// group.
///
/// Each chunk of points is reduced into private accumulators, which are then
/// merged into `centroids` in chunk order.
fn accumulate(points: &[Point], centroids: &mut [Centroid]) {
    let cluster_count = centroids.len();
    let chunk_len = chunk_len(points.len(), cluster_count);

    let partial_sums: Vec<Vec<Centroid>> = points
        .par_chunks(chunk_len)
        .map(|chunk| {
            let mut sums = vec![Centroid::zero(); cluster_count];
            for p in chunk {
                debug_assert!(p.group < cluster_count);
                let sum = &mut sums[p.group];
                sum.position += p.position;
                sum.count += 1;
            }
            sums
        })
        .collect();

    centroids
        .par_iter_mut()
        .enumerate()
        .for_each(|(cluster, centroid)| {
            for sums in &partial_sums {
                centroid.position += sums[cluster].position;
                centroid.count += sums[cluster].count;
            }
        });
}

/// Turns accumulated sums into mean positions.  Empty clusters end up with NaN
/// coordinates.
fn average(centroids: &mut [Centroid]) {
    centroids
        .par_iter_mut()
        .for_each(|centroid| centroid.position /= centroid.count as f64);
}

/// Moves each point to its nearest centroid and returns how many points moved.
fn reassign(points: &mut [Point], centroids: &[Centroid]) -> usize {
    points
        .par_iter_mut()
        .map(|p| {
            let nearest = nearest_centroid(&p.position, centroids).unwrap_or(p.group);
            if nearest == p.group {
                0
            } else {
                p.group = nearest;
                1
            }
        })
        .sum()
}

fn recount(points: &[Point], centroids: &mut [Centroid]) {
    let cluster_count = centroids.len();
    let chunk_len = chunk_len(points.len(), cluster_count);

    let partial_counts: Vec<Vec<usize>> = points
        .par_chunks(chunk_len)
        .map(|chunk| {
            let mut counts = vec![0; cluster_count];
            for p in chunk {
                counts[p.group] += 1;
            }
            counts
        })
        .collect();

    centroids
        .par_iter_mut()
        .enumerate()
        .for_each(|(cluster, centroid)| {
            centroid.count = partial_counts.iter().map(|counts| counts[cluster]).sum();
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Partition as _;
    use approx::assert_ulps_eq;
    use proptest::prelude::*;
    use rand::Rng as _;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    fn four_points() -> Vec<Point> {
        vec![
            Point::new(0., 0.),
            Point::new(0., 1.),
            Point::new(10., 0.),
            Point::new(10., 1.),
        ]
    }

    fn random_points(count: usize, seed: u64) -> Vec<Point> {
        let mut rng = Pcg64::seed_from_u64(seed);
        (0..count)
            .map(|_| Point::new(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0)))
            .collect()
    }

    fn assert_counts_match_groups(points: &[Point], centroids: &[Centroid]) {
        for (cluster, centroid) in centroids.iter().enumerate() {
            let members = points.iter().filter(|p| p.group == cluster).count();
            assert_eq!(centroid.count, members, "cluster {cluster}");
        }
    }

    #[test]
    fn test_nearest_centroid() {
        let centroids = [
            Centroid {
                position: Point2D::new(0., 0.),
                count: 1,
            },
            Centroid {
                position: Point2D::new(4., 4.),
                count: 1,
            },
            Centroid {
                position: Point2D::new(-3., 1.),
                count: 1,
            },
        ];

        assert_eq!(nearest_centroid(&Point2D::new(3., 2.5), &centroids), Some(1));
        assert_eq!(nearest_centroid(&Point2D::new(-2., 0.), &centroids), Some(2));
        assert_eq!(nearest_centroid(&Point2D::new(0.1, 0.), &centroids), Some(0));
    }

    #[test]
    fn test_nearest_centroid_tie() {
        let centroids = [
            Centroid {
                position: Point2D::new(-1., 0.),
                count: 1,
            },
            Centroid {
                position: Point2D::new(1., 0.),
                count: 1,
            },
        ];
        assert_eq!(nearest_centroid(&Point2D::new(0., 5.), &centroids), Some(0));
    }

    #[test]
    fn test_nearest_centroid_degenerate() {
        assert_eq!(nearest_centroid(&Point2D::new(1., 1.), &[]), None);

        let centroids = [
            Centroid {
                position: Point2D::new(f64::NAN, f64::NAN),
                count: 0,
            },
            Centroid {
                position: Point2D::new(100., 100.),
                count: 1,
            },
        ];
        assert_eq!(nearest_centroid(&Point2D::new(0., 0.), &centroids), Some(1));
    }

    #[test]
    fn test_compute_centroid() {
        let mut points = vec![Point::new(0., 0.), Point::new(3., 0.), Point::new(0., 6.)];
        points[1].group = 4;
        points[2].group = 2;

        let centroid = compute_centroid(&mut points).unwrap();

        assert_eq!(centroid.count, 3);
        assert_ulps_eq!(centroid.position.x, 1.);
        assert_ulps_eq!(centroid.position.y, 2.);
        assert!(points.iter().all(|p| p.group == 0));

        assert_eq!(compute_centroid(&mut []), Err(Error::EmptyInput));
    }

    #[test]
    fn test_single_cluster() {
        let mut points = vec![Point::new(1., 1.), Point::new(2., 5.), Point::new(-6., 3.)];
        let mut rng = Pcg64::seed_from_u64(0);

        for cluster_count in [0, 1] {
            let centroids = k_means(&mut points, cluster_count, &mut rng).unwrap();

            assert_eq!(centroids.len(), 1);
            assert_eq!(centroids[0].count, 3);
            assert_ulps_eq!(centroids[0].position.x, -1.);
            assert_ulps_eq!(centroids[0].position.y, 3.);
            assert!(points.iter().all(|p| p.group == 0));
        }
    }

    #[test]
    fn test_one_cluster_per_point() {
        let mut points = random_points(5, 1);
        let mut rng = Pcg64::seed_from_u64(0);

        for cluster_count in [5, 10] {
            let centroids = k_means(&mut points, cluster_count, &mut rng).unwrap();

            assert_eq!(centroids.len(), 5);
            for (idx, (p, centroid)) in points.iter().zip(&centroids).enumerate() {
                assert_eq!(p.group, idx);
                assert_eq!(centroid.position, p.position);
                assert_eq!(centroid.count, 1);
            }
        }
    }

    #[test]
    fn test_invalid_input() {
        let mut rng = Pcg64::seed_from_u64(0);
        assert_eq!(k_means(&mut [], 3, &mut rng), Err(Error::EmptyInput));

        let mut points = four_points();
        for tolerance in [-0.1, 1.5, f64::NAN] {
            let mut k_means = KMeans::new(&mut rng, 2);
            k_means.tolerance = tolerance;
            let err = k_means.run(&mut points).unwrap_err();
            assert!(matches!(err, Error::InvalidTolerance(_)));
        }
    }

    #[test]
    fn test_two_separated_clusters() {
        // Every initial assignment, except those grouping the bottom points
        // together and the top points together (a stable fixed point), must
        // end with the left and the right clusters.
        for initial in 0_usize..16 {
            if initial == 0b1010 || initial == 0b0101 {
                continue;
            }

            let mut points = four_points();
            for (i, p) in points.iter_mut().enumerate() {
                p.group = (initial >> i) & 1;
            }
            let mut k_means = KMeans::new(Pcg64::seed_from_u64(initial as u64), 2);
            k_means.empty_clusters = EmptyClusters::Reseed;

            let metadata = k_means.iterate(&mut points);

            assert!(metadata.converged);
            assert_eq!(points[0].group, points[1].group, "initial={initial:04b}");
            assert_eq!(points[2].group, points[3].group, "initial={initial:04b}");
            assert_ne!(points[0].group, points[2].group, "initial={initial:04b}");

            let left = metadata.centroids[points[0].group];
            let right = metadata.centroids[points[2].group];
            assert_eq!(left.position, Point2D::new(0., 0.5));
            assert_eq!(left.count, 2);
            assert_eq!(right.position, Point2D::new(10., 0.5));
            assert_eq!(right.count, 2);
        }
    }

    #[test]
    fn test_empty_cluster_is_kept() {
        let mut points = four_points();
        let mut k_means = KMeans::new(Pcg64::seed_from_u64(0), 3);

        let metadata = k_means.iterate(&mut points);

        assert!(metadata.converged);
        assert_eq!(metadata.iteration_count, 1);
        assert_eq!(metadata.centroids[0].count, 4);
        assert_eq!(metadata.centroids[0].position, Point2D::new(5., 0.5));
        for centroid in &metadata.centroids[1..] {
            assert_eq!(centroid.count, 0);
            assert!(centroid.position.x.is_nan());
        }
        assert!(points.iter().all(|p| p.group == 0));
    }

    #[test]
    fn test_max_iter() {
        let mut points = random_points(2_000, 3);
        let mut k_means = KMeans::new(Pcg64::seed_from_u64(3), 8);
        k_means.tolerance = 0.0;
        k_means.max_iter = 1;

        let metadata = k_means.run(&mut points).unwrap();

        assert_eq!(metadata.iteration_count, 1);
        // A random assignment of 2000 points is never a fixed point.
        assert!(!metadata.converged);
        assert_counts_match_groups(&points, &metadata.centroids);
    }

    #[test]
    fn test_deterministic() {
        let points = random_points(30_000, 4);

        let run = || {
            let mut points = points.clone();
            let mut rng = Pcg64::seed_from_u64(42);
            let centroids = k_means(&mut points, 5, &mut rng).unwrap();
            (points, centroids)
        };

        let (points_1, centroids_1) = run();
        let (points_2, centroids_2) = run();

        // Empty clusters have NaN positions, compare bit patterns.
        let bits = |centroids: &[Centroid]| -> Vec<(u64, u64, usize)> {
            centroids
                .iter()
                .map(|c| (c.position.x.to_bits(), c.position.y.to_bits(), c.count))
                .collect()
        };
        assert_eq!(bits(&centroids_1), bits(&centroids_2));
        assert_eq!(points_1, points_2);
    }

    #[test]
    fn test_tolerance() {
        let mut points = random_points(30_000, 5);
        let mut rng = Pcg64::seed_from_u64(5);

        let centroids = k_means(&mut points, 5, &mut rng).unwrap();

        assert_counts_match_groups(&points, &centroids);
        let changed = reassign(&mut points, &centroids);
        assert!(changed <= 30_000 / 10_000, "{changed} points changed");
    }

    #[test]
    fn test_partition() {
        let points: Vec<Point2D> = four_points().iter().map(|p| p.position).collect();
        let mut partition = vec![0; 4];
        let mut k_means = KMeans::new(Pcg64::seed_from_u64(9), 2);

        let metadata = k_means.partition(&mut partition, &points[..]).unwrap();

        assert_eq!(metadata.centroids.len(), 2);
        assert!(partition.iter().all(|part| *part < 2));
        for (part, centroid) in metadata.centroids.iter().enumerate() {
            let members = partition.iter().filter(|p| **p == part).count();
            assert_eq!(centroid.count, members);
        }

        let err = k_means.partition(&mut partition[..3], &points[..]).unwrap_err();
        assert_eq!(
            err,
            Error::InputLenMismatch {
                expected: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn test_thread_pools() {
        let points = random_points(10_000, 6);
        for thread_count in [1, 3, 8] {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(thread_count)
                .build()
                .unwrap();
            let mut points = points.clone();
            let centroids = pool
                .install(|| k_means(&mut points, 6, &mut Pcg64::seed_from_u64(6)))
                .unwrap();
            assert_eq!(centroids.len(), 6);
            assert_counts_match_groups(&points, &centroids);
        }
    }

    proptest!(
        #[test]
        fn test_k_means_invariants(
            (points, cluster_count) in (3..300_usize).prop_flat_map(|point_count| {
                (
                    prop::collection::vec((-1e3..1e3, -1e3..1e3), point_count),
                    2..point_count,
                )
            }),
            seed in any::<u64>(),
        ) {
            let mut points: Vec<Point> = points
                .into_iter()
                .map(|(x, y)| Point::new(x, y))
                .collect();
            let mut k_means = KMeans::new(Pcg64::seed_from_u64(seed), cluster_count);

            let metadata = k_means.run(&mut points).unwrap();

            prop_assert!(metadata.converged);
            prop_assert_eq!(metadata.centroids.len(), cluster_count);
            let total: usize = metadata.centroids.iter().map(|c| c.count).sum();
            prop_assert_eq!(total, points.len());
            for p in &points {
                prop_assert!(p.group < cluster_count);
            }
            for (cluster, centroid) in metadata.centroids.iter().enumerate() {
                let members = points.iter().filter(|p| p.group == cluster).count();
                prop_assert_eq!(centroid.count, members);
            }
            // Under 10000 points, convergence means a fixed point.
            prop_assert_eq!(reassign(&mut points, &metadata.centroids), 0);
        }
    );
}
