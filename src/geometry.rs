//! Geometric types shared by the clustering engine and its collaborators.

use nalgebra::Vector2;
use rayon::prelude::*;

pub type Point2D = Vector2<f64>;

/// A point to be clustered.
///
/// `group` is the index of the cluster the point currently belongs to.  The
/// engine only ever writes this field; points are neither moved nor
/// reallocated during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub position: Point2D,
    pub group: usize,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: Point2D::new(x, y),
            group: 0,
        }
    }
}

impl From<Point2D> for Point {
    fn from(position: Point2D) -> Self {
        Self { position, group: 0 }
    }
}

/// Mean position and population of one cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub position: Point2D,
    pub count: usize,
}

impl Centroid {
    pub(crate) fn zero() -> Self {
        Self {
            position: Point2D::zeros(),
            count: 0,
        }
    }
}

/// Axis-aligned extent of a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub p_min: Point2D,
    pub p_max: Point2D,
}

impl BoundingBox {
    /// Returns `None` if the iterator is empty.
    pub fn from_points<P>(points: P) -> Option<Self>
    where
        P: IntoParallelIterator<Item = Point2D>,
    {
        points
            .into_par_iter()
            .fold_with(None, |bb: Option<Self>, p| {
                Some(match bb {
                    Some(bb) => Self {
                        p_min: bb.p_min.inf(&p),
                        p_max: bb.p_max.sup(&p),
                    },
                    None => Self { p_min: p, p_max: p },
                })
            })
            .reduce_with(|left, right| match (left, right) {
                (Some(left), Some(right)) => Some(Self {
                    p_min: left.p_min.inf(&right.p_min),
                    p_max: left.p_max.sup(&right.p_max),
                }),
                (bb, None) | (None, bb) => bb,
            })
            .flatten()
    }

    pub fn width(&self) -> f64 {
        self.p_max.x - self.p_min.x
    }

    pub fn height(&self) -> f64 {
        self.p_max.y - self.p_min.y
    }

    pub fn center(&self) -> Point2D {
        (self.p_min + self.p_max) / 2.0
    }
}
