//! Path segments with cached length and bounding box

use crate::{Coordinate, utils};
use geo::{Intersects, Rect};

/// A single straight piece `(path[i], path[i + 1])` of a route path
#[derive(Clone, Debug, PartialEq)]
pub struct PathSegment {
    /// Index of the first point in the path
    pub index: usize,
    /// Start point
    pub start: Coordinate,
    /// End point
    pub end: Coordinate,
    /// Haversine length in meters
    pub length_m: f64,
    /// Axis-aligned bounds of the two endpoints (x = lon, y = lat)
    bounds: Rect<f64>,
}

impl PathSegment {
    /// Create a new segment between two path points
    pub fn new(index: usize, start: Coordinate, end: Coordinate) -> Self {
        Self {
            index,
            start,
            end,
            length_m: utils::haversine_distance(start, end),
            bounds: Rect::new(geo::Coord::from(start), geo::Coord::from(end)),
        }
    }

    /// Build all consecutive segments of a path
    pub fn from_path(path: &[Coordinate]) -> Vec<Self> {
        path.windows(2)
            .enumerate()
            .map(|(i, pair)| Self::new(i, pair[0], pair[1]))
            .collect()
    }

    /// Clamped planar projection of `p` onto this segment
    #[inline]
    pub fn project(&self, p: Coordinate) -> Coordinate {
        utils::project_on_segment(p, self.start, self.end)
    }

    /// Whether `p` lies within the segment's bounding box, edges included
    #[inline]
    pub fn bounds_contain(&self, p: Coordinate) -> bool {
        self.bounds.intersects(&geo::Coord::from(p))
    }

    /// Distance in meters from the segment start to `p`
    #[inline]
    pub fn distance_from_start(&self, p: Coordinate) -> f64 {
        utils::haversine_distance(self.start, p)
    }

    /// Whether both endpoints coincide
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}
