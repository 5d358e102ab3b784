//! Route storage and validation module
//!
//! This module provides the `Route` struct holding a looping bus path and its
//! ordered stops, with precomputed metadata like segment lengths, the bounding
//! box and each stop's distance along the path.

use crate::{PathSegment, Result, RouteError, utils};
use geo::Rect;
use std::collections::HashSet;
use std::sync::Arc;

/// A (latitude, longitude) pair in decimal degrees
///
/// Serialized as a two element array `[lat, lon]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "[f64; 2]", into = "[f64; 2]")
)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lat, c.lon]
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.lon, y: c.lat }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A named stop along a route
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stop {
    /// Unique within the owning route
    pub name: String,
    pub coordinates: Coordinate,
}

impl Stop {
    pub fn new(name: impl Into<String>, coordinates: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }
}

/// Unvalidated route fields, as received from a lookup service or a file
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteData {
    pub name: String,
    pub path: Vec<Coordinate>,
    pub stops: Vec<Stop>,
}

/// An immutable bus route with precomputed metadata
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RouteData", into = "RouteData")
)]
pub struct Route {
    name: String,
    path: Vec<Coordinate>,
    stops: Vec<Stop>,
    /// Segments `(path[i], path[i + 1])` with cached lengths
    segments: Vec<PathSegment>,
    /// Path-distance of each stop, in declaration order
    stop_distances: Vec<f64>,
    /// Precomputed bounding box (x = lon, y = lat)
    bounding_box: Rect<f64>,
    /// Cached total path length in meters
    cached_total_distance: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Route {
    /// Create a new Route from its raw parts
    ///
    /// # Returns
    /// An `Arc<Route>` on success, or `InvalidRoute` when the path has fewer
    /// than two points, a coordinate is out of range, or stop names repeat
    pub fn new(
        name: impl Into<String>,
        path: Vec<Coordinate>,
        stops: Vec<Stop>,
    ) -> Result<Arc<Self>> {
        Self::build(RouteData {
            name: name.into(),
            path,
            stops,
        })
        .map(Arc::new)
    }

    fn build(data: RouteData) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("route::build");

        let RouteData { name, path, stops } = data;

        if path.len() < 2 {
            return Err(RouteError::InvalidRoute(format!(
                "route {name:?} needs at least 2 path points, got {}",
                path.len()
            )));
        }

        let mut seen = HashSet::with_capacity(stops.len());
        for coord in path.iter().chain(stops.iter().map(|s| &s.coordinates)) {
            if !utils::is_valid_coordinate(*coord) {
                return Err(RouteError::InvalidCoordinate {
                    lat: coord.lat,
                    lon: coord.lon,
                });
            }
        }
        for stop in &stops {
            if !seen.insert(stop.name.as_str()) {
                return Err(RouteError::DuplicateStop(stop.name.clone()));
            }
        }

        let segments = PathSegment::from_path(&path);
        let cached_total_distance: f64 = segments.iter().map(|s| s.length_m).sum();
        let stop_distances = stops
            .iter()
            .map(|stop| {
                Self::stop_path_distance(&segments, stop.coordinates).unwrap_or_else(|| {
                    tracing::warn!(
                        "Stop {:?} of route {name:?} is more than {} m away from the path, \
                         placing it at the end of the route",
                        stop.name,
                        utils::STOP_SNAP_RADIUS_M
                    );
                    cached_total_distance
                })
            })
            .collect();
        let bounding_box = Self::compute_bounding_box(&path);

        if let (Some(first), Some(last)) = (path.first(), path.last())
            && utils::haversine_distance(*first, *last) > utils::STOP_SNAP_RADIUS_M
        {
            tracing::debug!("Route {name:?} path does not close its loop");
        }

        tracing::debug!(
            "Built route {name:?}: {} points, {} stops, {:.1} m",
            path.len(),
            stops.len(),
            cached_total_distance
        );

        Ok(Route {
            name,
            path,
            stops,
            segments,
            stop_distances,
            bounding_box,
            cached_total_distance,
        })
    }

    /// Path-distance of a stop: full segments are accumulated until the
    /// first segment whose projection of the stop lies within the snap
    /// radius, of which only the start-to-projection part is added.
    /// `None` when no segment passes within the snap radius.
    fn stop_path_distance(segments: &[PathSegment], stop: Coordinate) -> Option<f64> {
        let mut distance = 0.0;
        for segment in segments {
            let projected = segment.project(stop);
            if utils::haversine_distance(stop, projected) <= utils::STOP_SNAP_RADIUS_M {
                return Some(distance + segment.distance_from_start(projected));
            }
            distance += segment.length_m;
        }
        None
    }

    fn compute_bounding_box(path: &[Coordinate]) -> Rect<f64> {
        let mut min = geo::Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        };
        let mut max = geo::Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        };
        for c in path {
            min.x = min.x.min(c.lon);
            min.y = min.y.min(c.lat);
            max.x = max.x.max(c.lon);
            max.y = max.y.max(c.lat);
        }
        Rect::new(min, max)
    }

    /// Route display name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered path points
    #[inline]
    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    /// Stops in traversal order
    #[inline]
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Consecutive path segments
    #[inline]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Path-distance in meters of each stop, parallel to `stops()`
    #[inline]
    pub fn stop_distances(&self) -> &[f64] {
        &self.stop_distances
    }

    /// Look up a stop by name
    pub fn stop(&self, name: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.name == name)
    }

    /// Bounding box of the path (x = lon, y = lat)
    #[inline]
    pub fn bounding_box(&self) -> Rect<f64> {
        self.bounding_box
    }

    /// Total path length in meters
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn total_distance(&self) -> f64 {
        self.cached_total_distance
    }
}

impl TryFrom<RouteData> for Route {
    type Error = RouteError;

    fn try_from(data: RouteData) -> Result<Self> {
        Self::build(data)
    }
}

impl From<Route> for RouteData {
    fn from(route: Route) -> Self {
        RouteData {
            name: route.name,
            path: route.path,
            stops: route.stops,
        }
    }
}

#[cfg(feature = "serde")]
impl Route {
    /// Validate and convert a raw JSON value into a route
    ///
    /// `name` must be a string and `stops` and `path` must be arrays; a value
    /// missing any of them is rejected before field-level decoding.
    pub fn from_json_value(value: serde_json::Value) -> Result<Arc<Self>> {
        let object = value
            .as_object()
            .ok_or_else(|| RouteError::InvalidRoute("route is not a JSON object".to_string()))?;

        if !object.get("name").is_some_and(|v| v.is_string()) {
            return Err(RouteError::InvalidRoute("missing route name".to_string()));
        }
        for field in ["stops", "path"] {
            if !object.get(field).is_some_and(|v| v.is_array()) {
                return Err(RouteError::InvalidRoute(format!(
                    "missing or non-array field {field:?}"
                )));
            }
        }

        let data: RouteData = serde_json::from_value(value)?;
        Self::build(data).map(Arc::new)
    }
}
