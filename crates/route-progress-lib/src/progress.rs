//! Route progress engine
//!
//! Maps a raw coordinate onto a route path and derives which stop is next.
//! Every call is a pure function of `(coordinate, route)`: nothing is carried
//! between calls, so it is safe to call from any number of threads.

use crate::{Coordinate, Route, Stop, utils};
use std::collections::BTreeSet;

/// Progress of a position along a route
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressResult {
    /// Nearest point on the path to the queried coordinate
    pub closest_point: Coordinate,
    /// Next stop, `None` only for routes without stops
    pub next_stop: Option<Stop>,
    /// Stops from `next_stop` to the end of the route, inclusive
    pub upcoming_stops: Vec<Stop>,
    /// Names of the stops strictly before `next_stop`
    pub passed_stops: BTreeSet<String>,
    /// Path-distance of the queried coordinate in meters
    pub distance_along_m: f64,
    /// Path-distance left until `next_stop`, across the loop seam if needed
    pub distance_to_next_stop_m: Option<f64>,
    /// Total path length in meters
    pub route_length_m: f64,
}

impl ProgressResult {
    /// Fraction of the loop already traveled, in `[0, 1]`
    pub fn fraction_complete(&self) -> f64 {
        if self.route_length_m > 0.0 {
            (self.distance_along_m / self.route_length_m).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Compute the progress of `current` along `route`
///
/// The next stop is the stop whose path-distance is the smallest one at or
/// ahead of the position's path-distance. Past the final stop the route
/// loops and the first stop is next again.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compute_progress(current: Coordinate, route: &Route) -> ProgressResult {
    let closest_point = closest_point_on_path(current, route);
    let distance_along_m = path_distance(current, route);
    let stops = route.stops();

    let next_index = next_stop_index(distance_along_m, route.stop_distances());

    let (next_stop, upcoming_stops, passed_stops, distance_to_next_stop_m) = match next_index {
        Some(index) => (
            Some(stops[index].clone()),
            stops[index..].to_vec(),
            stops[..index].iter().map(|s| s.name.clone()).collect(),
            Some(distance_to_stop(route, index, distance_along_m)),
        ),
        None => (None, Vec::new(), BTreeSet::new(), None),
    };

    tracing::trace!(
        "Progress on {:?} at {current}: {:.1} m, next stop {:?}",
        route.name(),
        distance_along_m,
        next_stop.as_ref().map(|s| s.name.as_str())
    );

    ProgressResult {
        closest_point,
        next_stop,
        upcoming_stops,
        passed_stops,
        distance_along_m,
        distance_to_next_stop_m,
        route_length_m: route.total_distance(),
    }
}

/// Projection of `current` onto the nearest segment, first segment on ties
pub fn closest_point_on_path(current: Coordinate, route: &Route) -> Coordinate {
    let mut best: Option<(Coordinate, f64)> = None;

    for segment in route.segments() {
        let projected = segment.project(current);
        let distance = utils::haversine_distance(current, projected);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((projected, distance));
        }
    }

    best.map_or(current, |(point, _)| point)
}

/// Path-distance of `current`
///
/// Full segment lengths are accumulated until the first segment whose
/// bounding box contains `current`; that segment only contributes the
/// distance from its start to the projection of `current` onto it.
/// When no segment matches, the whole path length is returned.
pub fn path_distance(current: Coordinate, route: &Route) -> f64 {
    let mut distance = 0.0;
    for segment in route.segments() {
        if segment.bounds_contain(current) {
            return distance + segment.distance_from_start(segment.project(current));
        }
        distance += segment.length_m;
    }
    distance
}

fn distance_to_stop(route: &Route, index: usize, distance_along: f64) -> f64 {
    let stop_distance = route.stop_distances()[index];
    if stop_distance >= distance_along {
        stop_distance - distance_along
    } else {
        (route.total_distance() - distance_along).max(0.0) + stop_distance
    }
}

/// Index of the closest stop at or ahead of `distance_along`, wrapping to
/// the first stop when every stop is behind
fn next_stop_index(distance_along: f64, stop_distances: &[f64]) -> Option<usize> {
    if stop_distances.is_empty() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, &stop_distance) in stop_distances.iter().enumerate() {
        if stop_distance < distance_along {
            continue;
        }
        let diff = stop_distance - distance_along;
        if best.is_none_or(|(_, best_diff)| diff < best_diff) {
            best = Some((i, diff));
        }
    }

    Some(best.map_or(0, |(i, _)| i))
}
