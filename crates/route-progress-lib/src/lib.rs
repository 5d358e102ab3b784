//! Route Progress Library - Core Geometry for Bus Route Tracking
//!
//! This library maps raw positions onto a looping bus route and tells which
//! stop comes next, and drives a simulated bus along that route.
//!
//! # Architecture
//!
//! - **[`Route`]**: Immutable path and stops with precomputed distances
//! - **[`PathSegment`]**: One straight piece of the path with cached bounds
//! - **[`compute_progress`]**: Pure progress engine returning a [`ProgressResult`]
//! - **[`PositionSimulator`]**: Tick-driven interpolator emitting [`SimulatedFix`]es
//!
//! # Numerical Model
//!
//! - **Distances**: Haversine on a sphere of radius 6371 km
//! - **Projections**: Planar, on raw (lat, lon) pairs, clamped to segment ends
//! - **Stops**: Snapped to the first segment passing within 50 m

mod progress;
mod route;
mod segment;
mod simulator;
pub mod utils;

// Public API exports
pub use progress::{ProgressResult, closest_point_on_path, compute_progress, path_distance};
pub use route::{Coordinate, Route, RouteData, Stop};
pub use segment::PathSegment;
pub use simulator::{
    PositionSimulator, SIMULATED_SPEED_MPS, SPEED_RANGE, SimulatedFix, SimulatorState,
    TICK_INTERVAL,
};

/// Error types for route construction and simulation
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Duplicate stop name: {0}")]
    DuplicateStop(String),

    #[error("Invalid coordinate: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Invalid simulation speed: {0}")]
    InvalidSpeed(f64),

    #[error("Route decoding error: {0}")]
    Json(String),
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::Json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;
