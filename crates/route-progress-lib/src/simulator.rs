//! Position simulator
//!
//! Moves a virtual bus along a route path one tick at a time. The simulator
//! is a plain state machine: it does not own a timer, the caller invokes
//! [`PositionSimulator::tick`] at [`TICK_INTERVAL`].

use crate::{Coordinate, Result, Route, RouteData, RouteError, utils};
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// Wall-clock interval between two ticks
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Range of the per-run speed, as fraction of a segment per tick
pub const SPEED_RANGE: Range<f64> = 0.01..0.05;

/// Speed reported in every fix
pub const SIMULATED_SPEED_MPS: f64 = 10.0;

/// A single simulated position reading
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulatedFix {
    pub coordinates: Coordinate,
    pub speed_meters_per_second: f64,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of the simulator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulatorState {
    Idle,
    Running,
}

/// State of one simulation run, dropped on `stop`
#[derive(Clone, Debug)]
struct Run {
    route: Arc<Route>,
    speed: f64,
    segment_index: usize,
    progress: f64,
}

/// Time-stepped interpolator along a route path
#[derive(Debug)]
pub struct PositionSimulator {
    rng: ChaCha8Rng,
    run: Option<Run>,
    current_fix: Option<SimulatedFix>,
    last_error: Option<RouteError>,
}

impl Default for PositionSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl PositionSimulator {
    /// Create an idle simulator with an entropy-seeded speed generator
    pub fn new() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }

    /// Create an idle simulator whose speeds are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            run: None,
            current_fix: None,
            last_error: None,
        }
    }

    /// Start simulating on `route` at a random speed
    ///
    /// Any previous run is torn down first. Returns the initial fix, which
    /// sits on the first path point.
    pub fn start(&mut self, route: Arc<Route>, now: DateTime<Utc>) -> Result<SimulatedFix> {
        let speed = self.rng.gen_range(SPEED_RANGE);
        self.start_with_speed(route, speed, now)
    }

    /// Validate raw route data and start simulating on it
    ///
    /// On failure the simulator stays idle without a fix and the error is
    /// kept in [`last_error`](Self::last_error).
    pub fn start_from_data(
        &mut self,
        data: RouteData,
        now: DateTime<Utc>,
    ) -> Result<SimulatedFix> {
        match Route::try_from(data) {
            Ok(route) => self.start(Arc::new(route), now),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Start simulating on `route` with a fixed speed in segments per tick
    ///
    /// `speed` must be in `(0, 1)`.
    pub fn start_with_speed(
        &mut self,
        route: Arc<Route>,
        speed: f64,
        now: DateTime<Utc>,
    ) -> Result<SimulatedFix> {
        self.stop();

        if route.path().len() < 2 {
            return Err(self.fail(RouteError::InvalidRoute(format!(
                "cannot simulate route {:?} with {} path points",
                route.name(),
                route.path().len()
            ))));
        }
        if !(speed > 0.0 && speed < 1.0) {
            return Err(self.fail(RouteError::InvalidSpeed(speed)));
        }

        tracing::info!(
            "Starting simulation on {:?} at {:.3} segments/tick",
            route.name(),
            speed
        );

        let fix = SimulatedFix {
            coordinates: route.path()[0],
            speed_meters_per_second: SIMULATED_SPEED_MPS,
            timestamp: now,
        };
        self.run = Some(Run {
            route,
            speed,
            segment_index: 0,
            progress: 0.0,
        });
        self.last_error = None;
        self.current_fix = Some(fix.clone());
        Ok(fix)
    }

    fn fail(&mut self, error: RouteError) -> RouteError {
        tracing::warn!("Simulation not started: {error}");
        self.run = None;
        self.current_fix = None;
        self.last_error = Some(error.clone());
        error
    }

    /// Stop the current run and clear the current fix
    ///
    /// Calling this while idle does nothing.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            tracing::info!("Stopped simulation on {:?}", run.route.name());
        }
        self.current_fix = None;
    }

    /// Advance by one tick and return the new fix, `None` while idle
    ///
    /// Completing a segment moves to the next one (wrapping after the last)
    /// and applies the same tick's increment there.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<SimulatedFix> {
        let run = self.run.as_mut()?;
        let segments = run.route.segments();

        loop {
            run.progress += run.speed;
            if run.progress < 1.0 {
                break;
            }
            run.progress = 0.0;
            run.segment_index += 1;
            if run.segment_index >= segments.len() {
                run.segment_index = 0;
                tracing::debug!("Simulation looped on {:?}", run.route.name());
            }
        }

        let segment = &segments[run.segment_index];
        let fix = SimulatedFix {
            coordinates: utils::interpolate(segment.start, segment.end, run.progress),
            speed_meters_per_second: SIMULATED_SPEED_MPS,
            timestamp: now,
        };

        tracing::trace!(
            "Tick: segment {} at {:.3} -> {}",
            run.segment_index,
            run.progress,
            fix.coordinates
        );

        self.current_fix = Some(fix.clone());
        Some(fix)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SimulatorState {
        if self.run.is_some() {
            SimulatorState::Running
        } else {
            SimulatorState::Idle
        }
    }

    /// Latest fix, `None` while idle
    #[inline]
    pub fn current_fix(&self) -> Option<&SimulatedFix> {
        self.current_fix.as_ref()
    }

    /// Error reported by the last failed start, cleared by a successful one
    #[inline]
    pub fn last_error(&self) -> Option<&RouteError> {
        self.last_error.as_ref()
    }

    /// Route of the current run
    pub fn route(&self) -> Option<&Arc<Route>> {
        self.run.as_ref().map(|r| &r.route)
    }

    /// Speed of the current run in segments per tick
    pub fn speed(&self) -> Option<f64> {
        self.run.as_ref().map(|r| r.speed)
    }

    /// Index of the segment being traveled
    pub fn segment_index(&self) -> Option<usize> {
        self.run.as_ref().map(|r| r.segment_index)
    }

    /// Progress within the current segment, in `[0, 1)`
    pub fn progress(&self) -> Option<f64> {
        self.run.as_ref().map(|r| r.progress)
    }
}
