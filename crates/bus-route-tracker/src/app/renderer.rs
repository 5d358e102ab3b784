//! Presentation of tracking results
//!
//! A renderer is bound to exactly one route: it owns everything it has drawn
//! for that route and is replaced wholesale when the route changes.

use route_progress_lib::{Coordinate, ProgressResult, Route, SimulatedFix};
use std::sync::Arc;

/// What a renderer receives for every fix
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub fix: &'a SimulatedFix,
    pub progress: &'a ProgressResult,
}

/// Consumer of tracking output, never consulted by the engine or simulator
pub trait ProgressRenderer: Send {
    /// Route this renderer draws
    fn route(&self) -> &Arc<Route>;

    /// Draw one frame
    fn render(&mut self, frame: Frame<'_>);

    /// Show a text message (announcement, chat reply or error)
    fn show_message(&mut self, text: &str);

    /// Messages shown so far, oldest first
    fn messages(&self) -> &[String];

    /// Number of frames drawn
    fn frames(&self) -> u64;
}

/// A marker drawn for one stop
#[derive(Clone, Debug, PartialEq)]
pub struct StopMarker {
    pub name: String,
    pub position: Coordinate,
    pub highlighted: bool,
}

/// Renderer writing to the log
pub struct ConsoleRenderer {
    route: Arc<Route>,
    markers: Vec<StopMarker>,
    bus_marker: Option<Coordinate>,
    messages: Vec<String>,
    frames: u64,
    /// Log a status line every `status_every` frames
    status_every: u64,
}

impl ConsoleRenderer {
    /// Draw the static layer (path and stop markers) of `route`
    pub fn new(route: Arc<Route>) -> Self {
        let markers = route
            .stops()
            .iter()
            .map(|stop| StopMarker {
                name: stop.name.clone(),
                position: stop.coordinates,
                highlighted: false,
            })
            .collect();

        tracing::info!(
            "Showing route {:?}: {} stops, {:.2} km loop",
            route.name(),
            route.stops().len(),
            route.total_distance() / 1000.0
        );

        Self {
            route,
            markers,
            bus_marker: None,
            messages: Vec::new(),
            frames: 0,
            status_every: 10,
        }
    }

    /// Change how often the status line is logged
    pub fn with_status_every(mut self, frames: u64) -> Self {
        self.status_every = frames.max(1);
        self
    }

    pub fn status_every(&self) -> u64 {
        self.status_every
    }

    pub fn markers(&self) -> &[StopMarker] {
        &self.markers
    }

    pub fn bus_marker(&self) -> Option<Coordinate> {
        self.bus_marker
    }

    fn highlight(&mut self, next_stop: Option<&str>) -> bool {
        let mut changed = false;
        for marker in &mut self.markers {
            let highlighted = Some(marker.name.as_str()) == next_stop;
            changed |= marker.highlighted != highlighted;
            marker.highlighted = highlighted;
        }
        changed
    }
}

impl ProgressRenderer for ConsoleRenderer {
    fn route(&self) -> &Arc<Route> {
        &self.route
    }

    fn render(&mut self, frame: Frame<'_>) {
        self.bus_marker = Some(frame.progress.closest_point);
        self.frames += 1;

        let next = frame.progress.next_stop.as_ref().map(|s| s.name.as_str());
        if self.highlight(next) {
            match next {
                Some(name) => tracing::info!(
                    "Next stop: {name} ({} passed, {} upcoming)",
                    frame.progress.passed_stops.len(),
                    frame.progress.upcoming_stops.len()
                ),
                None => tracing::info!("No stops on this route"),
            }
        }

        if self.frames % self.status_every == 0 {
            tracing::info!(
                "Bus at {} ({:.0}% of loop){}",
                frame.fix.coordinates,
                frame.progress.fraction_complete() * 100.0,
                frame
                    .progress
                    .distance_to_next_stop_m
                    .map(|d| format!(", {d:.0} m to next stop"))
                    .unwrap_or_default()
            );
        } else {
            tracing::debug!("Bus at {}", frame.fix.coordinates);
        }
    }

    fn show_message(&mut self, text: &str) {
        tracing::info!("{text}");
        self.messages.push(text.to_string());
    }

    fn messages(&self) -> &[String] {
        &self.messages
    }

    fn frames(&self) -> u64 {
        self.frames
    }
}
