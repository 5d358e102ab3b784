//! Application state management
//!
//! This module holds the active route and everything derived from it: the
//! latest progress, the pending announcement and the user-visible messages.
//! Replacing the route resets all of it.

use crate::app::services::{LatestRequest, RequestToken};
use route_progress_lib::{ProgressResult, Route, SimulatedFix, Stop, compute_progress};
use std::sync::Arc;

/// Main application state
#[derive(Default)]
pub struct AppState {
    /// Route currently tracked
    pub route: Option<Arc<Route>>,

    /// Progress derived from the last fix
    pub progress: Option<ProgressResult>,

    /// Last applied announcement text
    pub announcement: Option<String>,

    /// Guard for announcement requests
    pub announcements: LatestRequest,

    /// Guard for route searches
    pub searches: LatestRequest,

    /// Guard for chat replies, superseded by route changes
    pub chats: LatestRequest,

    /// Errors to show the user, oldest first
    pub errors: Vec<String>,

    /// Statistics about the current route
    pub stats: Stats,
}

/// Statistics about the tracked route
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    /// Fixes processed since the route was set
    pub fixes: u64,

    /// Number of times the next stop changed
    pub stop_changes: u64,

    /// Completed loops, counted when the next stop wraps to the first one
    pub laps: u64,
}

/// What changed after applying a fix
#[derive(Clone, Debug, PartialEq)]
pub enum FixOutcome {
    /// Next stop is the same as before
    Unchanged,
    /// A different stop is next
    NextStopChanged(Stop),
    /// No route to apply the fix to
    NoRoute,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked route and reset all derived state
    pub fn set_route(&mut self, route: Arc<Route>) {
        tracing::info!("Tracking route {:?}", route.name());
        self.route = Some(route);
        self.progress = None;
        self.announcement = None;
        self.stats = Stats::default();
        self.announcements.invalidate();
        self.chats.invalidate();
    }

    /// Drop the tracked route
    pub fn clear_route(&mut self) {
        self.route = None;
        self.progress = None;
        self.announcement = None;
        self.stats = Stats::default();
        self.announcements.invalidate();
        self.chats.invalidate();
    }

    /// Recompute progress for a new fix
    pub fn apply_fix(&mut self, fix: &SimulatedFix) -> FixOutcome {
        profiling::scope!("apply_fix");

        let Some(route) = &self.route else {
            return FixOutcome::NoRoute;
        };

        let progress = compute_progress(fix.coordinates, route);
        let previous = self
            .progress
            .as_ref()
            .and_then(|p| p.next_stop.as_ref())
            .map(|s| s.name.clone());
        let wrapped = previous.is_some()
            && route
                .stops()
                .first()
                .is_some_and(|first| previous.as_deref() != Some(first.name.as_str()))
            && progress
                .next_stop
                .as_ref()
                .zip(route.stops().first())
                .is_some_and(|(next, first)| next.name == first.name);

        self.stats.fixes += 1;
        let outcome = match &progress.next_stop {
            Some(next) if previous.as_deref() != Some(next.name.as_str()) => {
                self.stats.stop_changes += 1;
                if wrapped {
                    self.stats.laps += 1;
                }
                FixOutcome::NextStopChanged(next.clone())
            }
            _ => FixOutcome::Unchanged,
        };

        self.progress = Some(progress);
        outcome
    }

    /// Next stop of the latest progress
    pub fn next_stop(&self) -> Option<&Stop> {
        self.progress.as_ref().and_then(|p| p.next_stop.as_ref())
    }

    /// Apply an announcement if it answers the latest request
    ///
    /// Returns `false` for stale responses, which are dropped.
    pub fn apply_announcement(&mut self, token: RequestToken, text: String) -> bool {
        if !self.announcements.is_current(token) {
            tracing::debug!("Dropping stale announcement: {text}");
            return false;
        }
        self.announcement = Some(text);
        true
    }

    /// Record a user-visible error
    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.errors.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use route_progress_lib::Coordinate;

    fn abc_route() -> Arc<Route> {
        Route::new(
            "ABC",
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 1.0),
                Coordinate::new(0.0, 2.0),
            ],
            vec![
                Stop::new("A", Coordinate::new(0.0, 0.0)),
                Stop::new("B", Coordinate::new(0.0, 1.0)),
                Stop::new("C", Coordinate::new(0.0, 2.0)),
            ],
        )
        .unwrap()
    }

    fn fix_at(lon: f64) -> SimulatedFix {
        SimulatedFix {
            coordinates: Coordinate::new(0.0, lon),
            speed_meters_per_second: 10.0,
            timestamp: Utc::now(),
        }
    }

    fn stop_name(outcome: FixOutcome) -> Option<String> {
        match outcome {
            FixOutcome::NextStopChanged(stop) => Some(stop.name),
            _ => None,
        }
    }

    #[test]
    fn test_fix_without_route() {
        let mut state = AppState::new();
        assert_eq!(state.apply_fix(&fix_at(0.5)), FixOutcome::NoRoute);
    }

    #[test]
    fn test_next_stop_changes_are_reported_once() {
        let mut state = AppState::new();
        state.set_route(abc_route());

        assert_eq!(stop_name(state.apply_fix(&fix_at(0.0))), Some("A".into()));
        assert_eq!(stop_name(state.apply_fix(&fix_at(0.5))), Some("B".into()));
        assert_eq!(state.apply_fix(&fix_at(0.7)), FixOutcome::Unchanged);
        assert_eq!(stop_name(state.apply_fix(&fix_at(1.5))), Some("C".into()));

        assert_eq!(state.stats.fixes, 4);
        assert_eq!(state.stats.stop_changes, 3);
        assert_eq!(state.next_stop().map(|s| s.name.as_str()), Some("C"));
    }

    #[test]
    fn test_wrapping_counts_a_lap() {
        let route = Route::new(
            "AB",
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 1.0),
                Coordinate::new(0.0, 2.0),
            ],
            vec![
                Stop::new("A", Coordinate::new(0.0, 0.0)),
                Stop::new("B", Coordinate::new(0.0, 1.0)),
            ],
        )
        .unwrap();
        let mut state = AppState::new();
        state.set_route(route);

        assert_eq!(stop_name(state.apply_fix(&fix_at(0.5))), Some("B".into()));
        // Past "B" the route loops back to "A"
        assert_eq!(stop_name(state.apply_fix(&fix_at(1.5))), Some("A".into()));
        assert_eq!(state.stats.laps, 1);
    }

    #[test]
    fn test_set_route_resets_derived_state() {
        let mut state = AppState::new();
        state.set_route(abc_route());
        state.apply_fix(&fix_at(0.5));
        let token = state.announcements.issue();
        assert!(state.apply_announcement(token, "Next stop: B.".into()));

        state.set_route(abc_route());

        assert!(state.progress.is_none());
        assert!(state.announcement.is_none());
        assert_eq!(state.stats, Stats::default());
        assert!(!state.apply_announcement(token, "Next stop: B.".into()));
    }

    #[test]
    fn test_stale_announcement_is_dropped() {
        let mut state = AppState::new();
        let old = state.announcements.issue();
        let new = state.announcements.issue();

        assert!(!state.apply_announcement(old, "Next stop: A.".into()));
        assert!(state.announcement.is_none());
        assert!(state.apply_announcement(new, "Next stop: B.".into()));
        assert_eq!(state.announcement.as_deref(), Some("Next stop: B."));
    }

    #[test]
    fn test_clear_route() {
        let mut state = AppState::new();
        state.set_route(abc_route());
        state.apply_fix(&fix_at(0.5));

        state.clear_route();
        assert!(state.route.is_none());
        assert!(state.next_stop().is_none());
    }
}
