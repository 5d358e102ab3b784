//! Application module
//!
//! This module wires the pieces of the tracker together:
//! - Route lookups replacing the tracked route (latest search wins)
//! - The tick driver feeding fixes into progress computation
//! - Stop announcements and rider chat through the announcer service
//! - A console renderer owned by the current route

mod driver;
mod renderer;
pub(crate) mod services;
pub(crate) mod settings;
mod state;

use crate::app::driver::SimulationDriver;
use crate::app::renderer::{ConsoleRenderer, Frame, ProgressRenderer};
use crate::app::services::{Announcer, RequestToken, RouteLookup, lookup_route};
use crate::app::settings::Settings;
use crate::app::state::{AppState, FixOutcome, Stats};
use crate::entrypoints::async_runtime;
use route_progress_lib::{PositionSimulator, Route, SimulatedFix};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub use crate::app::services::{CatalogLookup, ServiceError, TemplateAnnouncer};

/// Result of a background service call, delivered back to the app
enum Event {
    Route {
        token: RequestToken,
        result: services::Result<Arc<Route>>,
    },
    Announcement {
        token: RequestToken,
        result: services::Result<String>,
    },
    Chat {
        token: RequestToken,
        result: services::Result<String>,
    },
}

/// Main application structure
pub struct BusRouteTrackerApp {
    /// Tracked route and derived state
    state: AppState,

    /// Ticks the position simulator
    driver: SimulationDriver,

    /// Latest fix published by the driver
    fixes: watch::Receiver<Option<SimulatedFix>>,

    /// Renderer of the current route, replaced on every route change
    renderer: Option<Box<dyn ProgressRenderer>>,

    /// Frames between two renderer status lines
    status_every: u64,

    lookup: Arc<dyn RouteLookup>,
    announcer: Arc<dyn Announcer>,

    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl BusRouteTrackerApp {
    pub fn new(
        settings: &Settings,
        lookup: Arc<dyn RouteLookup>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        let simulator = match settings.seed {
            Some(seed) => PositionSimulator::with_seed(seed),
            None => PositionSimulator::new(),
        };
        let driver = SimulationDriver::new(simulator, settings.tick_interval());
        let fixes = driver.subscribe();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            state: AppState::new(),
            driver,
            fixes,
            renderer: None,
            status_every: settings.status_every(),
            lookup,
            announcer,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Messages shown by the current renderer
    pub fn messages(&self) -> Vec<String> {
        self.renderer
            .as_ref()
            .map(|r| r.messages().to_vec())
            .unwrap_or_default()
    }

    /// Look up a route and start tracking it
    ///
    /// On failure the previous route keeps running and the error is shown to
    /// the user.
    pub async fn search(&mut self, query: &str) -> services::Result<Arc<Route>> {
        let token = self.state.searches.issue();
        let result = lookup_route(self.lookup.as_ref(), query).await;
        self.apply_route(token, result)
    }

    /// Look up a route in the background
    ///
    /// Only the most recent request is applied when several are in flight.
    pub fn request_search(&self, query: &str) {
        let token = self.state.searches.issue();
        let lookup = self.lookup.clone();
        let events = self.events_tx.clone();
        let query = query.to_string();
        async_runtime::spawn(async move {
            let result = lookup_route(lookup.as_ref(), &query).await;
            let _ = events.send(Event::Route { token, result });
        });
    }

    /// Ask the announcer about the current route in the background
    pub fn request_chat(&mut self, message: &str) {
        let Some(route) = self.state.route.clone() else {
            self.report_error("No route to ask about yet");
            return;
        };
        let next_stop = self.state.next_stop().cloned();
        let token = self.state.chats.issue();
        let announcer = self.announcer.clone();
        let events = self.events_tx.clone();
        let message = message.to_string();
        async_runtime::spawn(async move {
            let result = announcer
                .chat(&message, &route, next_stop.as_ref())
                .await;
            let _ = events.send(Event::Chat { token, result });
        });
    }

    fn request_announcement(&self, stop_name: &str) {
        let token = self.state.announcements.issue();
        let announcer = self.announcer.clone();
        let events = self.events_tx.clone();
        let stop_name = stop_name.to_string();
        async_runtime::spawn(async move {
            let result = announcer.announce(&stop_name).await;
            let _ = events.send(Event::Announcement { token, result });
        });
    }

    /// Process fixes and service replies until `ticks` fixes were applied or
    /// `shutdown` completes
    pub async fn run_until<F>(&mut self, ticks: Option<u64>, shutdown: F) -> Stats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut applied = 0u64;

        loop {
            if ticks.is_some_and(|limit| applied >= limit) {
                tracing::info!("Processed {applied} fixes, stopping");
                break;
            }

            tokio::select! {
                changed = self.fixes.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Fix stream closed");
                        break;
                    }
                    let fix = self.fixes.borrow_and_update().clone();
                    if let Some(fix) = fix
                        && self.handle_fix(&fix)
                    {
                        applied += 1;
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        self.driver.stop();
        if let Some(renderer) = &self.renderer {
            tracing::info!(
                "Rendered {} frames of {:?}",
                renderer.frames(),
                renderer.route().name()
            );
        }
        self.state.stats.clone()
    }

    /// Apply one fix, returns whether a route consumed it
    fn handle_fix(&mut self, fix: &SimulatedFix) -> bool {
        profiling::scope!("handle_fix");

        let outcome = self.state.apply_fix(fix);
        if outcome == FixOutcome::NoRoute {
            return false;
        }

        if let (Some(renderer), Some(progress)) = (self.renderer.as_mut(), &self.state.progress) {
            renderer.render(Frame { fix, progress });
        }
        if let FixOutcome::NextStopChanged(stop) = outcome {
            self.request_announcement(&stop.name);
        }
        true
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Route { token, result } => {
                // Errors are already reported
                let _ = self.apply_route(token, result);
            }
            Event::Announcement { token, result } => match result {
                Ok(text) => {
                    if self.state.apply_announcement(token, text.clone()) {
                        self.show_message(&text);
                    }
                }
                Err(e) if self.state.announcements.is_current(token) => {
                    self.report_error(format!("Announcement failed: {e}"));
                }
                Err(e) => tracing::debug!("Ignoring failure of stale announcement: {e}"),
            },
            Event::Chat { token, result } => {
                if !self.state.chats.is_current(token) {
                    tracing::debug!("Dropping chat reply for a previous route");
                    return;
                }
                match result {
                    Ok(reply) => self.show_message(&reply),
                    Err(e) => self.report_error(format!("Chat failed: {e}")),
                }
            }
        }
    }

    fn apply_route(
        &mut self,
        token: RequestToken,
        result: services::Result<Arc<Route>>,
    ) -> services::Result<Arc<Route>> {
        if !self.state.searches.is_current(token) {
            tracing::debug!("Dropping superseded route lookup");
            return result;
        }

        let route = match result {
            Ok(route) => route,
            Err(e) => {
                self.report_error(format!("Route lookup failed: {e}"));
                return Err(e);
            }
        };

        // Replace the renderer before the first fix of the new route arrives
        self.renderer = Some(Box::new(
            ConsoleRenderer::new(route.clone()).with_status_every(self.status_every),
        ));
        self.state.set_route(route.clone());
        if let Err(e) = self.driver.start(route.clone()) {
            self.state.clear_route();
            self.renderer = None;
            self.report_error(format!("Cannot simulate route: {e}"));
            return Err(e.into());
        }
        Ok(route)
    }

    fn show_message(&mut self, text: &str) {
        match self.renderer.as_mut() {
            Some(renderer) => renderer.show_message(text),
            None => tracing::info!("{text}"),
        }
    }

    fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.show_message(&message);
        }
        self.state.push_error(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            seed: Some(7),
            ..Settings::default()
        }
    }

    fn app_with_latency(latency: Duration) -> BusRouteTrackerApp {
        let lookup = CatalogLookup::demo().unwrap().with_latency(latency);
        let announcer = TemplateAnnouncer::new().with_latency(latency);
        BusRouteTrackerApp::new(&settings(), Arc::new(lookup), Arc::new(announcer))
    }

    async fn next_event(app: &mut BusRouteTrackerApp) {
        let event = app.events_rx.recv().await.unwrap();
        app.handle_event(event);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_starts_tracking() {
        let mut app = app_with_latency(Duration::ZERO);

        let route = app.search("city").await.unwrap();

        assert_eq!(route.name(), "City Loop");
        assert_eq!(
            app.state().route.as_ref().map(|r| r.name()),
            Some("City Loop")
        );
        assert!(app.driver.is_ticking());
        assert!(app.renderer.is_some());
        assert_eq!(app.status_every, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_search_keeps_current_route() {
        let mut app = app_with_latency(Duration::ZERO);
        app.search("harbour").await.unwrap();

        let result = app.search("night owl").await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert_eq!(
            app.state().route.as_ref().map(|r| r.name()),
            Some("Harbour Express")
        );
        assert_eq!(app.state().errors.len(), 1);
        assert!(app.messages()[0].starts_with("Route lookup failed"));
        assert!(app.driver.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_search_wins() {
        let mut app = app_with_latency(Duration::from_millis(500));

        app.request_search("harbour");
        app.request_search("city");
        next_event(&mut app).await;
        next_event(&mut app).await;

        assert_eq!(
            app.state().route.as_ref().map(|r| r.name()),
            Some("City Loop")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_announcement_is_not_shown() {
        let mut app = app_with_latency(Duration::from_millis(300));
        app.search("city").await.unwrap();

        app.request_announcement("Britomart");
        app.request_announcement("Queen Street");
        next_event(&mut app).await;
        next_event(&mut app).await;

        let announcement = app.state().announcement.clone().unwrap();
        assert!(announcement.starts_with("Next stop: Queen Street."));
        assert_eq!(app.messages(), vec![announcement]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_change_drops_pending_announcement() {
        let mut app = app_with_latency(Duration::ZERO);
        app.search("city").await.unwrap();

        app.request_announcement("Britomart");
        app.search("harbour").await.unwrap();
        next_event(&mut app).await;

        assert!(app.state().announcement.is_none());
        assert!(app.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_without_route_reports_error() {
        let mut app = app_with_latency(Duration::ZERO);
        app.request_chat("where are we?");
        assert_eq!(app.state().errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_reply_is_shown() {
        let mut app = app_with_latency(Duration::ZERO);
        app.search("harbour").await.unwrap();

        app.request_chat("how long is this ride?");
        next_event(&mut app).await;

        let messages = app.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Harbour Express"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_applies_fixes_and_announces() {
        let mut app = app_with_latency(Duration::ZERO);
        app.search("city").await.unwrap();

        let stats = app.run_until(Some(20), std::future::pending()).await;

        assert_eq!(stats.fixes, 20);
        assert!(stats.stop_changes >= 1);
        assert!(app.state().announcement.is_some());
        assert!(!app.driver.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let mut app = app_with_latency(Duration::ZERO);
        app.search("city").await.unwrap();

        let stats = app
            .run_until(None, tokio::time::sleep(Duration::from_millis(1050)))
            .await;

        // Initial fix plus one per elapsed tick
        assert!(stats.fixes >= 10);
        assert!(stats.fixes <= 12);
    }
}
