//! Timer that drives the position simulator
//!
//! The driver owns the only periodic tick source of the tracker. Every tick
//! advances the simulator and publishes the new fix on a watch channel;
//! subscribers always observe the latest fix.

use crate::entrypoints::async_runtime;
use chrono::Utc;
use route_progress_lib::{PositionSimulator, Route, RouteData, SimulatedFix, SimulatorState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Owns a [`PositionSimulator`] and the task ticking it
pub struct SimulationDriver {
    simulator: Arc<Mutex<PositionSimulator>>,
    fixes: watch::Sender<Option<SimulatedFix>>,
    task: Option<JoinHandle<()>>,
    tick_interval: Duration,
    /// Bumped under the simulator lock on every start and stop; a tick task
    /// only publishes while its own run is current
    generation: Arc<AtomicU64>,
}

impl SimulationDriver {
    /// Create an idle driver around `simulator`
    pub fn new(simulator: PositionSimulator, tick_interval: Duration) -> Self {
        let (fixes, _) = watch::channel(None);
        Self {
            simulator: Arc::new(Mutex::new(simulator)),
            fixes,
            task: None,
            tick_interval,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Receiver observing every published fix, `None` while stopped
    pub fn subscribe(&self) -> watch::Receiver<Option<SimulatedFix>> {
        self.fixes.subscribe()
    }

    /// Start simulating on `route`
    ///
    /// A running simulation is fully torn down first, so there is never more
    /// than one tick stream.
    pub fn start(&mut self, route: Arc<Route>) -> route_progress_lib::Result<()> {
        self.start_with(|sim| sim.start(route, Utc::now()))
    }

    /// Validate raw route data and start simulating on it
    pub fn start_from_data(&mut self, data: RouteData) -> route_progress_lib::Result<()> {
        self.start_with(|sim| sim.start_from_data(data, Utc::now()))
    }

    fn start_with<F>(&mut self, start: F) -> route_progress_lib::Result<()>
    where
        F: FnOnce(&mut PositionSimulator) -> route_progress_lib::Result<SimulatedFix>,
    {
        self.stop();

        let run = {
            let mut sim = self.lock();
            let initial = start(&mut sim)?;
            self.fixes.send_replace(Some(initial));
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let simulator = self.simulator.clone();
        let fixes = self.fixes.clone();
        let generation = self.generation.clone();
        let period = self.tick_interval;
        self.task = Some(async_runtime::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let mut sim = simulator.lock().unwrap_or_else(PoisonError::into_inner);
                if generation.load(Ordering::SeqCst) != run {
                    tracing::debug!("Tick task of a superseded run exits");
                    break;
                }
                match sim.tick(Utc::now()) {
                    Some(fix) => {
                        fixes.send_replace(Some(fix));
                    }
                    None => break,
                }
            }
        }));

        Ok(())
    }

    /// Cancel the tick task and clear the current fix
    ///
    /// Safe to call while already stopped.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Cancelled simulation tick task");
        }
        let mut sim = self.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        sim.stop();
        self.fixes.send_replace(None);
    }

    /// Current simulator state
    pub fn state(&self) -> SimulatorState {
        self.lock().state()
    }

    /// Latest published fix
    pub fn current_fix(&self) -> Option<SimulatedFix> {
        self.fixes.borrow().clone()
    }

    /// Whether a tick task is alive
    pub fn is_ticking(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PositionSimulator> {
        self.simulator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SimulationDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_progress_lib::{Coordinate, Stop, TICK_INTERVAL};

    fn line_route() -> Arc<Route> {
        Route::new(
            "line",
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 10.0)],
            vec![Stop::new("End", Coordinate::new(0.0, 10.0))],
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_publishes_initial_fix() {
        let mut driver = SimulationDriver::new(PositionSimulator::with_seed(1), TICK_INTERVAL);
        let rx = driver.subscribe();

        driver.start(line_route()).unwrap();

        let fix = rx.borrow().clone().unwrap();
        assert_eq!(fix.coordinates, Coordinate::new(0.0, 0.0));
        assert_eq!(driver.state(), SimulatorState::Running);
        assert!(driver.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_publish_advancing_fixes() {
        let mut driver = SimulationDriver::new(PositionSimulator::with_seed(1), TICK_INTERVAL);
        let mut rx = driver.subscribe();
        driver.start(line_route()).unwrap();
        rx.borrow_and_update();

        let mut previous = 0.0;
        for _ in 0..5 {
            rx.changed().await.unwrap();
            let lon = rx.borrow_and_update().as_ref().unwrap().coordinates.lon;
            assert!(lon > previous);
            previous = lon;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_fix_and_is_idempotent() {
        let mut driver = SimulationDriver::new(PositionSimulator::with_seed(1), TICK_INTERVAL);
        let rx = driver.subscribe();
        driver.start(line_route()).unwrap();

        driver.stop();
        driver.stop();

        assert!(rx.borrow().is_none());
        assert!(driver.current_fix().is_none());
        assert_eq!(driver.state(), SimulatorState::Idle);
        assert!(!driver.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_a_single_tick_stream() {
        let mut driver = SimulationDriver::new(PositionSimulator::with_seed(3), TICK_INTERVAL);
        let mut rx = driver.subscribe();

        driver.start(line_route()).unwrap();
        driver.start(line_route()).unwrap();
        rx.borrow_and_update();

        // One interval should yield exactly one new fix
        tokio::time::sleep(TICK_INTERVAL + Duration::from_millis(10)).await;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_tick_task_never_publishes() {
        let mut driver = SimulationDriver::new(PositionSimulator::with_seed(1), TICK_INTERVAL);
        let mut rx = driver.subscribe();
        driver.start(line_route()).unwrap();
        rx.borrow_and_update();

        // A stop racing the task between its abort and its next poll
        driver.generation.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(TICK_INTERVAL * 3).await;
        assert!(!rx.has_changed().unwrap());
        assert!(!driver.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_route_leaves_driver_idle() {
        let mut driver = SimulationDriver::new(PositionSimulator::with_seed(1), TICK_INTERVAL);
        let rx = driver.subscribe();
        driver.start(line_route()).unwrap();

        let data = RouteData {
            name: "dot".to_string(),
            path: vec![Coordinate::new(0.0, 0.0)],
            stops: vec![],
        };
        assert!(driver.start_from_data(data).is_err());

        assert!(rx.borrow().is_none());
        assert_eq!(driver.state(), SimulatorState::Idle);
        assert!(!driver.is_ticking());
    }
}
