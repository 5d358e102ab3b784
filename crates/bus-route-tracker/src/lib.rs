//! Bus Route Tracker - Application Library
//!
//! Integrates the route progress engine with a timer-driven position
//! simulator, route lookup and stop announcements.

mod app;
pub mod entrypoints;

pub use app::{BusRouteTrackerApp, CatalogLookup, ServiceError, TemplateAnnouncer};
