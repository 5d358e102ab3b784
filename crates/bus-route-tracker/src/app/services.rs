//! External service contracts
//!
//! Route lookup and announcements are black boxes with a request/response
//! contract. This module defines those contracts, validates what comes back,
//! and provides offline implementations backed by a route catalog and text
//! templates.

use async_trait::async_trait;
use route_progress_lib::{Route, RouteError, Stop};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Routes bundled with the binary
const DEMO_ROUTES: &str = include_str!("../../data/demo_routes.json");

/// Error types for external service calls
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Transport(String),

    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    #[error("No route matches {0:?}")]
    NotFound(String),

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Free-text route search
#[async_trait]
pub trait RouteLookup: Send + Sync {
    /// Raw, unvalidated response for `query`
    async fn fetch(&self, query: &str) -> Result<serde_json::Value>;
}

/// Text generation for stop announcements and rider questions
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Announcement for arriving at `stop_name`
    async fn announce(&self, stop_name: &str) -> Result<String>;

    /// Answer to a rider message given the current route context
    async fn chat(&self, message: &str, route: &Route, next_stop: Option<&Stop>)
    -> Result<String>;
}

/// Look up a route and validate the response
///
/// A response missing `name`, `stops` or `path` is an `InvalidResponse`,
/// distinct from a `Transport` failure of the call itself.
pub async fn lookup_route(service: &dyn RouteLookup, query: &str) -> Result<Arc<Route>> {
    let response = service.fetch(query).await?;
    parse_route_response(response)
}

/// Validate a raw lookup response into a route
pub fn parse_route_response(response: serde_json::Value) -> Result<Arc<Route>> {
    Route::from_json_value(response).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

/// Token identifying one request among a series of superseding requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestToken(u64);

/// Generation counter deciding whether a response is still wanted
///
/// Every new request supersedes all earlier ones, and only a response
/// carrying the latest token may be applied.
#[derive(Debug, Default)]
pub struct LatestRequest {
    generation: AtomicU64,
}

impl LatestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a new request, superseding older tokens
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `token` belongs to the most recent request
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }

    /// Supersede every outstanding request without issuing a new one
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Route lookup over an in-memory catalog of raw route objects
///
/// Entries stay raw JSON so that catalog routes go through the same
/// validation as responses of a remote service.
#[derive(Clone, Debug)]
pub struct CatalogLookup {
    entries: Vec<serde_json::Value>,
    latency: Duration,
}

impl CatalogLookup {
    /// Catalog from a JSON array of route objects
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ServiceError::InvalidResponse(format!("catalog is not JSON: {e}")))?;
        match value {
            serde_json::Value::Array(entries) => Ok(Self {
                entries,
                latency: Duration::ZERO,
            }),
            _ => Err(ServiceError::InvalidResponse(
                "catalog must be a JSON array".to_string(),
            )),
        }
    }

    /// Catalog read from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(
            "Loaded {} routes from {}",
            catalog.entries.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Catalog of the routes bundled with the binary
    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO_ROUTES)
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Names of all catalog entries that have one
    pub fn route_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| e.get("name").and_then(|n| n.as_str()))
            .collect()
    }
}

#[async_trait]
impl RouteLookup for CatalogLookup {
    async fn fetch(&self, query: &str) -> Result<serde_json::Value> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let needle = query.trim().to_lowercase();
        let found = if needle.is_empty() {
            self.entries.first()
        } else {
            self.entries.iter().find(|entry| {
                entry
                    .get("name")
                    .and_then(|n| n.as_str())
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
        };

        found
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(query.to_string()))
    }
}

/// Announcer producing fixed sentences
#[derive(Clone, Debug, Default)]
pub struct TemplateAnnouncer {
    latency: Duration,
}

impl TemplateAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Announcer for TemplateAnnouncer {
    async fn announce(&self, stop_name: &str) -> Result<String> {
        self.wait().await;
        Ok(format!(
            "Next stop: {stop_name}. Please press the bell if you wish to get off."
        ))
    }

    async fn chat(
        &self,
        message: &str,
        route: &Route,
        next_stop: Option<&Stop>,
    ) -> Result<String> {
        self.wait().await;

        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::InvalidResponse(
                "empty rider message".to_string(),
            ));
        }

        let next = match next_stop {
            Some(stop) => format!("The next stop is {}.", stop.name),
            None => "This route has no stops.".to_string(),
        };
        Ok(format!(
            "You asked: \"{message}\". You are riding the {}, {:.1} km per loop. {next}",
            route.name(),
            route.total_distance() / 1000.0
        ))
    }
}
