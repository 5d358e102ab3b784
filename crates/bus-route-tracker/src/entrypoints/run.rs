//! Native entry point of the tracker binary

use crate::app::BusRouteTrackerApp;
use crate::app::services::{CatalogLookup, ServiceError, TemplateAnnouncer};
use crate::app::settings::Settings;
use crate::entrypoints::log_version_info;
use std::sync::Arc;

/// Install the global `tracing` subscriber
///
/// `filter` uses the `RUST_LOG` syntax. Installing twice is harmless: the
/// second call is ignored.
pub fn init_logging(filter: &str) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("Invalid log filter {filter:?} ({e}), using \"info\"");
        EnvFilter::new("info")
    });

    let fmt_layer = fmt::layer().with_target(false).with_filter(env_filter);
    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging was already initialized");
    }
}

/// Parse settings, then look up the initial route and track it until the
/// tick limit or Ctrl-C
pub async fn native_main() -> Result<(), ServiceError> {
    let settings = Settings::from_cli();
    init_logging(&settings.log_filter());
    log_version_info();

    let catalog = match &settings.routes {
        Some(path) => CatalogLookup::from_file(path)?,
        None => CatalogLookup::demo()?,
    };
    tracing::info!("Available routes: {}", catalog.route_names().join(", "));

    let mut app = BusRouteTrackerApp::new(
        &settings,
        Arc::new(catalog),
        Arc::new(TemplateAnnouncer::new()),
    );
    app.search(settings.query.as_deref().unwrap_or_default())
        .await?;

    let stats = app
        .run_until(settings.ticks, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!(
        "Done: {} fixes, {} stop changes, {} laps",
        stats.fixes,
        stats.stop_changes,
        stats.laps
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("debug");
        init_logging("not a [valid filter");
        tracing::info!("still logging");
    }
}
