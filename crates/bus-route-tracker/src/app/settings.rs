use crate::entrypoints::{get_env, parse_args};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Bus Route Tracker - Simulates a bus on a looping route and announces the next stop
pub struct Settings {
    /// JSON file with an array of routes to search (built-in demo routes if omitted)
    #[clap(short, long, value_name = "FILE", env = "BUS_TRACKER_ROUTES")]
    pub routes: Option<PathBuf>,

    /// Route to look up on startup (first route of the catalog if omitted)
    #[clap(short, long)]
    pub query: Option<String>,

    /// Stop after this many simulated fixes (run until Ctrl-C if omitted)
    #[clap(short, long)]
    pub ticks: Option<u64>,

    /// Simulation tick interval in milliseconds
    #[clap(long, default_value = "100")]
    pub tick_ms: u64,

    /// Seed for the simulated speed (random if omitted)
    #[clap(long)]
    pub seed: Option<u64>,

    /// Default log filter, overridden by RUST_LOG
    #[clap(long, default_value = "info")]
    pub log: String,
}

impl Settings {
    /// Parse settings from the command line, exiting on invalid arguments
    pub fn from_cli() -> Self {
        match parse_args::<Settings>() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Tick interval as a duration, never zero
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Number of frames between two status lines, about one per second
    pub fn status_every(&self) -> u64 {
        (1000 / self.tick_interval().as_millis() as u64).max(1)
    }

    /// Effective log filter: `RUST_LOG` wins over `--log`
    pub fn log_filter(&self) -> String {
        get_env::<String>("RUST_LOG").unwrap_or_else(|| self.log.clone())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            routes: None,
            query: None,
            ticks: None,
            tick_ms: 100,
            seed: None,
            log: "info".to_string(),
        }
    }
}
