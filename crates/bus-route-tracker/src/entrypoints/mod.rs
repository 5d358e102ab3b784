//! Process entry points for the tracker binary
//!
//! Utilities for CLI parsing, logging setup, version metadata and task
//! spawning shared by `main.rs` and the app.

pub mod async_runtime;
pub mod cli;
mod metadata;
pub mod run;

pub use cli::{get_env, parse_args};
pub use metadata::{log_version_info, short_version_info};
pub use run::{init_logging, native_main};
