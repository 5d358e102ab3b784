/// Log version info for the running binary.
pub fn log_version_info() {
    tracing::info!("{}", short_version_info());
    tracing::info!(
        "Build profile: {}",
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    );
}

pub fn short_version_info() -> String {
    format!(
        "{} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
