// The binary uses the library, not duplicate modules
use bus_route_tracker::entrypoints;

fn main() -> std::process::ExitCode {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match rt.block_on(entrypoints::native_main()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
