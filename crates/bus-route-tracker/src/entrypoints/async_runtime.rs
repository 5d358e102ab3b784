//! Async task helpers
//!
//! Thin wrappers over tokio so every background task of the tracker is
//! spawned the same way and shows up in profiling traces.

/// Spawn an async task on the current tokio runtime.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    // Attach a span tagged with the future type so spawned tasks can be told
    // apart in profiling traces. The span is entered on every poll.
    #[cfg(feature = "profiling")]
    {
        use tracing::Instrument;
        let span = tracing::trace_span!(
            "async_runtime::spawn",
            task_type = std::any::type_name::<F>()
        );
        tokio::spawn(future.instrument(span))
    }
    #[cfg(not(feature = "profiling"))]
    {
        tokio::spawn(future)
    }
}

/// Check if we're running inside a tokio runtime context.
pub fn in_runtime_context() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}
