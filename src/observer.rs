//! Progress reporting for pipeline stages.
//!
//! Components report progress through an injected observer rather than a
//! process-wide sink, so callers can route events to a logger, a progress
//! bar, or a test recorder.

/// Receives stage/message progress events from pipeline components.
///
/// Implementations must be safe to share across the worker pool.
pub trait Observer: Send + Sync {
    /// Called with a short stage tag and a human-readable message.
    fn event(&self, stage: &str, message: &str);
}

/// Observer that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn event(&self, _stage: &str, _message: &str) {}
}

/// Observer that forwards events to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn event(&self, stage: &str, message: &str) {
        log::info!("[{stage}] {message}");
    }
}
