//! Lifecycle notifications for whoever owns the sessions

use crate::protocol::SourceInfo;

/// Receives session lifecycle events
///
/// Called outside the session lock, so implementations may query the
/// session again.
pub trait SessionObserver: Send + Sync {
    /// Session created, or updated with new source info
    fn on_initialized(&self, _info: &SourceInfo) {}

    fn on_closed(&self, _info: &SourceInfo) {}
}

/// Logs lifecycle events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_initialized(&self, info: &SourceInfo) {
        tracing::debug!("Source initialized: {}", info);
    }

    fn on_closed(&self, info: &SourceInfo) {
        tracing::debug!("Source closed: {}", info);
    }
}
