//! Server lifecycle events and listeners.

use std::fmt;

/// A server state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Configured,
    Starting,
    Started { listeners: usize },
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Configured => f.write_str("configured"),
            LifecycleEvent::Starting => f.write_str("starting"),
            LifecycleEvent::Started { .. } => f.write_str("started"),
            LifecycleEvent::Stopping => f.write_str("stopping"),
            LifecycleEvent::Stopped => f.write_str("stopped"),
            LifecycleEvent::Failed => f.write_str("failed"),
        }
    }
}

/// Observer attached to the server.
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}
