//! Shared primitives used across Waypoint crates.

pub mod clock;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;

/// Result alias used across the workspace.
pub type WaypointResult<T> = Result<T, WaypointError>;

/// Top-level error type carrying a stable dotted code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct WaypointError {
    pub code: &'static str,
    pub message: String,
}

impl WaypointError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
