//! History collaborator: frame-scoped key/value persistence and page snapshots.

use serde_json::Value;
use std::collections::BTreeMap;
use wp_core::WaypointError;
use wp_core::WaypointResult;
use wp_visit::Page;

pub trait HistoryStore {
    fn remember(&mut self, frame: &str, key: &str, value: Value);
    fn restore(&self, frame: &str, key: &str) -> Option<Value>;
    fn clear(&mut self);
    /// Page snapshot of the current history entry.
    fn decrypt(&self) -> WaypointResult<Page>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    frames: BTreeMap<String, BTreeMap<String, Value>>,
    snapshot: Option<Page>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&mut self, page: Page) {
        self.snapshot = Some(page);
    }
}

impl HistoryStore for InMemoryHistory {
    fn remember(&mut self, frame: &str, key: &str, value: Value) {
        self.frames
            .entry(frame.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
    }

    fn restore(&self, frame: &str, key: &str) -> Option<Value> {
        self.frames.get(frame)?.get(key).cloned()
    }

    fn clear(&mut self) {
        self.frames.clear();
        self.snapshot = None;
    }

    fn decrypt(&self) -> WaypointResult<Page> {
        self.snapshot.clone().ok_or_else(|| {
            WaypointError::new(
                "history.snapshot_missing",
                "no page snapshot is stored in history",
            )
        })
    }
}
