//! Request lanes: concurrency-bounded execution with optional interruption.
//!
//! A lane only tracks which operations occupy it. Removing an operation (interrupt,
//! cancel, completion) hands it back to the caller, which owns the terminal transition
//! and the hooks that go with it.

use std::collections::VecDeque;
use std::fmt;
use wp_core::WaypointError;
use wp_core::WaypointResult;

/// Something a lane can run.
pub trait StreamOperation {
    type Key: Copy + Eq + fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// Lane policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// `None` means unbounded.
    pub max_concurrent: Option<usize>,
    pub interruptible: bool,
}

impl StreamConfig {
    /// Single-slot lane where a new navigation supersedes the previous one.
    pub fn synchronous() -> Self {
        Self {
            max_concurrent: Some(1),
            interruptible: true,
        }
    }

    /// Unbounded lane for background, async and prefetch work.
    pub fn asynchronous() -> Self {
        Self {
            max_concurrent: None,
            interruptible: false,
        }
    }

    pub fn validate(&self) -> WaypointResult<()> {
        if self.max_concurrent == Some(0) {
            return Err(WaypointError::new(
                "stream.max_concurrent_invalid",
                "lane max_concurrent must be greater than zero",
            ));
        }

        Ok(())
    }

    fn is_full(&self, running: usize) -> bool {
        self.max_concurrent.is_some_and(|max| running >= max)
    }
}

/// Observable lane state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneState<K> {
    Idle,
    Running(Vec<K>),
}

/// Result of `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The caller should start the operation now.
    Started,
    /// The lane is full; the operation starts when a slot frees up.
    Queued,
}

/// Result of `complete`.
#[derive(Debug)]
pub struct Completion<T: StreamOperation> {
    pub finished: Option<T>,
    /// Queued operations that now hold a slot and must be started by the caller.
    pub promoted: Vec<T::Key>,
}

/// One execution lane.
#[derive(Debug)]
pub struct RequestStream<T: StreamOperation> {
    config: StreamConfig,
    running: VecDeque<T>,
    queued: VecDeque<T>,
}

impl<T: StreamOperation> RequestStream<T> {
    pub fn new(config: StreamConfig) -> WaypointResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            running: VecDeque::new(),
            queued: VecDeque::new(),
        })
    }

    pub fn config(&self) -> StreamConfig {
        self.config
    }

    pub fn send(&mut self, operation: T) -> Dispatch {
        if self.config.is_full(self.running.len()) {
            tracing::debug!(operation = ?operation.key(), "lane full, operation queued");
            self.queued.push_back(operation);
            return Dispatch::Queued;
        }

        self.running.push_back(operation);
        Dispatch::Started
    }

    /// Removes the oldest running operation when the lane is interruptible and full.
    ///
    /// Non-interruptible lanes never give anything up here.
    pub fn interrupt_in_flight(&mut self) -> Vec<T> {
        if !self.config.interruptible || !self.config.is_full(self.running.len()) {
            return Vec::new();
        }

        let interrupted: Vec<T> = self.running.pop_front().into_iter().collect();
        for operation in &interrupted {
            tracing::debug!(operation = ?operation.key(), "lane operation interrupted");
        }
        interrupted
    }

    /// Removes every running and queued operation regardless of policy.
    pub fn cancel_in_flight(&mut self) -> Vec<T> {
        let cancelled: Vec<T> = self.running.drain(..).chain(self.queued.drain(..)).collect();
        if !cancelled.is_empty() {
            tracing::debug!(count = cancelled.len(), "lane operations cancelled");
        }
        cancelled
    }

    /// Releases the operation identified by `key` and promotes queued work into free slots.
    pub fn complete(&mut self, key: T::Key) -> Completion<T> {
        let finished =
            take_by_key(&mut self.running, key).or_else(|| take_by_key(&mut self.queued, key));

        let mut promoted = Vec::new();
        while !self.config.is_full(self.running.len()) {
            let Some(next) = self.queued.pop_front() else {
                break;
            };
            tracing::trace!(operation = ?next.key(), "queued operation promoted");
            promoted.push(next.key());
            self.running.push_back(next);
        }

        Completion { finished, promoted }
    }

    pub fn get(&self, key: T::Key) -> Option<&T> {
        self.running
            .iter()
            .chain(self.queued.iter())
            .find(|operation| operation.key() == key)
    }

    pub fn contains(&self, key: T::Key) -> bool {
        self.running
            .iter()
            .chain(self.queued.iter())
            .any(|operation| operation.key() == key)
    }

    pub fn running(&self) -> impl Iterator<Item = &T> {
        self.running.iter()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.queued.is_empty()
    }

    pub fn state(&self) -> LaneState<T::Key> {
        if self.running.is_empty() {
            return LaneState::Idle;
        }
        LaneState::Running(self.running.iter().map(StreamOperation::key).collect())
    }
}

fn take_by_key<T: StreamOperation>(queue: &mut VecDeque<T>, key: T::Key) -> Option<T> {
    let index = queue.iter().position(|operation| operation.key() == key)?;
    queue.remove(index)
}
