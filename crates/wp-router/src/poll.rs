//! Interval reloads with pause/resume that keep the schedule.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use std::time::Instant;
use wp_core::WaypointError;
use wp_core::WaypointResult;
use wp_visit::ReloadOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollHandle(pub u64);

impl fmt::Display for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub auto_start: bool,
    /// Survive `Router::teardown`.
    pub keep_alive: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            keep_alive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Running { due: Instant },
    Paused { remaining: Duration },
    Stopped,
}

#[derive(Debug, Clone)]
struct PollEntry {
    interval: Duration,
    reload: ReloadOptions,
    keep_alive: bool,
    status: PollStatus,
}

/// Registry of polls, driven by `Router::tick`.
#[derive(Debug, Default)]
pub(crate) struct Polls {
    entries: BTreeMap<PollHandle, PollEntry>,
    next_handle: u64,
}

impl Polls {
    pub(crate) fn add(
        &mut self,
        interval: Duration,
        reload: ReloadOptions,
        options: PollOptions,
        now: Instant,
    ) -> WaypointResult<PollHandle> {
        if interval.is_zero() {
            return Err(WaypointError::new(
                "router.poll.interval_invalid",
                "poll interval must be greater than zero",
            ));
        }

        self.next_handle += 1;
        let handle = PollHandle(self.next_handle);
        let status = if options.auto_start {
            PollStatus::Running {
                due: now + interval,
            }
        } else {
            PollStatus::Stopped
        };
        self.entries.insert(
            handle,
            PollEntry {
                interval,
                reload,
                keep_alive: options.keep_alive,
                status,
            },
        );
        tracing::debug!(poll = %handle, ?interval, auto_start = options.auto_start, "poll registered");
        Ok(handle)
    }

    /// (Re)starts with a full interval.
    pub(crate) fn start(&mut self, handle: PollHandle, now: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        entry.status = PollStatus::Running {
            due: now + entry.interval,
        };
        true
    }

    pub(crate) fn stop(&mut self, handle: PollHandle) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        entry.status = PollStatus::Stopped;
        true
    }

    pub(crate) fn pause(&mut self, handle: PollHandle, now: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        let PollStatus::Running { due } = entry.status else {
            return false;
        };
        entry.status = PollStatus::Paused {
            remaining: due.saturating_duration_since(now),
        };
        true
    }

    pub(crate) fn resume(&mut self, handle: PollHandle, now: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        let PollStatus::Paused { remaining } = entry.status else {
            return false;
        };
        entry.status = PollStatus::Running {
            due: now + remaining,
        };
        true
    }

    pub(crate) fn status(&self, handle: PollHandle) -> Option<PollStatus> {
        self.entries.get(&handle).map(|entry| entry.status)
    }

    /// Reload options of every poll due at `now`, each re-armed one interval from `now`.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<(PollHandle, ReloadOptions)> {
        let mut due_polls = Vec::new();
        for (handle, entry) in &mut self.entries {
            let PollStatus::Running { due } = entry.status else {
                continue;
            };
            if due > now {
                continue;
            }
            entry.status = PollStatus::Running {
                due: now + entry.interval,
            };
            due_polls.push((*handle, entry.reload.clone()));
        }
        due_polls
    }

    /// Drops every poll not marked keep-alive.
    pub(crate) fn teardown(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.keep_alive);
        before - self.entries.len()
    }
}
