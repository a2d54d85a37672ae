//! Per-visit lifecycle hooks.
//!
//! Every hook is stored as a shared closure that defaults to a no-op, so call sites never
//! branch on whether a caller supplied it and a callback record can be cloned into poll
//! templates and deferred reloads.

use crate::page::Page;
use crate::page::VisitResponse;
use crate::pending::PendingVisit;
use serde_json::Value;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use wp_core::WaypointError;

/// Why a visit ended without a usable page.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisitFailure {
    #[error("validation failed for {} field(s)", errors.len())]
    Validation {
        errors: serde_json::Map<String, Value>,
    },
    #[error("server responded with status {status}")]
    Status { status: u16 },
    #[error("transport failed: {0}")]
    Transport(WaypointError),
    #[error("page swap failed: {0}")]
    Swap(WaypointError),
}

/// Upload/download progress reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl RequestProgress {
    pub fn percentage(&self) -> Option<u8> {
        let total = self.total.filter(|total| *total > 0)?;
        let percent = self.loaded.min(total).saturating_mul(100) / total;
        u8::try_from(percent).ok()
    }
}

/// Handle given to `on_cancel_token`; cancelling it aborts the visit on the next router turn.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.requested.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.get()
    }
}

type VisitHook = Rc<dyn Fn(&PendingVisit)>;

/// Fixed record of lifecycle hooks for one visit.
#[derive(Clone)]
pub struct VisitCallbacks {
    on_cancel_token: Rc<dyn Fn(CancelToken)>,
    on_before: Rc<dyn Fn(&PendingVisit) -> bool>,
    on_start: VisitHook,
    on_progress: Rc<dyn Fn(&RequestProgress)>,
    on_finish: VisitHook,
    on_cancel: VisitHook,
    on_success: Rc<dyn Fn(&Page)>,
    on_error: Rc<dyn Fn(&VisitFailure)>,
    on_prefetched: Rc<dyn Fn(&VisitResponse, &PendingVisit)>,
    on_prefetching: VisitHook,
}

impl Default for VisitCallbacks {
    fn default() -> Self {
        Self {
            on_cancel_token: Rc::new(|_| {}),
            on_before: Rc::new(|_| true),
            on_start: Rc::new(|_| {}),
            on_progress: Rc::new(|_| {}),
            on_finish: Rc::new(|_| {}),
            on_cancel: Rc::new(|_| {}),
            on_success: Rc::new(|_| {}),
            on_error: Rc::new(|_| {}),
            on_prefetched: Rc::new(|_, _| {}),
            on_prefetching: Rc::new(|_| {}),
        }
    }
}

impl fmt::Debug for VisitCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitCallbacks").finish_non_exhaustive()
    }
}

impl VisitCallbacks {
    pub fn on_cancel_token(mut self, hook: impl Fn(CancelToken) + 'static) -> Self {
        self.on_cancel_token = Rc::new(hook);
        self
    }

    /// Returning `false` abandons the visit before anything else happens.
    pub fn on_before(mut self, hook: impl Fn(&PendingVisit) -> bool + 'static) -> Self {
        self.on_before = Rc::new(hook);
        self
    }

    pub fn on_start(mut self, hook: impl Fn(&PendingVisit) + 'static) -> Self {
        self.on_start = Rc::new(hook);
        self
    }

    pub fn on_progress(mut self, hook: impl Fn(&RequestProgress) + 'static) -> Self {
        self.on_progress = Rc::new(hook);
        self
    }

    pub fn on_finish(mut self, hook: impl Fn(&PendingVisit) + 'static) -> Self {
        self.on_finish = Rc::new(hook);
        self
    }

    pub fn on_cancel(mut self, hook: impl Fn(&PendingVisit) + 'static) -> Self {
        self.on_cancel = Rc::new(hook);
        self
    }

    pub fn on_success(mut self, hook: impl Fn(&Page) + 'static) -> Self {
        self.on_success = Rc::new(hook);
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&VisitFailure) + 'static) -> Self {
        self.on_error = Rc::new(hook);
        self
    }

    pub fn on_prefetched(
        mut self,
        hook: impl Fn(&VisitResponse, &PendingVisit) + 'static,
    ) -> Self {
        self.on_prefetched = Rc::new(hook);
        self
    }

    pub fn on_prefetching(mut self, hook: impl Fn(&PendingVisit) + 'static) -> Self {
        self.on_prefetching = Rc::new(hook);
        self
    }

    pub fn fire_cancel_token(&self, token: CancelToken) {
        (self.on_cancel_token)(token);
    }

    pub fn fire_before(&self, visit: &PendingVisit) -> bool {
        (self.on_before)(visit)
    }

    pub fn fire_start(&self, visit: &PendingVisit) {
        (self.on_start)(visit);
    }

    pub fn fire_progress(&self, progress: &RequestProgress) {
        (self.on_progress)(progress);
    }

    pub fn fire_finish(&self, visit: &PendingVisit) {
        (self.on_finish)(visit);
    }

    pub fn fire_cancel(&self, visit: &PendingVisit) {
        (self.on_cancel)(visit);
    }

    pub fn fire_success(&self, page: &Page) {
        (self.on_success)(page);
    }

    pub fn fire_error(&self, failure: &VisitFailure) {
        (self.on_error)(failure);
    }

    pub fn fire_prefetched(&self, response: &VisitResponse, visit: &PendingVisit) {
        (self.on_prefetched)(response, visit);
    }

    pub fn fire_prefetching(&self, visit: &PendingVisit) {
        (self.on_prefetching)(visit);
    }
}
