//! Normalized visit descriptors.

use crate::callbacks::VisitCallbacks;
use crate::method::VisitMethod;
use crate::payload::QueryStringArrayFormat;
use crate::payload::VisitBody;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Router-assigned identity of one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisitId(pub u64);

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "visit#{}", self.0)
    }
}

/// Terminal outcome recorded on a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Completed,
    Cancelled,
    Interrupted,
}

/// Complete, immutable description of a requested navigation.
///
/// Only the terminal flag changes after construction, and it changes at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingVisit {
    pub url: Url,
    pub method: VisitMethod,
    pub body: VisitBody,
    pub replace: bool,
    pub preserve_scroll: bool,
    pub preserve_state: bool,
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub headers: BTreeMap<String, String>,
    pub error_bag: String,
    pub force_form_data: bool,
    pub query_string_array_format: QueryStringArrayFormat,
    pub is_async: bool,
    pub show_progress: bool,
    pub fresh: bool,
    pub reset: Vec<String>,
    pub preserve_url: bool,
    pub prefetch: bool,
    pub frame: String,
    pub(crate) termination: Option<Termination>,
}

impl PendingVisit {
    pub fn cancelled(&self) -> bool {
        self.termination == Some(Termination::Cancelled)
    }

    pub fn completed(&self) -> bool {
        self.termination == Some(Termination::Completed)
    }

    pub fn interrupted(&self) -> bool {
        self.termination == Some(Termination::Interrupted)
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn is_terminal(&self) -> bool {
        self.termination.is_some()
    }

    /// Partial reloads carry `only` or `except` selectors.
    pub fn is_partial(&self) -> bool {
        !self.only.is_empty() || !self.except.is_empty()
    }

    /// Records the terminal outcome; returns `false` if the visit already ended.
    pub fn terminate(&mut self, outcome: Termination) -> bool {
        if self.termination.is_some() {
            return false;
        }
        self.termination = Some(outcome);
        true
    }
}

/// A pending visit bound to its lifecycle hooks.
#[derive(Debug, Clone)]
pub struct ActiveVisit {
    pub id: VisitId,
    pub visit: PendingVisit,
    pub callbacks: VisitCallbacks,
}

impl ActiveVisit {
    pub fn new(id: VisitId, visit: PendingVisit, callbacks: VisitCallbacks) -> Self {
        Self {
            id,
            visit,
            callbacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Termination;
    use crate::builder::VisitBuilder;
    use crate::options::VisitOptions;

    #[test]
    fn first_terminal_transition_wins() {
        let base = match url::Url::parse("https://app.test/") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let visit = VisitBuilder::new(&base).build("/a", &VisitOptions::default());
        let mut visit = match visit {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert!(!visit.is_terminal());
        assert!(visit.terminate(Termination::Interrupted));
        assert!(!visit.terminate(Termination::Completed));
        assert!(!visit.terminate(Termination::Cancelled));

        assert!(visit.interrupted());
        assert!(!visit.completed());
        assert!(!visit.cancelled());
    }
}
