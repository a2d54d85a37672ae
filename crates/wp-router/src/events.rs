//! Global navigation events with subscribe/unsubscribe handles.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::rc::Weak;
use wp_visit::Page;
use wp_visit::PendingVisit;
use wp_visit::RequestProgress;
use wp_visit::VisitFailure;
use wp_visit::VisitResponse;

/// Names handlers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalEventName {
    Before,
    Start,
    Progress,
    Success,
    Error,
    Cancel,
    Finish,
    Navigate,
    Prefetching,
    Prefetched,
    MissingHistoryItem,
}

impl GlobalEventName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancel => "cancel",
            Self::Finish => "finish",
            Self::Navigate => "navigate",
            Self::Prefetching => "prefetching",
            Self::Prefetched => "prefetched",
            Self::MissingHistoryItem => "missingHistoryItem",
        }
    }
}

impl fmt::Display for GlobalEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload borrowed from the router for the duration of dispatch.
#[derive(Debug, Clone, Copy)]
pub enum GlobalEvent<'a> {
    Before(&'a PendingVisit),
    Start(&'a PendingVisit),
    Progress(&'a RequestProgress),
    Success(&'a Page),
    Error(&'a VisitFailure),
    Cancel(&'a PendingVisit),
    Finish(&'a PendingVisit),
    Navigate(&'a Page),
    Prefetching(&'a PendingVisit),
    Prefetched(&'a VisitResponse, &'a PendingVisit),
    MissingHistoryItem,
}

impl GlobalEvent<'_> {
    pub fn name(&self) -> GlobalEventName {
        match self {
            Self::Before(_) => GlobalEventName::Before,
            Self::Start(_) => GlobalEventName::Start,
            Self::Progress(_) => GlobalEventName::Progress,
            Self::Success(_) => GlobalEventName::Success,
            Self::Error(_) => GlobalEventName::Error,
            Self::Cancel(_) => GlobalEventName::Cancel,
            Self::Finish(_) => GlobalEventName::Finish,
            Self::Navigate(_) => GlobalEventName::Navigate,
            Self::Prefetching(_) => GlobalEventName::Prefetching,
            Self::Prefetched(_, _) => GlobalEventName::Prefetched,
            Self::MissingHistoryItem => GlobalEventName::MissingHistoryItem,
        }
    }
}

/// What a handler asks of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Continue,
    /// Only honored for `Before`.
    Veto,
}

impl From<()> for EventOutcome {
    fn from((): ()) -> Self {
        Self::Continue
    }
}

impl From<bool> for EventOutcome {
    fn from(proceed: bool) -> Self {
        if proceed { Self::Continue } else { Self::Veto }
    }
}

type Handler = Rc<dyn Fn(&GlobalEvent<'_>) -> EventOutcome>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, GlobalEventName, Handler)>,
}

/// Subscriber registry shared with outstanding [`Subscription`]s.
#[derive(Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.registry.borrow().handlers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, O>(&self, name: GlobalEventName, handler: F) -> Subscription
    where
        F: Fn(&GlobalEvent<'_>) -> O + 'static,
        O: Into<EventOutcome>,
    {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        let handler: Handler = Rc::new(move |event: &GlobalEvent<'_>| -> EventOutcome {
            handler(event).into()
        });
        registry.handlers.push((id, name, handler));

        Subscription {
            registry: Rc::downgrade(&self.registry),
            id,
        }
    }

    /// Invokes every handler for the event; returns `false` if any handler vetoed.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or unsubscribe.
    pub fn dispatch(&self, event: &GlobalEvent<'_>) -> bool {
        let name = event.name();
        let handlers: Vec<Handler> = self
            .registry
            .borrow()
            .handlers
            .iter()
            .filter(|(_, subscribed, _)| *subscribed == name)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();
        tracing::trace!(event = %name, handlers = handlers.len(), "dispatching global event");

        let mut proceed = true;
        for handler in handlers {
            if handler(event) == EventOutcome::Veto && name == GlobalEventName::Before {
                proceed = false;
            }
        }
        proceed
    }

    pub fn handler_count(&self, name: GlobalEventName) -> usize {
        self.registry
            .borrow()
            .handlers
            .iter()
            .filter(|(_, subscribed, _)| *subscribed == name)
            .count()
    }
}

/// Handle returned by [`EventBus::on`].
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl Subscription {
    /// Removes the handler; returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.borrow_mut();
        let before = registry.handlers.len();
        registry.handlers.retain(|(id, _, _)| *id != self.id);
        registry.handlers.len() != before
    }
}
