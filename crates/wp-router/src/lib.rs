//! Navigation orchestration: lanes, prefetch reuse, lifecycle hooks, polling and deferred props.

pub mod config;
pub mod deferred;
pub mod events;
pub mod history;
pub mod page_store;
pub mod poll;
pub mod progress;
pub mod router;
pub mod transport;

pub use config::RouterConfig;
pub use events::EventBus;
pub use events::EventOutcome;
pub use events::GlobalEvent;
pub use events::GlobalEventName;
pub use events::Subscription;
pub use history::HistoryStore;
pub use history::InMemoryHistory;
pub use page_store::InMemoryPageStore;
pub use page_store::PageStore;
pub use page_store::PageSwap;
pub use poll::PollHandle;
pub use poll::PollOptions;
pub use poll::PollStatus;
pub use progress::NoProgress;
pub use progress::NoScroll;
pub use progress::ProgressIndicator;
pub use progress::ScrollKeeper;
pub use router::PrefetchDispatch;
pub use router::PrefetchWaiter;
pub use router::Router;
pub use router::VisitDispatch;
pub use router::WaiterKind;
pub use transport::OutboundRequest;
pub use transport::RecordingTransport;
pub use transport::RequestId;
pub use transport::Transport;
