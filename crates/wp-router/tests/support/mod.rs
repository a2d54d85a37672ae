#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use wp_core::ManualClock;
use wp_router::InMemoryPageStore;
use wp_router::ProgressIndicator;
use wp_router::RecordingTransport;
use wp_router::RequestId;
use wp_router::Router;
use wp_router::RouterConfig;
use wp_router::ScrollKeeper;
use wp_visit::Page;
use wp_visit::PendingVisit;
use wp_visit::VisitCallbacks;
use wp_visit::VisitResponse;

pub type TestRouter = Router<RecordingTransport, InMemoryPageStore>;

/// Shared, ordered record of hook invocations.
#[derive(Debug, Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|logged| *logged == entry).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

fn outcome(visit: &PendingVisit) -> &'static str {
    if visit.interrupted() {
        "interrupted"
    } else if visit.cancelled() {
        "cancelled"
    } else if visit.completed() {
        "completed"
    } else {
        "pending"
    }
}

/// Callbacks that append `label:hook` entries to `log`.
pub fn recording_callbacks(log: &Log, label: &str) -> VisitCallbacks {
    let start = (log.clone(), label.to_owned());
    let finish = (log.clone(), label.to_owned());
    let cancel = (log.clone(), label.to_owned());
    let success = (log.clone(), label.to_owned());
    let error = (log.clone(), label.to_owned());
    let prefetching = (log.clone(), label.to_owned());
    let prefetched = (log.clone(), label.to_owned());

    VisitCallbacks::default()
        .on_start(move |_| start.0.push(format!("{}:start", start.1)))
        .on_finish(move |visit| finish.0.push(format!("{}:finish:{}", finish.1, outcome(visit))))
        .on_cancel(move |visit| cancel.0.push(format!("{}:cancel:{}", cancel.1, outcome(visit))))
        .on_success(move |page| success.0.push(format!("{}:success:{}", success.1, page.component)))
        .on_error(move |failure| error.0.push(format!("{}:error:{failure}", error.1)))
        .on_prefetching(move |_| prefetching.0.push(format!("{}:prefetching", prefetching.1)))
        .on_prefetched(move |_, _| prefetched.0.push(format!("{}:prefetched", prefetched.1)))
}

/// Progress indicator writing `progress:*` entries to a log.
#[derive(Debug, Clone)]
pub struct RecordingProgress(pub Log);

impl ProgressIndicator for RecordingProgress {
    fn reveal(&mut self, show_immediately: bool) {
        self.0.push(format!("progress:reveal:{show_immediately}"));
    }

    fn hide(&mut self) {
        self.0.push("progress:hide");
    }
}

/// Scroll keeper writing `scroll:save:<Component>` entries to a log.
#[derive(Debug, Clone)]
pub struct RecordingScroll(pub Log);

impl ScrollKeeper for RecordingScroll {
    fn save(&mut self, page: &Page) {
        self.0.push(format!("scroll:save:{}", page.component));
    }
}

pub fn home_page() -> Page {
    Page::new("Home", "/")
}

pub fn router_with_page(page: Page) -> (TestRouter, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let router = Router::new(
        RouterConfig::default(),
        RecordingTransport::new(),
        InMemoryPageStore::with_page(page),
    );
    let router = match router {
        Ok(router) => router.with_clock(clock.clone()),
        Err(error) => panic!("{error}"),
    };
    (router, clock)
}

pub fn router() -> (TestRouter, Rc<ManualClock>) {
    router_with_page(home_page())
}

pub fn ok(component: &str, url: &str) -> Result<VisitResponse, wp_core::WaypointError> {
    Ok(VisitResponse::ok(Page::new(component, url)))
}

pub fn last_request(router: &TestRouter) -> RequestId {
    match router.transport().last() {
        Some(request) => request.id,
        None => panic!("no request was dispatched"),
    }
}

pub fn component(router: &TestRouter) -> String {
    router
        .current_page()
        .map(|page| page.component.clone())
        .unwrap_or_default()
}
