//! JSON scenarios replayed against a router.

use crate::scripted::ScriptedTransport;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use wp_core::ManualClock;
use wp_core::WaypointError;
use wp_core::WaypointResult;
use wp_router::GlobalEvent;
use wp_router::GlobalEventName;
use wp_router::InMemoryPageStore;
use wp_router::PollOptions;
use wp_router::Router;
use wp_router::RouterConfig;
use wp_visit::Page;
use wp_visit::VisitMethod;
use wp_visit::VisitOptions;
use wp_visit::VisitResponse;

const OBSERVED_EVENTS: [GlobalEventName; 10] = [
    GlobalEventName::Start,
    GlobalEventName::Success,
    GlobalEventName::Error,
    GlobalEventName::Cancel,
    GlobalEventName::Finish,
    GlobalEventName::Navigate,
    GlobalEventName::Prefetching,
    GlobalEventName::Prefetched,
    GlobalEventName::MissingHistoryItem,
    GlobalEventName::Progress,
];

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: RouterConfig,
    pub page: Page,
    #[serde(default)]
    pub routes: BTreeMap<String, VisitResponse>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Visit(VisitStep),
    Prefetch(VisitStep),
    Reload {
        #[serde(default)]
        only: Vec<String>,
    },
    Poll {
        interval_ms: u64,
    },
    Cancel,
    CancelAll,
    FlushAll,
    AdvanceMs(u64),
    Tick,
    /// Answers every pending request from the route table.
    Deliver,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisitStep {
    pub url: String,
    #[serde(default)]
    pub method: VisitMethod,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub only: Vec<String>,
    #[serde(default)]
    pub cache_for_ms: Option<u64>,
}

impl VisitStep {
    fn options(&self) -> VisitOptions {
        let mut options = VisitOptions::new()
            .method(self.method)
            .asynchronous(self.is_async);
        if !self.only.is_empty() {
            options = options.only(self.only.iter().cloned());
        }
        options
    }
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub page: Option<Page>,
    pub events: Vec<String>,
    pub requests: usize,
}

impl Scenario {
    pub fn from_json(input: &str) -> WaypointResult<Self> {
        let scenario: Self = serde_json::from_str(input).map_err(|error| {
            WaypointError::new(
                "shell.scenario_invalid",
                format!("failed to parse scenario: {error}"),
            )
        })?;
        scenario.config.validate()?;
        Ok(scenario)
    }
}

pub fn run(scenario: Scenario) -> WaypointResult<Report> {
    let clock = Rc::new(ManualClock::new());
    let pages = InMemoryPageStore::with_page(scenario.page);
    let mut router = Router::new(
        scenario.config,
        ScriptedTransport::new(scenario.routes),
        pages,
    )?
    .with_clock(clock.clone());

    let events: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let subscriptions: Vec<_> = OBSERVED_EVENTS
        .into_iter()
        .map(|name| {
            let events = Rc::clone(&events);
            router.on(name, move |event| events.borrow_mut().push(describe(event)))
        })
        .collect();

    router.boot()?;
    for (index, step) in scenario.steps.into_iter().enumerate() {
        tracing::debug!(step = index, ?step, "running step");
        apply(&mut router, &clock, step)?;
    }

    for subscription in subscriptions {
        subscription.unsubscribe();
    }

    let requests = router.transport().dispatched();
    let page = router.current_page().cloned();
    let events = events.borrow().clone();
    Ok(Report {
        page,
        events,
        requests,
    })
}

fn apply(
    router: &mut Router<ScriptedTransport, InMemoryPageStore>,
    clock: &ManualClock,
    step: Step,
) -> WaypointResult<()> {
    match step {
        Step::Visit(visit) => {
            let dispatch = router.visit(visit.url.as_str(), visit.options())?;
            tracing::info!(url = %visit.url, ?dispatch, "visit");
        }
        Step::Prefetch(visit) => {
            let cache_for = visit.cache_for_ms.map(Duration::from_millis);
            let dispatch = router.prefetch(visit.url.as_str(), visit.options(), cache_for)?;
            tracing::info!(url = %visit.url, ?dispatch, "prefetch");
        }
        Step::Reload { only } => {
            let mut options = VisitOptions::new();
            if !only.is_empty() {
                options = options.only(only);
            }
            router.reload(options)?;
        }
        Step::Poll { interval_ms } => {
            let handle = router.poll(
                Duration::from_millis(interval_ms),
                VisitOptions::new(),
                PollOptions::default(),
            )?;
            tracing::info!(poll = %handle, interval_ms, "poll registered");
        }
        Step::Cancel => router.cancel(),
        Step::CancelAll => router.cancel_all(),
        Step::FlushAll => router.flush_all(),
        Step::AdvanceMs(ms) => {
            clock.advance(Duration::from_millis(ms));
            router.tick();
        }
        Step::Tick => router.tick(),
        Step::Deliver => loop {
            let answers = router.transport_mut().take_answers();
            if answers.is_empty() {
                break;
            }
            for (request, response) in answers {
                router.complete(request, Ok(response));
            }
        },
    }
    Ok(())
}

fn describe(event: &GlobalEvent<'_>) -> String {
    let name = event.name();
    match event {
        GlobalEvent::Start(visit)
        | GlobalEvent::Cancel(visit)
        | GlobalEvent::Finish(visit)
        | GlobalEvent::Prefetching(visit) => format!("{name} {}", visit.url.path()),
        GlobalEvent::Prefetched(_, visit) => format!("{name} {}", visit.url.path()),
        GlobalEvent::Success(page) | GlobalEvent::Navigate(page) => {
            format!("{name} {}", page.component)
        }
        GlobalEvent::Error(failure) => format!("{name} {failure}"),
        GlobalEvent::Progress(progress) => format!("{name} {}", progress.loaded),
        GlobalEvent::Before(_) | GlobalEvent::MissingHistoryItem => name.to_string(),
    }
}
