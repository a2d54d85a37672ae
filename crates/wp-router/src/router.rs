//! Navigation orchestrator.
//!
//! The router is a single-threaded state machine pumped by its host. Public calls start
//! visits and hand requests to the [`Transport`]; the host answers through [`Router::complete`]
//! and [`Router::progress`], and drives time-based work (cancel tokens, prefetch expiry,
//! polls) through [`Router::tick`]. Per-visit failures are delivered to the visit's hooks and
//! never returned as `Err`.

use crate::config::RouterConfig;
use crate::deferred::deferred_reloads;
use crate::events::EventBus;
use crate::events::EventOutcome;
use crate::events::GlobalEvent;
use crate::events::GlobalEventName;
use crate::events::Subscription;
use crate::history::HistoryStore;
use crate::history::InMemoryHistory;
use crate::page_store::PageStore;
use crate::page_store::PageSwap;
use crate::poll::PollHandle;
use crate::poll::PollOptions;
use crate::poll::PollStatus;
use crate::poll::Polls;
use crate::progress::NoProgress;
use crate::progress::NoScroll;
use crate::progress::ProgressIndicator;
use crate::progress::ScrollKeeper;
use crate::transport::OutboundRequest;
use crate::transport::RequestId;
use crate::transport::Transport;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use url::Url;
use wp_core::Clock;
use wp_core::SystemClock;
use wp_core::WaypointError;
use wp_core::WaypointResult;
use wp_prefetch::AddOutcome;
use wp_prefetch::InFlightPrefetch;
use wp_prefetch::PrefetchCache;
use wp_prefetch::PrefetchStats;
use wp_prefetch::PrefetchTicket;
use wp_prefetch::ResolvedPrefetch;
use wp_prefetch::UseOutcome;
use wp_stream::Dispatch;
use wp_stream::RequestStream;
use wp_stream::StreamConfig;
use wp_stream::StreamOperation;
use wp_visit::ActiveVisit;
use wp_visit::CancelToken;
use wp_visit::Page;
use wp_visit::PendingVisit;
use wp_visit::ReloadOptions;
use wp_visit::RequestFingerprint;
use wp_visit::RequestPayload;
use wp_visit::RequestProgress;
use wp_visit::Termination;
use wp_visit::VisitBuilder;
use wp_visit::VisitCallbacks;
use wp_visit::VisitFailure;
use wp_visit::VisitId;
use wp_visit::VisitMethod;
use wp_visit::VisitOptions;
use wp_visit::VisitResponse;
use wp_visit::VisitTarget;

/// How a `visit` call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitDispatch {
    /// A before hook returned `false`; nothing happened.
    Vetoed,
    /// Served synchronously from a resolved prefetch.
    Replayed(VisitId),
    /// Attached to a prefetch still on the network.
    AwaitingPrefetch(VisitId),
    /// A network request was issued (or failed to issue; see the visit's hooks).
    Dispatched(VisitId),
}

impl VisitDispatch {
    pub fn visit_id(self) -> Option<VisitId> {
        match self {
            Self::Vetoed => None,
            Self::Replayed(id) | Self::AwaitingPrefetch(id) | Self::Dispatched(id) => Some(id),
        }
    }
}

/// How a `prefetch` call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchDispatch {
    Vetoed,
    /// A fresh response is already cached; no hooks fire.
    AlreadyCached,
    /// Joined the in-flight prefetch for the same fingerprint.
    Joined(VisitId),
    Dispatched(VisitId),
}

impl PrefetchDispatch {
    pub fn visit_id(self) -> Option<VisitId> {
        match self {
            Self::Vetoed | Self::AlreadyCached => None,
            Self::Joined(id) | Self::Dispatched(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterKind {
    /// A navigation that lands the page when the prefetch resolves.
    Visit,
    /// A prefetch caller; only prefetch hooks fire.
    Prefetch,
}

/// Visit waiting on an in-flight prefetch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchWaiter {
    pub visit: VisitId,
    pub kind: WaiterKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaneKind {
    Sync,
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LaneSlot {
    visit: VisitId,
}

impl StreamOperation for LaneSlot {
    type Key = VisitId;

    fn key(&self) -> VisitId {
        self.visit
    }
}

/// What a lane occupant sends once it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Navigation,
    Prefetch(PrefetchTicket),
}

#[derive(Debug)]
struct VisitRecord {
    active: ActiveVisit,
    lane: Option<LaneKind>,
    purpose: Purpose,
    request: Option<RequestId>,
    waiting_on: Option<PrefetchTicket>,
    cancel_token: Option<CancelToken>,
}

#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    visit: VisitId,
    purpose: Purpose,
}

pub struct Router<T: Transport, P: PageStore> {
    config: RouterConfig,
    base_url: Url,
    transport: T,
    pages: P,
    history: Box<dyn HistoryStore>,
    progress: Box<dyn ProgressIndicator>,
    scroll: Box<dyn ScrollKeeper>,
    clock: Rc<dyn Clock>,
    events: EventBus,
    sync_lane: RequestStream<LaneSlot>,
    async_lane: RequestStream<LaneSlot>,
    prefetches: PrefetchCache<VisitResponse, PrefetchWaiter>,
    visits: BTreeMap<VisitId, VisitRecord>,
    requests: HashMap<RequestId, RequestRecord>,
    polls: Polls,
    page_generation: u64,
    /// Latest-started visit whose full page swap was applied.
    last_landed: VisitId,
    next_visit: u64,
    next_request: u64,
}

impl<T: Transport, P: PageStore> Router<T, P> {
    pub fn new(config: RouterConfig, transport: T, pages: P) -> WaypointResult<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        Ok(Self {
            config,
            base_url,
            transport,
            pages,
            history: Box::new(InMemoryHistory::new()),
            progress: Box::new(NoProgress),
            scroll: Box::new(NoScroll),
            clock: Rc::new(SystemClock),
            events: EventBus::new(),
            sync_lane: RequestStream::new(StreamConfig::synchronous())?,
            async_lane: RequestStream::new(StreamConfig::asynchronous())?,
            prefetches: PrefetchCache::new(),
            visits: BTreeMap::new(),
            requests: HashMap::new(),
            polls: Polls::default(),
            page_generation: 0,
            last_landed: VisitId(0),
            next_visit: 0,
            next_request: 0,
        })
    }

    pub fn with_history(mut self, history: impl HistoryStore + 'static) -> Self {
        self.history = Box::new(history);
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressIndicator + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_scroll(mut self, scroll: impl ScrollKeeper + 'static) -> Self {
        self.scroll = Box::new(scroll);
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn pages(&self) -> &P {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut P {
        &mut self.pages
    }

    /// Page of the router's frame.
    pub fn current_page(&self) -> Option<&Page> {
        self.pages.frame(&self.config.frame)
    }

    /// A visit that has not reached a terminal state yet.
    pub fn pending_visit(&self, id: VisitId) -> Option<&PendingVisit> {
        self.visits.get(&id).map(|record| &record.active.visit)
    }

    /// Visits not yet terminated, including prefetch callers joined to another request.
    pub fn live_visits(&self) -> usize {
        self.visits.len()
    }

    pub fn page_generation(&self) -> u64 {
        self.page_generation
    }

    pub fn prefetch_stats(&self) -> PrefetchStats {
        self.prefetches.stats()
    }

    pub fn on<F, O>(&self, name: GlobalEventName, handler: F) -> Subscription
    where
        F: Fn(&GlobalEvent<'_>) -> O + 'static,
        O: Into<EventOutcome>,
    {
        self.events.on(name, handler)
    }

    /// Announces the initial page and starts loading its deferred props.
    pub fn boot(&mut self) -> WaypointResult<()> {
        let Some(page) = self.current_page().cloned() else {
            return Err(WaypointError::new(
                "router.boot.page_missing",
                format!("frame `{}` has no page to boot from", self.config.frame),
            ));
        };

        tracing::debug!(component = %page.component, url = %page.url, "router booted");
        self.events.dispatch(&GlobalEvent::Navigate(&page));
        self.load_deferred(&page);
        Ok(())
    }

    pub fn visit(
        &mut self,
        target: impl Into<VisitTarget>,
        options: VisitOptions,
    ) -> WaypointResult<VisitDispatch> {
        self.apply_cancel_requests();
        let callbacks = options.callbacks.clone();
        let visit = self.build(target, options)?;
        Ok(self.start_visit(visit, callbacks))
    }

    pub fn get(
        &mut self,
        target: impl Into<VisitTarget>,
        data: RequestPayload,
        options: VisitOptions,
    ) -> WaypointResult<VisitDispatch> {
        self.visit_with(VisitMethod::Get, target, data, options)
    }

    pub fn post(
        &mut self,
        target: impl Into<VisitTarget>,
        data: RequestPayload,
        options: VisitOptions,
    ) -> WaypointResult<VisitDispatch> {
        self.visit_with(VisitMethod::Post, target, data, options)
    }

    pub fn put(
        &mut self,
        target: impl Into<VisitTarget>,
        data: RequestPayload,
        options: VisitOptions,
    ) -> WaypointResult<VisitDispatch> {
        self.visit_with(VisitMethod::Put, target, data, options)
    }

    pub fn patch(
        &mut self,
        target: impl Into<VisitTarget>,
        data: RequestPayload,
        options: VisitOptions,
    ) -> WaypointResult<VisitDispatch> {
        self.visit_with(VisitMethod::Patch, target, data, options)
    }

    pub fn delete(
        &mut self,
        target: impl Into<VisitTarget>,
        data: RequestPayload,
        options: VisitOptions,
    ) -> WaypointResult<VisitDispatch> {
        self.visit_with(VisitMethod::Delete, target, data, options)
    }

    /// Re-visits the current URL asynchronously, preserving scroll and state.
    pub fn reload(&mut self, options: ReloadOptions) -> WaypointResult<VisitDispatch> {
        let Some(page) = self.current_page() else {
            return Err(WaypointError::new(
                "router.reload.page_missing",
                format!("frame `{}` has no page to reload", self.config.frame),
            ));
        };
        let url = page.url.clone();

        let options = options
            .preserve_scroll(true)
            .preserve_state(true)
            .asynchronous(true)
            .header("Cache-Control", "no-cache");
        self.visit(url, options)
    }

    /// Fetches a GET visit ahead of time so a later matching visit can replay it.
    ///
    /// `cache_for` falls back to the configured default TTL.
    pub fn prefetch(
        &mut self,
        target: impl Into<VisitTarget>,
        options: VisitOptions,
        cache_for: Option<Duration>,
    ) -> WaypointResult<PrefetchDispatch> {
        self.apply_cancel_requests();
        let method = options.method.unwrap_or_default();
        if method != VisitMethod::Get {
            return Err(WaypointError::new(
                "router.prefetch.method_not_get",
                format!("only GET visits can be prefetched, got {method}"),
            ));
        }

        let callbacks = options.callbacks.clone();
        let visit = self.build(target, prefetch_options(options))?;
        if !self.allows(&visit, &callbacks) {
            tracing::debug!(url = %visit.url, "prefetch vetoed");
            return Ok(PrefetchDispatch::Vetoed);
        }

        self.progress.hide();
        self.interrupt(LaneKind::Async);

        let id = self.next_visit_id();
        let cache_for = cache_for.unwrap_or_else(|| self.config.default_cache_for());
        let fingerprint = RequestFingerprint::of(&visit);
        let waiter = PrefetchWaiter {
            visit: id,
            kind: WaiterKind::Prefetch,
        };
        let now = self.clock.now();

        match self
            .prefetches
            .add(fingerprint, waiter, cache_for, visit.fresh, now)
        {
            AddOutcome::AlreadyCached => Ok(PrefetchDispatch::AlreadyCached),
            AddOutcome::Joined(ticket) => {
                let record = self.new_record(
                    ActiveVisit::new(id, visit, callbacks),
                    None,
                    Purpose::Navigation,
                    Some(ticket),
                );
                self.fire_prefetching(&record.active);
                self.visits.insert(id, record);
                Ok(PrefetchDispatch::Joined(id))
            }
            AddOutcome::Scheduled(ticket) => {
                let record = self.new_record(
                    ActiveVisit::new(id, visit, callbacks),
                    Some(LaneKind::Async),
                    Purpose::Prefetch(ticket),
                    Some(ticket),
                );
                self.fire_prefetching(&record.active);
                self.enqueue(LaneKind::Async, record);
                Ok(PrefetchDispatch::Dispatched(id))
            }
        }
    }

    /// Cancels the synchronous lane's visit.
    pub fn cancel(&mut self) {
        self.apply_cancel_requests();
        let cancelled = self.sync_lane.cancel_in_flight();
        for slot in cancelled {
            self.cancel_visit(slot.visit);
        }
    }

    /// Cancels every in-flight visit and prefetch.
    pub fn cancel_all(&mut self) {
        self.apply_cancel_requests();
        let mut cancelled = self.sync_lane.cancel_in_flight();
        cancelled.extend(self.async_lane.cancel_in_flight());
        for slot in cancelled {
            self.cancel_visit(slot.visit);
        }
    }

    /// Delivers the answer to a request previously handed to the transport.
    ///
    /// Answers for aborted or unknown requests are ignored.
    pub fn complete(&mut self, request: RequestId, result: Result<VisitResponse, WaypointError>) {
        self.apply_cancel_requests();
        let Some(entry) = self.requests.remove(&request) else {
            tracing::debug!(%request, "answer for unknown or aborted request ignored");
            return;
        };

        match entry.purpose {
            Purpose::Navigation => {
                if let Some(record) = self.visits.remove(&entry.visit) {
                    self.settle(record, result);
                }
            }
            Purpose::Prefetch(ticket) => self.settle_prefetch(ticket, &result),
        }
    }

    pub fn progress(&mut self, request: RequestId, progress: RequestProgress) {
        let Some(entry) = self.requests.get(&request).copied() else {
            return;
        };

        let listeners: Vec<VisitId> = match entry.purpose {
            Purpose::Navigation => vec![entry.visit],
            Purpose::Prefetch(ticket) => self
                .prefetches
                .in_flight(ticket)
                .map(|in_flight| in_flight.waiters().iter().map(|waiter| waiter.visit).collect())
                .unwrap_or_default(),
        };
        for id in listeners {
            if let Some(record) = self.visits.get(&id) {
                record.active.callbacks.fire_progress(&progress);
            }
        }
        self.events.dispatch(&GlobalEvent::Progress(&progress));
    }

    /// Cooperative turn: applies cancel tokens, evicts stale prefetches and fires due polls.
    pub fn tick(&mut self) {
        self.apply_cancel_requests();
        let now = self.clock.now();
        self.prefetches.evict_expired(now);

        for (handle, options) in self.polls.take_due(now) {
            tracing::trace!(poll = %handle, "poll fired");
            if let Err(error) = self.reload(options) {
                tracing::warn!(poll = %handle, %error, "poll reload failed");
            }
        }
    }

    pub fn poll(
        &mut self,
        interval: Duration,
        reload: ReloadOptions,
        options: PollOptions,
    ) -> WaypointResult<PollHandle> {
        let now = self.clock.now();
        self.polls.add(interval, reload, options, now)
    }

    pub fn start_poll(&mut self, handle: PollHandle) -> bool {
        let now = self.clock.now();
        self.polls.start(handle, now)
    }

    pub fn stop_poll(&mut self, handle: PollHandle) -> bool {
        self.polls.stop(handle)
    }

    pub fn pause_poll(&mut self, handle: PollHandle) -> bool {
        let now = self.clock.now();
        self.polls.pause(handle, now)
    }

    pub fn resume_poll(&mut self, handle: PollHandle) -> bool {
        let now = self.clock.now();
        self.polls.resume(handle, now)
    }

    pub fn poll_status(&self, handle: PollHandle) -> Option<PollStatus> {
        self.polls.status(handle)
    }

    /// Page teardown: drops polls that are not keep-alive.
    pub fn teardown(&mut self) -> usize {
        let removed = self.polls.teardown();
        tracing::debug!(removed, "polls torn down");
        removed
    }

    pub fn get_cached(
        &self,
        target: impl Into<VisitTarget>,
        options: VisitOptions,
    ) -> WaypointResult<Option<&ResolvedPrefetch<VisitResponse>>> {
        let fingerprint = self.prefetch_fingerprint(target, options)?;
        Ok(self.prefetches.find_cached(&fingerprint, self.clock.now()))
    }

    pub fn get_prefetching(
        &self,
        target: impl Into<VisitTarget>,
        options: VisitOptions,
    ) -> WaypointResult<Option<&InFlightPrefetch<PrefetchWaiter>>> {
        let fingerprint = self.prefetch_fingerprint(target, options)?;
        Ok(self.prefetches.find_in_flight(&fingerprint))
    }

    /// Forgets the prefetch for this target; a request already on the network keeps running.
    pub fn flush(
        &mut self,
        target: impl Into<VisitTarget>,
        options: VisitOptions,
    ) -> WaypointResult<bool> {
        let fingerprint = self.prefetch_fingerprint(target, options)?;
        let removed = self.prefetches.remove(&fingerprint);
        tracing::debug!(%fingerprint, removed, "prefetch flushed");
        Ok(removed)
    }

    pub fn flush_all(&mut self) {
        self.prefetches.remove_all();
        tracing::debug!("prefetch cache flushed");
    }

    pub fn remember(&mut self, key: &str, value: Value) {
        self.history.remember(&self.config.frame, key, value);
    }

    pub fn restore(&self, key: &str) -> Option<Value> {
        self.history.restore(&self.config.frame, key)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn decrypt_history(&self) -> WaypointResult<Page> {
        self.history.decrypt()
    }

    /// Recovers from a history entry that no longer exists by reloading the current URL.
    pub fn handle_missing_history_item(&mut self) -> WaypointResult<VisitDispatch> {
        self.events.dispatch(&GlobalEvent::MissingHistoryItem);
        let Some(page) = self.current_page() else {
            return Err(WaypointError::new(
                "router.history.page_missing",
                format!("frame `{}` has no page to recover", self.config.frame),
            ));
        };
        let url = page.url.clone();

        self.visit(
            url,
            VisitOptions::new()
                .preserve_state(true)
                .preserve_scroll(true)
                .replace(true),
        )
    }

    fn visit_with(
        &mut self,
        method: VisitMethod,
        target: impl Into<VisitTarget>,
        data: RequestPayload,
        mut options: VisitOptions,
    ) -> WaypointResult<VisitDispatch> {
        options.method = Some(method);
        options.data = data;
        if method.is_mutating() && options.preserve_state.is_none() {
            options.preserve_state = Some(true);
        }
        self.visit(target, options)
    }

    fn build(&self, target: impl Into<VisitTarget>, mut options: VisitOptions) -> WaypointResult<PendingVisit> {
        if options.is_async == Some(true) && options.show_progress.is_none() {
            options.show_progress = Some(false);
        }
        if options.frame.is_none() {
            options.frame = Some(self.config.frame.clone());
        }
        VisitBuilder::new(&self.resolution_base()).build(target, &options)
    }

    fn prefetch_fingerprint(
        &self,
        target: impl Into<VisitTarget>,
        options: VisitOptions,
    ) -> WaypointResult<RequestFingerprint> {
        let visit = self.build(target, prefetch_options(options))?;
        Ok(RequestFingerprint::of(&visit))
    }

    fn resolution_base(&self) -> Url {
        self.current_page()
            .and_then(|page| self.base_url.join(&page.url).ok())
            .unwrap_or_else(|| self.base_url.clone())
    }

    fn allows(&self, visit: &PendingVisit, callbacks: &VisitCallbacks) -> bool {
        callbacks.fire_before(visit) && self.events.dispatch(&GlobalEvent::Before(visit))
    }

    fn start_visit(&mut self, visit: PendingVisit, callbacks: VisitCallbacks) -> VisitDispatch {
        if !self.allows(&visit, &callbacks) {
            tracing::debug!(url = %visit.url, "visit vetoed");
            return VisitDispatch::Vetoed;
        }

        let id = self.next_visit_id();
        let lane = if visit.is_async {
            LaneKind::Async
        } else {
            LaneKind::Sync
        };
        self.interrupt(lane);

        if !self.pages.is_cleared() && !visit.preserve_url {
            if let Some(page) = self.pages.frame(&visit.frame) {
                self.scroll.save(page);
            }
        }

        let fingerprint = RequestFingerprint::of(&visit);
        let active = ActiveVisit::new(id, visit, callbacks);
        if !active.visit.fresh {
            let waiter = PrefetchWaiter {
                visit: id,
                kind: WaiterKind::Visit,
            };
            let now = self.clock.now();
            match self.prefetches.use_entry(&fingerprint, waiter, now) {
                UseOutcome::Replay(response) => return self.replay(active, response),
                UseOutcome::Waiting(ticket) => {
                    tracing::debug!(visit = %id, %ticket, "visit waiting on in-flight prefetch");
                    if active.visit.show_progress {
                        self.progress.reveal(true);
                    }
                    let record = self.new_record(active, Some(lane), Purpose::Navigation, Some(ticket));
                    self.fire_start(&record.active);
                    self.fire_prefetching(&record.active);
                    self.enqueue(lane, record);
                    return VisitDispatch::AwaitingPrefetch(id);
                }
                UseOutcome::Miss => {}
            }
        }

        if active.visit.show_progress {
            self.progress.reveal(true);
        }
        let record = self.new_record(active, Some(lane), Purpose::Navigation, None);
        self.fire_start(&record.active);
        self.enqueue(lane, record);
        VisitDispatch::Dispatched(id)
    }

    fn replay(&mut self, active: ActiveVisit, response: VisitResponse) -> VisitDispatch {
        let id = active.id;
        tracing::debug!(visit = %id, "replaying prefetched response");
        if active.visit.show_progress {
            self.progress.reveal(false);
        }

        let record = VisitRecord {
            active,
            lane: None,
            purpose: Purpose::Navigation,
            request: None,
            waiting_on: None,
            cancel_token: None,
        };
        self.fire_start(&record.active);
        self.fire_prefetched(&record.active, &response);
        self.settle(record, Ok(response));
        VisitDispatch::Replayed(id)
    }

    fn new_record(
        &self,
        active: ActiveVisit,
        lane: Option<LaneKind>,
        purpose: Purpose,
        waiting_on: Option<PrefetchTicket>,
    ) -> VisitRecord {
        let token = CancelToken::new();
        active.callbacks.fire_cancel_token(token.clone());

        VisitRecord {
            active,
            lane,
            purpose,
            request: None,
            waiting_on,
            cancel_token: Some(token),
        }
    }

    fn enqueue(&mut self, lane: LaneKind, record: VisitRecord) {
        let id = record.active.id;
        self.visits.insert(id, record);
        let dispatch = self.lane_mut(lane).send(LaneSlot { visit: id });
        match dispatch {
            Dispatch::Started => self.transmit(id),
            Dispatch::Queued => tracing::debug!(visit = %id, ?lane, "visit queued"),
        }
    }

    /// Hands the visit's request to the transport, unless it is served by a prefetch.
    fn transmit(&mut self, id: VisitId) {
        let Some(record) = self.visits.get(&id) else {
            return;
        };
        if record.purpose == Purpose::Navigation && record.waiting_on.is_some() {
            return;
        }

        let purpose = record.purpose;
        self.next_request += 1;
        let request_id = RequestId(self.next_request);
        let component = self
            .pages
            .frame(&record.active.visit.frame)
            .map(|page| page.component.as_str());
        let outbound = OutboundRequest::for_visit(
            request_id,
            &record.active.visit,
            component,
            self.config.asset_version.as_deref(),
        );
        let lane = record.lane;

        match outbound.and_then(|request| self.transport.dispatch(request)) {
            Ok(()) => {
                if let Some(record) = self.visits.get_mut(&id) {
                    record.request = Some(request_id);
                }
                self.requests.insert(
                    request_id,
                    RequestRecord {
                        visit: id,
                        purpose,
                    },
                );
                tracing::debug!(visit = %id, request = %request_id, ?lane, "request dispatched");
            }
            Err(error) => {
                tracing::warn!(visit = %id, %error, "request could not be dispatched");
                match purpose {
                    Purpose::Navigation => {
                        if let Some(record) = self.visits.remove(&id) {
                            self.settle(record, Err(error));
                        }
                    }
                    Purpose::Prefetch(ticket) => self.settle_prefetch(ticket, &Err(error)),
                }
            }
        }
    }

    /// Lands (or fails) a navigation and finishes it.
    fn settle(&mut self, mut record: VisitRecord, result: Result<VisitResponse, WaypointError>) {
        record.request = None;
        record.waiting_on = None;

        let landed = match result {
            Ok(response) => self.land(&record, response),
            Err(error) => {
                self.fail(&record.active, VisitFailure::Transport(error));
                None
            }
        };
        self.finalize(record, Termination::Completed);

        if let Some(page) = landed {
            self.load_deferred(&page);
        }
    }

    /// Applies a response to the page store. Returns the page when a full navigation landed
    /// in the router's frame.
    fn land(&mut self, record: &VisitRecord, response: VisitResponse) -> Option<Page> {
        let visit = &record.active.visit;
        if !response.is_success() {
            self.fail(
                &record.active,
                VisitFailure::Status {
                    status: response.status,
                },
            );
            return None;
        }
        let mut page = response.page?;

        // Visit ids follow start order.
        if visit.is_async && record.active.id < self.last_landed {
            tracing::debug!(
                visit = %record.active.id,
                landed = %self.last_landed,
                partial = visit.is_partial(),
                "stale async response discarded"
            );
            return None;
        }

        let mut partial = false;
        if let Some(current) = self.pages.frame(&visit.frame) {
            if visit.is_partial() && current.component == page.component {
                let mut merged = current.clone();
                merged.merge_props(std::mem::take(&mut page.props));
                if page.version.is_some() {
                    merged.version = page.version.take();
                }
                page = merged;
                partial = true;
            } else if visit.preserve_url {
                page.url = current.url.clone();
            }
        }

        let swap = PageSwap {
            frame: visit.frame.clone(),
            page: page.clone(),
            replace: visit.replace,
            preserve_state: visit.preserve_state,
            preserve_scroll: visit.preserve_scroll,
        };
        if let Err(error) = self.pages.swap(swap) {
            self.fail(&record.active, VisitFailure::Swap(error));
            return None;
        }
        self.page_generation += 1;
        if !partial {
            self.last_landed = self.last_landed.max(record.active.id);
        }
        tracing::debug!(
            visit = %record.active.id,
            component = %page.component,
            partial,
            generation = self.page_generation,
            "page swapped"
        );

        if !partial {
            self.events.dispatch(&GlobalEvent::Navigate(&page));
        }

        match page.validation_errors(&visit.error_bag) {
            Some(errors) => self.fail(
                &record.active,
                VisitFailure::Validation {
                    errors: errors.clone(),
                },
            ),
            None => {
                record.active.callbacks.fire_success(&page);
                self.events.dispatch(&GlobalEvent::Success(&page));
            }
        }

        (!partial && visit.frame == self.config.frame).then_some(page)
    }

    fn settle_prefetch(&mut self, ticket: PrefetchTicket, result: &Result<VisitResponse, WaypointError>) {
        let now = self.clock.now();
        let release = match result {
            Ok(response) if response.is_success() => self.prefetches.resolve(ticket, response, now),
            _ => self.prefetches.abandon(ticket),
        };
        let Some(release) = release else {
            return;
        };
        tracing::debug!(
            %ticket,
            fingerprint = %release.fingerprint,
            waiters = release.waiters.len(),
            stored = release.stored,
            "prefetch settled"
        );

        for waiter in release.waiters {
            let Some(mut record) = self.visits.remove(&waiter.visit) else {
                continue;
            };
            record.request = None;
            record.waiting_on = None;

            match (result, waiter.kind) {
                (Ok(response), kind) if response.is_success() => {
                    self.fire_prefetched(&record.active, response);
                    match kind {
                        WaiterKind::Visit => self.settle(record, Ok(response.clone())),
                        WaiterKind::Prefetch => self.finalize(record, Termination::Completed),
                    }
                }
                (_, WaiterKind::Visit) => self.settle(record, result.clone()),
                (_, WaiterKind::Prefetch) => {
                    self.fail(&record.active, failure_of(result));
                    self.finalize(record, Termination::Completed);
                }
            }
        }
    }

    fn interrupt(&mut self, lane: LaneKind) {
        let interrupted = self.lane_mut(lane).interrupt_in_flight();
        for slot in interrupted {
            if let Some(record) = self.visits.remove(&slot.visit) {
                tracing::debug!(visit = %slot.visit, ?lane, "visit interrupted");
                self.abort_visit(record, Termination::Interrupted);
            }
        }
    }

    fn cancel_visit(&mut self, id: VisitId) {
        let Some(record) = self.visits.remove(&id) else {
            return;
        };
        tracing::debug!(visit = %id, "visit cancelled");

        let owned_prefetch = match record.purpose {
            Purpose::Prefetch(ticket) if record.request.is_some() => Some(ticket),
            _ => None,
        };
        self.abort_visit(record, Termination::Cancelled);

        if let Some(ticket) = owned_prefetch {
            if let Some(release) = self.prefetches.abandon(ticket) {
                for waiter in release.waiters {
                    if let Some(record) = self.visits.remove(&waiter.visit) {
                        self.abort_visit(record, Termination::Cancelled);
                    }
                }
            }
        }
    }

    fn abort_visit(&mut self, mut record: VisitRecord, outcome: Termination) {
        let id = record.active.id;
        if let Some(ticket) = record.waiting_on.take() {
            self.prefetches.detach(ticket, |waiter| waiter.visit == id);
        }
        if let Some(request) = record.request.take() {
            self.requests.remove(&request);
            self.transport.abort(request);
            tracing::debug!(visit = %id, %request, "request aborted");
        }
        self.finalize(record, outcome);
    }

    /// Releases the lane slot and fires the terminal hooks exactly once.
    fn finalize(&mut self, mut record: VisitRecord, outcome: Termination) {
        let id = record.active.id;
        if let Some(lane) = record.lane {
            let completion = self.lane_mut(lane).complete(id);
            for promoted in completion.promoted {
                self.transmit(promoted);
            }
        }

        if !record.active.visit.terminate(outcome) {
            return;
        }

        let active = &record.active;
        if outcome != Termination::Completed {
            active.callbacks.fire_cancel(&active.visit);
            self.events.dispatch(&GlobalEvent::Cancel(&active.visit));
        }
        if active.visit.show_progress {
            self.progress.hide();
        }
        active.callbacks.fire_finish(&active.visit);
        self.events.dispatch(&GlobalEvent::Finish(&active.visit));
        tracing::debug!(visit = %id, ?outcome, "visit finished");
    }

    fn apply_cancel_requests(&mut self) {
        let requested: Vec<VisitId> = self
            .visits
            .iter()
            .filter(|(_, record)| {
                record
                    .cancel_token
                    .as_ref()
                    .is_some_and(CancelToken::is_cancelled)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in requested {
            self.cancel_visit(id);
        }
    }

    fn load_deferred(&mut self, page: &Page) {
        for (group, options) in deferred_reloads(page) {
            match self.reload(options) {
                Ok(dispatch) => tracing::trace!(%group, ?dispatch, "deferred props requested"),
                Err(error) => tracing::warn!(%group, %error, "deferred props reload failed"),
            }
        }
    }

    fn fail(&self, active: &ActiveVisit, failure: VisitFailure) {
        tracing::debug!(visit = %active.id, %failure, "visit failed");
        active.callbacks.fire_error(&failure);
        self.events.dispatch(&GlobalEvent::Error(&failure));
    }

    fn fire_start(&self, active: &ActiveVisit) {
        active.callbacks.fire_start(&active.visit);
        self.events.dispatch(&GlobalEvent::Start(&active.visit));
    }

    fn fire_prefetching(&self, active: &ActiveVisit) {
        active.callbacks.fire_prefetching(&active.visit);
        self.events.dispatch(&GlobalEvent::Prefetching(&active.visit));
    }

    fn fire_prefetched(&self, active: &ActiveVisit, response: &VisitResponse) {
        active.callbacks.fire_prefetched(response, &active.visit);
        self.events
            .dispatch(&GlobalEvent::Prefetched(response, &active.visit));
    }

    fn lane_mut(&mut self, lane: LaneKind) -> &mut RequestStream<LaneSlot> {
        match lane {
            LaneKind::Sync => &mut self.sync_lane,
            LaneKind::Async => &mut self.async_lane,
        }
    }

    fn next_visit_id(&mut self) -> VisitId {
        self.next_visit += 1;
        VisitId(self.next_visit)
    }
}

fn prefetch_options(options: VisitOptions) -> VisitOptions {
    let mut options = options.asynchronous(true).show_progress(false);
    options.prefetch = Some(true);
    options
}

fn failure_of(result: &Result<VisitResponse, WaypointError>) -> VisitFailure {
    match result {
        Ok(response) => VisitFailure::Status {
            status: response.status,
        },
        Err(error) => VisitFailure::Transport(error.clone()),
    }
}
