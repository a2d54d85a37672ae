mod support;

use pretty_assertions::assert_eq;
use std::time::Duration;
use support::Log;
use support::RecordingProgress;
use support::component;
use support::last_request;
use support::ok;
use support::recording_callbacks;
use support::router;
use wp_prefetch::PrefetchStats;
use wp_router::PrefetchDispatch;
use wp_router::VisitDispatch;
use wp_visit::VisitMethod;
use wp_visit::VisitOptions;
use wp_visit::VisitResponse;

const FIVE_SECONDS: Duration = Duration::from_millis(5000);

fn prefetch_options(log: &Log, label: &str) -> VisitOptions {
    VisitOptions::new().callbacks(recording_callbacks(log, label))
}

#[test]
fn prefetched_response_is_replayed_without_network() {
    let (mut router, clock) = router();
    let log = Log::default();

    let dispatch = router.prefetch("/x", prefetch_options(&log, "p"), Some(FIVE_SECONDS));
    assert!(matches!(dispatch, Ok(PrefetchDispatch::Dispatched(_))));
    let request = match router.transport().last() {
        Some(request) => request.clone(),
        None => panic!("prefetch was not dispatched"),
    };
    assert_eq!(request.header("Purpose"), Some("prefetch"));

    router.complete(request.id, ok("X", "/x"));
    assert_eq!(
        log.entries(),
        vec!["p:prefetching", "p:prefetched", "p:finish:completed"]
    );
    assert_eq!(component(&router), "Home");

    log.clear();
    clock.advance(Duration::from_millis(4000));
    let dispatch = router.visit("/x", prefetch_options(&log, "v"));

    assert!(matches!(dispatch, Ok(VisitDispatch::Replayed(_))));
    assert_eq!(router.transport().dispatched().len(), 1);
    assert_eq!(
        log.entries(),
        vec!["v:start", "v:prefetched", "v:success:X", "v:finish:completed"]
    );
    assert_eq!(component(&router), "X");
}

#[test]
fn expired_prefetch_triggers_a_fresh_fetch() {
    let (mut router, clock) = router();
    let log = Log::default();

    assert!(router.prefetch("/x", VisitOptions::new(), Some(FIVE_SECONDS)).is_ok());
    router.complete(last_request(&router), ok("X", "/x"));

    clock.advance(FIVE_SECONDS);
    assert!(matches!(router.get_cached("/x", VisitOptions::new()), Ok(Some(_))));

    clock.advance(Duration::from_millis(1));
    assert!(matches!(router.get_cached("/x", VisitOptions::new()), Ok(None)));
    let dispatch = router.visit("/x", prefetch_options(&log, "v"));

    assert!(matches!(dispatch, Ok(VisitDispatch::Dispatched(_))));
    assert_eq!(router.transport().dispatched().len(), 2);
}

#[test]
fn concurrent_prefetches_share_one_request() {
    let (mut router, _clock) = router();
    let log = Log::default();

    let first = router.prefetch("/x", prefetch_options(&log, "p"), None);
    let second = router.prefetch("/x#details", prefetch_options(&log, "q"), None);

    assert!(matches!(first, Ok(PrefetchDispatch::Dispatched(_))));
    assert!(matches!(second, Ok(PrefetchDispatch::Joined(_))));
    assert_eq!(router.transport().dispatched().len(), 1);
    let waiters = router
        .get_prefetching("/x", VisitOptions::new())
        .ok()
        .flatten()
        .map(|in_flight| in_flight.waiters().len());
    assert_eq!(waiters, Some(2));

    router.complete(last_request(&router), ok("X", "/x"));

    assert_eq!(log.count("p:prefetched"), 1);
    assert_eq!(log.count("q:prefetched"), 1);
    assert_eq!(log.count("p:finish:completed"), 1);
    assert_eq!(log.count("q:finish:completed"), 1);
}

#[test]
fn prefetching_a_put_fails_before_any_hook() {
    let (mut router, _clock) = router();
    let log = Log::default();

    let error = router
        .prefetch("/x", prefetch_options(&log, "p").method(VisitMethod::Put), None)
        .err();

    assert_eq!(error.map(|error| error.code), Some("router.prefetch.method_not_get"));
    assert!(log.entries().is_empty());
    assert!(router.transport().dispatched().is_empty());
    assert_eq!(router.prefetch_stats(), PrefetchStats::default());
}

#[test]
fn visit_waits_on_an_in_flight_prefetch() {
    let (router, _clock) = router();
    let log = Log::default();
    let mut router = router.with_progress(RecordingProgress(log.clone()));

    assert!(router.prefetch("/x", VisitOptions::new(), None).is_ok());
    let dispatch = router.visit("/x", prefetch_options(&log, "v"));

    assert!(matches!(dispatch, Ok(VisitDispatch::AwaitingPrefetch(_))));
    assert_eq!(router.transport().dispatched().len(), 1);
    assert_eq!(
        log.entries(),
        vec![
            "progress:hide",
            "progress:reveal:true",
            "v:start",
            "v:prefetching",
        ]
    );

    log.clear();
    router.complete(last_request(&router), ok("X", "/x"));

    assert_eq!(
        log.entries(),
        vec![
            "v:prefetched",
            "v:success:X",
            "progress:hide",
            "v:finish:completed",
        ]
    );
    assert_eq!(component(&router), "X");
}

#[test]
fn newer_visit_interrupts_a_visit_waiting_on_a_prefetch() {
    let (mut router, _clock) = router();
    let log = Log::default();

    assert!(router.prefetch("/x", prefetch_options(&log, "p"), None).is_ok());
    let prefetch_request = last_request(&router);
    assert!(router.visit("/x", prefetch_options(&log, "v")).is_ok());
    assert!(router.visit("/y", prefetch_options(&log, "y")).is_ok());

    assert_eq!(log.count("v:finish:interrupted"), 1);

    router.complete(prefetch_request, ok("X", "/x"));

    assert_eq!(log.count("v:prefetched"), 0);
    assert_eq!(log.count("p:finish:completed"), 1);
    assert_eq!(component(&router), "Home");
    assert!(matches!(router.get_cached("/x", VisitOptions::new()), Ok(Some(_))));
}

#[test]
fn flush_forgets_only_the_target() {
    let (mut router, _clock) = router();

    assert!(router.prefetch("/a", VisitOptions::new(), None).is_ok());
    router.complete(last_request(&router), ok("A", "/a"));
    assert!(router.prefetch("/b", VisitOptions::new(), None).is_ok());
    router.complete(last_request(&router), ok("B", "/b"));

    assert_eq!(router.flush("/a", VisitOptions::new()), Ok(true));

    assert!(matches!(router.get_cached("/a", VisitOptions::new()), Ok(None)));
    assert!(matches!(router.get_cached("/b", VisitOptions::new()), Ok(Some(_))));
}

#[test]
fn flush_all_leaves_dispatched_requests_running() {
    let (mut router, _clock) = router();
    let log = Log::default();

    assert!(router.prefetch("/a", VisitOptions::new(), None).is_ok());
    router.complete(last_request(&router), ok("A", "/a"));
    assert!(router.prefetch("/b", prefetch_options(&log, "b"), None).is_ok());
    let in_flight = last_request(&router);

    router.flush_all();

    assert!(matches!(router.get_cached("/a", VisitOptions::new()), Ok(None)));
    assert!(matches!(router.get_prefetching("/b", VisitOptions::new()), Ok(None)));
    assert!(router.transport().aborted().is_empty());

    router.complete(in_flight, ok("B", "/b"));

    assert_eq!(log.count("b:prefetched"), 1);
    assert!(matches!(router.get_cached("/b", VisitOptions::new()), Ok(None)));
}

#[test]
fn failed_prefetch_is_not_cached() {
    let (mut router, _clock) = router();
    let log = Log::default();

    assert!(router.prefetch("/x", prefetch_options(&log, "p"), None).is_ok());
    router.complete(last_request(&router), Ok(VisitResponse::status(503)));

    assert_eq!(
        log.entries(),
        vec![
            "p:prefetching",
            "p:error:server responded with status 503",
            "p:finish:completed",
        ]
    );
    assert!(matches!(router.get_cached("/x", VisitOptions::new()), Ok(None)));
    assert!(matches!(
        router.visit("/x", VisitOptions::new()),
        Ok(VisitDispatch::Dispatched(_))
    ));
}

#[test]
fn fresh_supersedes_the_cached_entry() {
    let (mut router, _clock) = router();

    assert!(router.prefetch("/x", VisitOptions::new(), None).is_ok());
    router.complete(last_request(&router), ok("X", "/x"));

    assert_eq!(
        router.prefetch("/x", VisitOptions::new(), None),
        Ok(PrefetchDispatch::AlreadyCached)
    );
    assert!(matches!(
        router.prefetch("/x", VisitOptions::new().fresh(true), None),
        Ok(PrefetchDispatch::Dispatched(_))
    ));
    assert_eq!(router.transport().dispatched().len(), 2);
}

#[test]
fn fresh_visit_bypasses_the_cache() {
    let (mut router, _clock) = router();

    assert!(router.prefetch("/x", VisitOptions::new(), None).is_ok());
    router.complete(last_request(&router), ok("X", "/x"));

    assert!(matches!(
        router.visit("/x", VisitOptions::new().fresh(true)),
        Ok(VisitDispatch::Dispatched(_))
    ));
}

#[test]
fn cancel_all_cancels_every_prefetch_waiter() {
    let (mut router, _clock) = router();
    let log = Log::default();

    assert!(router.prefetch("/x", prefetch_options(&log, "p"), None).is_ok());
    let request = last_request(&router);
    assert!(router.prefetch("/x", prefetch_options(&log, "q"), None).is_ok());
    assert!(router.visit("/x", prefetch_options(&log, "v")).is_ok());

    router.cancel_all();

    assert_eq!(log.count("p:finish:cancelled"), 1);
    assert_eq!(log.count("q:finish:cancelled"), 1);
    assert_eq!(log.count("v:finish:cancelled"), 1);
    assert_eq!(router.transport().aborted(), &[request]);
    assert!(matches!(router.get_prefetching("/x", VisitOptions::new()), Ok(None)));
    assert_eq!(router.live_visits(), 0);
}

#[test]
fn zero_cache_for_is_single_use() {
    let (mut router, _clock) = router();

    assert!(router.prefetch("/once", VisitOptions::new(), Some(Duration::ZERO)).is_ok());
    router.complete(last_request(&router), ok("Once", "/once"));

    assert!(matches!(
        router.visit("/once", VisitOptions::new()),
        Ok(VisitDispatch::Replayed(_))
    ));
    assert!(matches!(
        router.visit("/once", VisitOptions::new()),
        Ok(VisitDispatch::Dispatched(_))
    ));
}

#[test]
fn tick_evicts_expired_entries() {
    let (mut router, clock) = router();

    assert!(router.prefetch("/x", VisitOptions::new(), Some(Duration::from_secs(1))).is_ok());
    router.complete(last_request(&router), ok("X", "/x"));
    assert_eq!(router.prefetch_stats().resolved, 1);

    clock.advance(Duration::from_millis(1001));
    router.tick();

    assert_eq!(router.prefetch_stats().resolved, 0);
}
