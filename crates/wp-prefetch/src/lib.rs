//! Single-flight, TTL-bounded cache of prefetch results.
//!
//! Entries are keyed by [`RequestFingerprint`]. An in-flight entry collects the waiters
//! that asked for the same request while it was on the network; resolving it hands those
//! waiters back together with the promotion to a resolved entry, in one call.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use std::time::Instant;
use wp_visit::RequestFingerprint;

/// Identity of one in-flight prefetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrefetchTicket(pub u64);

impl fmt::Display for PrefetchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prefetch#{}", self.0)
    }
}

/// Completed prefetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrefetch<R> {
    pub fingerprint: RequestFingerprint,
    pub response: R,
    pub created_at: Instant,
    /// Zero means single use: the first replay evicts the entry.
    pub cache_for: Duration,
}

impl<R> ResolvedPrefetch<R> {
    pub fn is_single_use(&self) -> bool {
        self.cache_for.is_zero()
    }

    pub fn expires_at(&self) -> Instant {
        self.created_at + self.cache_for
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.is_single_use() || now <= self.expires_at()
    }
}

/// Prefetch still on the network.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightPrefetch<W> {
    pub fingerprint: RequestFingerprint,
    pub ticket: PrefetchTicket,
    pub started_at: Instant,
    pub cache_for: Duration,
    waiters: Vec<W>,
}

impl<W> InFlightPrefetch<W> {
    pub fn waiters(&self) -> &[W] {
        &self.waiters
    }
}

/// Result of `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new network operation must be issued for this ticket.
    Scheduled(PrefetchTicket),
    /// The waiter joined the request already in flight.
    Joined(PrefetchTicket),
    /// A fresh resolved entry exists; nothing to do.
    AlreadyCached,
}

/// Result of `use_entry`.
#[derive(Debug, Clone, PartialEq)]
pub enum UseOutcome<R> {
    Replay(R),
    Waiting(PrefetchTicket),
    Miss,
}

/// Waiters released when an in-flight entry ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Release<W> {
    pub fingerprint: RequestFingerprint,
    pub waiters: Vec<W>,
    /// Whether the response was stored for later reuse.
    pub stored: bool,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrefetchStats {
    pub resolved: usize,
    pub in_flight: usize,
    pub waiters: usize,
}

/// Prefetch cache holding responses `R` and waiters `W`.
#[derive(Debug)]
pub struct PrefetchCache<R, W> {
    resolved: HashMap<RequestFingerprint, ResolvedPrefetch<R>>,
    in_flight: HashMap<PrefetchTicket, InFlightPrefetch<W>>,
    /// Fingerprints whose in-flight request may still be joined or stored.
    index: HashMap<RequestFingerprint, PrefetchTicket>,
    next_ticket: u64,
}

impl<R, W> Default for PrefetchCache<R, W> {
    fn default() -> Self {
        Self {
            resolved: HashMap::new(),
            in_flight: HashMap::new(),
            index: HashMap::new(),
            next_ticket: 1,
        }
    }
}

impl<R: Clone, W> PrefetchCache<R, W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `fingerprint`, issuing at most one request per fingerprint.
    ///
    /// A fresh resolved entry short-circuits unless `fresh` is set, in which case it is
    /// superseded by a new request.
    pub fn add(
        &mut self,
        fingerprint: RequestFingerprint,
        waiter: W,
        cache_for: Duration,
        fresh: bool,
        now: Instant,
    ) -> AddOutcome {
        if let Some(ticket) = self.index.get(&fingerprint).copied() {
            if let Some(entry) = self.in_flight.get_mut(&ticket) {
                entry.waiters.push(waiter);
                tracing::debug!(%fingerprint, %ticket, "joined in-flight prefetch");
                return AddOutcome::Joined(ticket);
            }
        }

        let cached = self
            .resolved
            .get(&fingerprint)
            .is_some_and(|entry| entry.is_fresh(now));
        if cached && !fresh {
            tracing::debug!(%fingerprint, "prefetch already cached");
            return AddOutcome::AlreadyCached;
        }

        self.resolved.remove(&fingerprint);
        let ticket = PrefetchTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);
        self.index.insert(fingerprint.clone(), ticket);
        self.in_flight.insert(
            ticket,
            InFlightPrefetch {
                fingerprint: fingerprint.clone(),
                ticket,
                started_at: now,
                cache_for,
                waiters: vec![waiter],
            },
        );
        tracing::debug!(%fingerprint, %ticket, ?cache_for, "prefetch scheduled");
        AddOutcome::Scheduled(ticket)
    }

    /// Resolved, unexpired entry for `fingerprint`. In-flight entries are not consulted.
    pub fn find_cached(&self, fingerprint: &RequestFingerprint, now: Instant) -> Option<&ResolvedPrefetch<R>> {
        self.resolved
            .get(fingerprint)
            .filter(|entry| entry.is_fresh(now))
    }

    pub fn find_in_flight(&self, fingerprint: &RequestFingerprint) -> Option<&InFlightPrefetch<W>> {
        let ticket = self.index.get(fingerprint)?;
        self.in_flight.get(ticket)
    }

    pub fn in_flight(&self, ticket: PrefetchTicket) -> Option<&InFlightPrefetch<W>> {
        self.in_flight.get(&ticket)
    }

    /// Replays a resolved entry or queues `waiter` on the in-flight one.
    pub fn use_entry(
        &mut self,
        fingerprint: &RequestFingerprint,
        waiter: W,
        now: Instant,
    ) -> UseOutcome<R> {
        if let Some(entry) = self.find_cached(fingerprint, now) {
            let response = entry.response.clone();
            if entry.is_single_use() {
                self.resolved.remove(fingerprint);
                tracing::debug!(%fingerprint, "single-use prefetch consumed");
            }
            return UseOutcome::Replay(response);
        }

        if let Some(ticket) = self.index.get(fingerprint).copied() {
            if let Some(entry) = self.in_flight.get_mut(&ticket) {
                entry.waiters.push(waiter);
                return UseOutcome::Waiting(ticket);
            }
        }

        UseOutcome::Miss
    }

    /// Promotes the in-flight entry to a resolved one and releases its waiters.
    ///
    /// Entries flushed while in flight still release their waiters but are not stored.
    pub fn resolve(&mut self, ticket: PrefetchTicket, response: &R, now: Instant) -> Option<Release<W>> {
        let entry = self.in_flight.remove(&ticket)?;
        let stored = self.unindex(&entry.fingerprint, ticket);
        if stored {
            self.resolved.insert(
                entry.fingerprint.clone(),
                ResolvedPrefetch {
                    fingerprint: entry.fingerprint.clone(),
                    response: response.clone(),
                    created_at: now,
                    cache_for: entry.cache_for,
                },
            );
        }
        tracing::debug!(fingerprint = %entry.fingerprint, %ticket, stored, "prefetch resolved");

        Some(Release {
            fingerprint: entry.fingerprint,
            waiters: entry.waiters,
            stored,
        })
    }

    /// Drops a failed or cancelled in-flight entry without caching anything.
    pub fn abandon(&mut self, ticket: PrefetchTicket) -> Option<Release<W>> {
        let entry = self.in_flight.remove(&ticket)?;
        self.unindex(&entry.fingerprint, ticket);
        tracing::debug!(fingerprint = %entry.fingerprint, %ticket, "prefetch abandoned");

        Some(Release {
            fingerprint: entry.fingerprint,
            waiters: entry.waiters,
            stored: false,
        })
    }

    /// Removes the first waiter matching `predicate` from an in-flight entry.
    pub fn detach(&mut self, ticket: PrefetchTicket, predicate: impl Fn(&W) -> bool) -> Option<W> {
        let entry = self.in_flight.get_mut(&ticket)?;
        let index = entry.waiters.iter().position(predicate)?;
        Some(entry.waiters.remove(index))
    }

    /// Forgets `fingerprint`; an already dispatched request keeps running but is not stored.
    pub fn remove(&mut self, fingerprint: &RequestFingerprint) -> bool {
        let resolved = self.resolved.remove(fingerprint).is_some();
        let in_flight = self.index.remove(fingerprint).is_some();
        resolved || in_flight
    }

    pub fn remove_all(&mut self) {
        self.resolved.clear();
        self.index.clear();
    }

    /// Evicts resolved entries whose TTL elapsed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.resolved.len();
        self.resolved.retain(|_, entry| entry.is_fresh(now));
        let evicted = before - self.resolved.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired prefetch entries evicted");
        }
        evicted
    }

    pub fn stats(&self) -> PrefetchStats {
        PrefetchStats {
            resolved: self.resolved.len(),
            in_flight: self.in_flight.len(),
            waiters: self.in_flight.values().map(|entry| entry.waiters.len()).sum(),
        }
    }

    fn unindex(&mut self, fingerprint: &RequestFingerprint, ticket: PrefetchTicket) -> bool {
        if self.index.get(fingerprint) == Some(&ticket) {
            self.index.remove(fingerprint);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::AddOutcome;
    use super::PrefetchCache;
    use super::PrefetchStats;
    use super::UseOutcome;
    use proptest::prelude::*;
    use std::time::Duration;
    use wp_core::Clock;
    use wp_core::ManualClock;
    use wp_visit::RequestFingerprint;
    use wp_visit::VisitBody;
    use wp_visit::VisitMethod;
    use wp_visit::VisitTarget;
    use wp_visit::target::parse_base;
    use wp_visit::target::resolve_target;

    fn fingerprint(path: &str) -> RequestFingerprint {
        let url = parse_base("https://app.test/")
            .and_then(|base| resolve_target(&VisitTarget::from(path), &base));
        match url {
            Ok(url) => RequestFingerprint::from_parts(&url, VisitMethod::Get, &VisitBody::Empty, &[], &[]),
            Err(error) => panic!("{error}"),
        }
    }

    const TTL: Duration = Duration::from_secs(30);

    #[test]
    fn second_add_joins_in_flight_request() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();

        let first = cache.add(fingerprint("/users"), 1, TTL, false, clock.now());
        let second = cache.add(fingerprint("/users"), 2, TTL, false, clock.now());

        let AddOutcome::Scheduled(ticket) = first else {
            panic!("expected scheduled, got {first:?}");
        };
        assert_eq!(second, AddOutcome::Joined(ticket));
        assert_eq!(
            cache.stats(),
            PrefetchStats {
                resolved: 0,
                in_flight: 1,
                waiters: 2,
            }
        );
    }

    #[test]
    fn resolve_releases_waiters_and_stores_response() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(ticket) = cache.add(fingerprint("/users"), 1, TTL, false, clock.now())
        else {
            panic!("expected scheduled");
        };

        let release = cache.resolve(ticket, &"users page", clock.now());

        let Some(release) = release else {
            panic!("ticket should be in flight");
        };
        assert_eq!(release.waiters, vec![1]);
        assert!(release.stored);
        assert!(cache.find_cached(&fingerprint("/users"), clock.now()).is_some());
        assert!(cache.find_in_flight(&fingerprint("/users")).is_none());
        assert_eq!(
            cache.add(fingerprint("/users"), 3, TTL, false, clock.now()),
            AddOutcome::AlreadyCached
        );
    }

    #[test]
    fn entry_expires_after_cache_for() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(ticket) = cache.add(fingerprint("/users"), 1, TTL, false, clock.now())
        else {
            panic!("expected scheduled");
        };
        cache.resolve(ticket, &"users page", clock.now());

        clock.advance(TTL);
        assert!(cache.find_cached(&fingerprint("/users"), clock.now()).is_some());

        clock.advance(Duration::from_millis(1));
        assert!(cache.find_cached(&fingerprint("/users"), clock.now()).is_none());
        assert_eq!(cache.evict_expired(clock.now()), 1);
        assert_eq!(cache.stats().resolved, 0);
    }

    #[test]
    fn zero_cache_for_is_consumed_by_first_use() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(ticket) =
            cache.add(fingerprint("/once"), 1, Duration::ZERO, false, clock.now())
        else {
            panic!("expected scheduled");
        };
        cache.resolve(ticket, &"once", clock.now());
        clock.advance(Duration::from_secs(60));

        assert_eq!(
            cache.use_entry(&fingerprint("/once"), 2, clock.now()),
            UseOutcome::Replay("once")
        );
        assert_eq!(
            cache.use_entry(&fingerprint("/once"), 3, clock.now()),
            UseOutcome::Miss
        );
    }

    #[test]
    fn use_entry_waits_on_in_flight_request() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(ticket) = cache.add(fingerprint("/users"), 1, TTL, false, clock.now())
        else {
            panic!("expected scheduled");
        };

        assert_eq!(
            cache.use_entry(&fingerprint("/users"), 7, clock.now()),
            UseOutcome::Waiting(ticket)
        );
        assert_eq!(cache.detach(ticket, |waiter| *waiter == 7), Some(7));
        assert_eq!(cache.detach(ticket, |waiter| *waiter == 7), None);
    }

    #[test]
    fn fresh_add_supersedes_cached_entry() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(first) = cache.add(fingerprint("/users"), 1, TTL, false, clock.now())
        else {
            panic!("expected scheduled");
        };
        cache.resolve(first, &"old", clock.now());

        let outcome = cache.add(fingerprint("/users"), 2, TTL, true, clock.now());

        assert!(matches!(outcome, AddOutcome::Scheduled(ticket) if ticket != first));
        assert!(cache.find_cached(&fingerprint("/users"), clock.now()).is_none());
    }

    #[test]
    fn abandoned_request_is_not_cached() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(ticket) = cache.add(fingerprint("/users"), 1, TTL, false, clock.now())
        else {
            panic!("expected scheduled");
        };
        cache.add(fingerprint("/users"), 2, TTL, false, clock.now());

        let release = cache.abandon(ticket);

        assert_eq!(release.map(|release| release.waiters), Some(vec![1, 2]));
        assert_eq!(cache.stats(), PrefetchStats::default());
        assert_eq!(
            cache.use_entry(&fingerprint("/users"), 3, clock.now()),
            UseOutcome::Miss
        );
    }

    #[test]
    fn removed_in_flight_entry_releases_waiters_without_storing() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(ticket) = cache.add(fingerprint("/users"), 1, TTL, false, clock.now())
        else {
            panic!("expected scheduled");
        };

        assert!(cache.remove(&fingerprint("/users")));
        assert!(cache.find_in_flight(&fingerprint("/users")).is_none());

        let Some(release) = cache.resolve(ticket, &"late", clock.now()) else {
            panic!("detached request should still resolve");
        };
        assert_eq!(release.waiters, vec![1]);
        assert!(!release.stored);
        assert!(cache.find_cached(&fingerprint("/users"), clock.now()).is_none());
    }

    #[test]
    fn remove_all_clears_every_lookup() {
        let clock = ManualClock::new();
        let mut cache: PrefetchCache<&str, u32> = PrefetchCache::new();
        let AddOutcome::Scheduled(ticket) = cache.add(fingerprint("/a"), 1, TTL, false, clock.now())
        else {
            panic!("expected scheduled");
        };
        cache.resolve(ticket, &"a", clock.now());
        cache.add(fingerprint("/b"), 2, TTL, false, clock.now());

        cache.remove_all();

        assert!(cache.find_cached(&fingerprint("/a"), clock.now()).is_none());
        assert!(cache.find_in_flight(&fingerprint("/b")).is_none());
    }

    proptest! {
        #[test]
        fn at_most_one_request_per_fingerprint(paths in proptest::collection::vec(0u8..4, 1..32)) {
            let clock = ManualClock::new();
            let mut cache: PrefetchCache<&str, usize> = PrefetchCache::new();
            let mut scheduled = std::collections::HashSet::new();

            for (waiter, path) in paths.iter().enumerate() {
                let outcome = cache.add(fingerprint(&format!("/p{path}")), waiter, TTL, false, clock.now());
                if let AddOutcome::Scheduled(_) = outcome {
                    prop_assert!(scheduled.insert(*path));
                }
            }

            prop_assert_eq!(cache.stats().in_flight, scheduled.len());
            prop_assert_eq!(cache.stats().waiters, paths.len());
        }
    }
}
