//! End-to-end engine scenarios against fake sessions and checkers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_test::assert_ok;

use openseat::{
    BrowserSession, CacheLayer, CacheStatus, CancelFlag, Checker, CheckerRegistry, Config,
    EventSink, MemorySink, MemoryStore, NullSink, ProbeEvent, ProbePage, ProbeResult, ProbeStatus,
    Query, RawQuery, RunState, SearchEngine, SessionFactory, Target,
};

// ========== Fakes ==========

#[derive(Default)]
struct BrowserCounters {
    launches: AtomicUsize,
    pages_created: AtomicUsize,
    pages_open: AtomicUsize,
}

struct FakeFactory {
    counters: Arc<BrowserCounters>,
    fail_launch: bool,
    fail_pages: bool,
}

impl FakeFactory {
    fn new(counters: Arc<BrowserCounters>) -> Self {
        Self {
            counters,
            fail_launch: false,
            fail_pages: false,
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        if self.fail_launch {
            anyhow::bail!("chromium binary not found");
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            counters: self.counters.clone(),
            fail_pages: self.fail_pages,
        }))
    }
}

struct FakeSession {
    counters: Arc<BrowserCounters>,
    fail_pages: bool,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> anyhow::Result<Box<dyn ProbePage>> {
        if self.fail_pages {
            anyhow::bail!("browser process exited");
        }
        self.counters.pages_created.fetch_add(1, Ordering::SeqCst);
        self.counters.pages_open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            counters: self.counters.clone(),
        }))
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct FakePage {
    counters: Arc<BrowserCounters>,
}

#[async_trait]
impl ProbePage for FakePage {
    async fn navigate(&self, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn body_text(&self) -> anyhow::Result<String> {
        Ok(String::new())
    }
    async fn eval(&self, _js: &str) -> anyhow::Result<JsonValue> {
        Ok(JsonValue::Null)
    }
    async fn reset(&self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn close(&self) -> anyhow::Result<()> {
        self.counters.pages_open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Available,
    Unavailable,
    Fail,
    Hang,
}

struct ScriptedChecker {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Checker for ScriptedChecker {
    async fn check(
        &self,
        _page: &dyn ProbePage,
        target: &Target,
        _query: &Query,
    ) -> anyhow::Result<ProbeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Available => Ok(ProbeResult::available(
                target,
                format!("https://book.example/{}", target.id),
            )),
            Behavior::Unavailable => Ok(ProbeResult::unavailable(target, target.url.clone())),
            Behavior::Fail => anyhow::bail!("widget never rendered"),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ProbeResult::unavailable(target, None))
            }
        }
    }
}

struct FailingSink {
    sent: usize,
}

#[async_trait]
impl EventSink for FailingSink {
    async fn send(&mut self, _event: &ProbeEvent) -> Result<(), openseat::error::StreamError> {
        self.sent += 1;
        if self.sent > 1 {
            return Err(openseat::error::StreamError::Write {
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client gone"),
            });
        }
        Ok(())
    }
}

// ========== Builders ==========

fn target(id: &str, platform: &str) -> Target {
    Target {
        id: id.into(),
        name: format!("Restaurant {id}"),
        platform: platform.into(),
        url: Some(format!("https://example.com/{id}")),
        slug: None,
    }
}

fn query() -> RawQuery {
    RawQuery {
        date: Some("2025-09-27".into()),
        party_size: Some("2".into()),
        time: Some("19:00".into()),
    }
}

fn config(workers: usize) -> Config {
    Config {
        worker_count: workers,
        page_capacity: 4,
        probe_timeout_secs: 30,
        cache_ttl_secs: 300,
        ..Config::default()
    }
}

fn registry_with(behaviors: &[(&str, Behavior)], calls: &Arc<AtomicUsize>) -> CheckerRegistry {
    let mut registry = CheckerRegistry::new();
    for (platform, behavior) in behaviors {
        registry.register(
            *platform,
            Arc::new(ScriptedChecker {
                behavior: *behavior,
                calls: calls.clone(),
            }),
        );
    }
    registry
}

// ========== Scenarios ==========

/// 5 targets, K=2: one synchronous failure, one hang (timeout), three
/// available. The aggregate accounts for every target exactly once and no
/// page leaks past the run.
#[tokio::test(start_paused = true)]
async fn mixed_outcomes_account_for_every_target() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = registry_with(
        &[
            ("alpha", Behavior::Fail),
            ("bravo", Behavior::Hang),
            ("charlie", Behavior::Available),
        ],
        &calls,
    );
    let targets = vec![
        target("a", "alpha"),
        target("b", "bravo"),
        target("c", "charlie"),
        target("d", "charlie"),
        target("e", "charlie"),
    ];
    let engine = SearchEngine::new(
        config(2),
        targets,
        registry,
        CacheLayer::disabled(),
        Arc::new(FakeFactory::new(counters.clone())),
    );

    let outcome = engine
        .search(&query(), Box::new(NullSink), CancelFlag::new())
        .await
        .expect("search should succeed");

    let state = outcome.state;
    assert_eq!(outcome.cache, CacheStatus::Miss);
    assert_eq!(state.available.len(), 3);
    assert_eq!(state.unavailable.len(), 2);
    assert_eq!(state.completed_count(), 5);
    assert!(state.is_frozen());

    let reasons: Vec<_> = state
        .unavailable
        .iter()
        .filter_map(|r| r.reason.as_deref())
        .collect();
    assert!(reasons.contains(&"timeout"), "got reasons: {reasons:?}");
    assert!(
        state.unavailable.iter().all(|r| r.status == ProbeStatus::Error),
        "failed and timed-out probes report Error status"
    );

    // Timeout containment: the hung probe's page was released and every page
    // closed at shutdown.
    assert_eq!(counters.pages_open.load(Ordering::SeqCst), 0, "no page leak");
}

/// Streaming order: `start` first, `complete` last, one of each, `result`
/// events only for available targets.
#[tokio::test(start_paused = true)]
async fn event_stream_is_ordered() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = registry_with(
        &[
            ("alpha", Behavior::Unavailable),
            ("charlie", Behavior::Available),
        ],
        &calls,
    );
    let targets = vec![
        target("a", "alpha"),
        target("b", "charlie"),
        target("c", "charlie"),
        target("d", "missing-platform"),
    ];
    let engine = SearchEngine::new(
        config(3),
        targets,
        registry,
        CacheLayer::disabled(),
        Arc::new(FakeFactory::new(counters)),
    );

    let sink = MemorySink::new();
    engine
        .search(&query(), Box::new(sink.clone()), CancelFlag::new())
        .await
        .expect("search should succeed");

    let events = sink.events().await;
    assert!(
        matches!(events.first(), Some(ProbeEvent::Start { total_restaurants: 4 })),
        "first event must be start, got {:?}",
        events.first()
    );
    assert!(
        matches!(events.last(), Some(ProbeEvent::Complete { .. })),
        "last event must be complete, got {:?}",
        events.last()
    );
    let starts = events
        .iter()
        .filter(|e| matches!(e, ProbeEvent::Start { .. }))
        .count();
    let completes = events
        .iter()
        .filter(|e| matches!(e, ProbeEvent::Complete { .. }))
        .count();
    let results = events
        .iter()
        .filter(|e| matches!(e, ProbeEvent::Result { .. }))
        .count();
    let progresses = events
        .iter()
        .filter(|e| matches!(e, ProbeEvent::Progress { .. }))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(completes, 1);
    assert_eq!(results, 2, "one result event per available target");
    assert_eq!(progresses, 4, "one progress event per resolution");

    // The skipped target surfaces with its original status.
    assert!(events.iter().any(|e| matches!(
        e,
        ProbeEvent::Progress { status: ProbeStatus::Skipped, .. }
    )));
}

/// A repeat request within the TTL is served from cache with zero new
/// probes dispatched.
#[tokio::test]
async fn cache_hit_skips_the_pipeline() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(MemoryStore::new());
    let targets = vec![target("a", "charlie"), target("b", "charlie")];

    let engine = SearchEngine::new(
        config(2),
        targets,
        registry_with(&[("charlie", Behavior::Available)], &calls),
        CacheLayer::new(store, 300),
        Arc::new(FakeFactory::new(counters.clone())),
    );

    let first = assert_ok!(
        engine
            .search(&query(), Box::new(NullSink), CancelFlag::new())
            .await
    );
    assert_eq!(first.cache, CacheStatus::Miss);
    assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    let probes_after_first = calls.load(Ordering::SeqCst);

    let second = assert_ok!(
        engine
            .search(&query(), Box::new(NullSink), CancelFlag::new())
            .await
    );
    assert_eq!(second.cache, CacheStatus::Hit);
    assert_eq!(second.state, first.state, "cached aggregate is equivalent");
    assert_eq!(
        counters.launches.load(Ordering::SeqCst),
        1,
        "no second browser launch"
    );
    assert_eq!(
        calls.load(Ordering::SeqCst),
        probes_after_first,
        "no new probes dispatched"
    );
}

/// Targets without a registered checker resolve as skipped without touching
/// the browser.
#[tokio::test]
async fn unregistered_platforms_are_skipped_without_pages() {
    let counters = Arc::new(BrowserCounters::default());
    let targets = vec![target("a", "ghost"), target("b", "ghost")];
    let engine = SearchEngine::new(
        config(2),
        targets,
        CheckerRegistry::new(),
        CacheLayer::disabled(),
        Arc::new(FakeFactory::new(counters.clone())),
    );

    let outcome = engine
        .search(&query(), Box::new(NullSink), CancelFlag::new())
        .await
        .expect("search should succeed");

    assert_eq!(outcome.state.completed_count(), 2);
    assert!(outcome
        .state
        .unavailable
        .iter()
        .all(|r| r.status == ProbeStatus::Skipped));
    assert_eq!(
        counters.pages_created.load(Ordering::SeqCst),
        0,
        "skipped targets never acquire a page"
    );
}

/// A browser launch failure aborts the run with an `error` event in place
/// of `complete`.
#[tokio::test]
async fn launch_failure_emits_error_instead_of_complete() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = FakeFactory {
        counters,
        fail_launch: true,
        fail_pages: false,
    };
    let engine = SearchEngine::new(
        config(2),
        vec![target("a", "charlie")],
        registry_with(&[("charlie", Behavior::Available)], &calls),
        CacheLayer::disabled(),
        Arc::new(factory),
    );

    let sink = MemorySink::new();
    let err = engine
        .search(&query(), Box::new(sink.clone()), CancelFlag::new())
        .await
        .expect_err("launch failure must surface");
    assert!(matches!(
        err,
        openseat::AppError::Browser(openseat::error::BrowserError::LaunchFailed { .. })
    ));

    let events = sink.events().await;
    assert!(matches!(events.first(), Some(ProbeEvent::Start { .. })));
    assert!(matches!(events.last(), Some(ProbeEvent::Error { .. })));
    assert!(!events.iter().any(|e| matches!(e, ProbeEvent::Complete { .. })));
}

/// A session that dies when asked for pages degrades every probed target to
/// an error entry; the run itself still completes with partial results.
#[tokio::test]
async fn session_crash_degrades_targets_to_errors() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = FakeFactory {
        counters,
        fail_launch: false,
        fail_pages: true,
    };
    let targets = vec![
        target("a", "charlie"),
        target("b", "charlie"),
        target("c", "charlie"),
    ];
    let engine = SearchEngine::new(
        config(2),
        targets,
        registry_with(&[("charlie", Behavior::Available)], &calls),
        CacheLayer::disabled(),
        Arc::new(factory),
    );

    let outcome = engine
        .search(&query(), Box::new(NullSink), CancelFlag::new())
        .await
        .expect("partial results beat total failure");

    assert_eq!(outcome.state.completed_count(), 3);
    assert!(outcome
        .state
        .unavailable
        .iter()
        .all(|r| r.status == ProbeStatus::Error));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no checker ever ran");
}

/// Cancellation before dispatch: no probes run, nothing is cached, no
/// `complete` event is produced.
#[tokio::test]
async fn cancellation_stops_dispatch() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(MemoryStore::new());
    let engine = SearchEngine::new(
        config(2),
        vec![target("a", "charlie"), target("b", "charlie")],
        registry_with(&[("charlie", Behavior::Available)], &calls),
        CacheLayer::new(store.clone(), 300),
        Arc::new(FakeFactory::new(counters)),
    );

    let cancel = CancelFlag::new();
    cancel.cancel();
    let sink = MemorySink::new();
    let outcome = engine
        .search(&query(), Box::new(sink.clone()), cancel)
        .await
        .expect("a cancelled run is not an error");

    assert_eq!(outcome.state.completed_count(), 0);
    assert!(!outcome.state.is_frozen());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(
        !store.contains("2025-09-27|2|19:00").await,
        "cancelled runs are never cached"
    );
    assert!(!sink
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ProbeEvent::Complete { .. })));
}

/// A dead client connection stops emission but not the run.
#[tokio::test]
async fn sink_failure_does_not_fail_the_run() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = SearchEngine::new(
        config(2),
        vec![target("a", "charlie"), target("b", "charlie")],
        registry_with(&[("charlie", Behavior::Available)], &calls),
        CacheLayer::disabled(),
        Arc::new(FakeFactory::new(counters)),
    );

    let outcome = engine
        .search(&query(), Box::new(FailingSink { sent: 0 }), CancelFlag::new())
        .await
        .expect("run survives a broken stream");

    assert_eq!(outcome.state.completed_count(), 2);
    assert!(outcome.state.is_frozen());
}

/// Missing query parameters are rejected before anything is launched.
#[tokio::test]
async fn invalid_queries_never_probe() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = SearchEngine::new(
        config(2),
        vec![target("a", "charlie")],
        registry_with(&[("charlie", Behavior::Available)], &calls),
        CacheLayer::disabled(),
        Arc::new(FakeFactory::new(counters.clone())),
    );

    let raw = RawQuery {
        date: Some("2025-09-27".into()),
        party_size: None,
        time: Some("19:00".into()),
    };
    let err = engine
        .search(&raw, Box::new(NullSink), CancelFlag::new())
        .await
        .expect_err("incomplete query must be rejected");
    assert!(matches!(err, openseat::AppError::Validation(_)));
    assert_eq!(counters.launches.load(Ordering::SeqCst), 0);
}

/// The buffered aggregate deserializes from its serialized form, which is
/// what the cache layer round-trips.
#[tokio::test]
async fn aggregate_round_trips_through_json() {
    let counters = Arc::new(BrowserCounters::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = SearchEngine::new(
        config(2),
        vec![target("a", "charlie")],
        registry_with(&[("charlie", Behavior::Available)], &calls),
        CacheLayer::disabled(),
        Arc::new(FakeFactory::new(counters)),
    );

    let outcome = engine
        .search(&query(), Box::new(NullSink), CancelFlag::new())
        .await
        .expect("search should succeed");

    let json = serde_json::to_string(&outcome.state).expect("serialize");
    let parsed: RunState = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed, outcome.state);
}
