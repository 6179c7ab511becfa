use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::warn;

use super::error::FetchError;

/// Outcome of a single poll cycle: the fetched payload or a classified error.
pub type PollOutcome = Result<Value, FetchError>;

/// The effectful fetch operation a `Poller` drives.
///
/// Implementations perform network I/O. The poller guarantees at most one
/// `fetch` call is in flight per instance; it does not retry or back off.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> PollOutcome;
}

/// State shared between the `Poller` handle and its schedule task.
struct Shared {
    /// Most recent outcome, success or failure.
    last: ArcSwapOption<PollOutcome>,

    /// Most recent successful payload. Failures never overwrite it.
    last_success: ArcSwapOption<Value>,

    /// Cycle counter bumped after each recorded outcome. Observers watch
    /// this; the watch channel only retains the newest value, so a view can
    /// never observe an older payload after a newer one.
    cycle_tx: watch::Sender<u64>,

    /// Set by `stop()`. Once set, no further outcome is recorded, including
    /// a fetch that was already in flight when `stop()` was called.
    stopped: AtomicBool,

    /// Wakes the schedule task for an out-of-band refresh.
    refresh: Notify,
}

impl Shared {
    /// Record an outcome and notify observers. Returns false if the poller
    /// was stopped and the outcome was discarded.
    fn record(&self, outcome: PollOutcome) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            debug!("discarding poll outcome that arrived after stop");
            return false;
        }

        if let Ok(payload) = &outcome {
            self.last_success.store(Some(Arc::new(payload.clone())));
        }
        self.last.store(Some(Arc::new(outcome)));
        self.cycle_tx.send_modify(|c| *c += 1);
        true
    }
}

/// Shared-poll coordinator.
///
/// Owns the fetch operation, the schedule, and the last-known result.
/// One `Poller` per integration entry; instances are never shared across
/// entries. Lifecycle: `prime_once` at setup (via the initialization gate),
/// `start` for steady-state polling, `stop` at teardown.
pub struct Poller {
    fetcher: Arc<dyn Fetcher>,
    shared: Arc<Shared>,
    stop_tx: watch::Sender<bool>,
    running: AtomicBool,
}

impl Poller {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        let (cycle_tx, _) = watch::channel(0u64);
        let (stop_tx, _) = watch::channel(false);
        Self {
            fetcher,
            shared: Arc::new(Shared {
                last: ArcSwapOption::empty(),
                last_success: ArcSwapOption::empty(),
                cycle_tx,
                stopped: AtomicBool::new(false),
                refresh: Notify::new(),
            }),
            stop_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Invoke the fetch exactly once, outside the schedule, and return the
    /// outcome. Used at setup to validate configuration before committing
    /// to periodic polling. The outcome is recorded like a scheduled cycle.
    pub async fn prime_once(&self) -> PollOutcome {
        let outcome = self.fetcher.fetch().await;
        self.shared.record(outcome.clone());
        outcome
    }

    /// Begin the repeating schedule with the given period.
    ///
    /// The loop awaits each fetch inline, so at most one fetch is ever in
    /// flight; ticks that come due while a fetch is running are skipped.
    /// Fetch errors are recorded and logged, never terminate the schedule,
    /// and are retried at the fixed interval with no backoff.
    pub fn start(&self, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("poller already started, ignoring start()");
            return;
        }

        let fetcher = self.fetcher.clone();
        let shared = self.shared.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately; the
            // priming fetch already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                    _ = shared.refresh.notified() => {}
                }

                if shared.stopped.load(Ordering::SeqCst) {
                    break;
                }

                let outcome = fetcher.fetch().await;
                if let Err(e) = &outcome {
                    warn!("poll cycle failed: {}", e);
                }
                if !shared.record(outcome) {
                    break;
                }
            }

            debug!("poll schedule task exiting");
        });
    }

    /// Request one out-of-schedule fetch. The schedule task performs it, so
    /// the at-most-one-in-flight guarantee still holds; a request arriving
    /// while a fetch is running coalesces into at most one extra cycle.
    pub fn request_refresh(&self) {
        self.shared.refresh.notify_one();
    }

    /// Most recent outcome (success or failure), without blocking.
    pub fn latest(&self) -> Option<PollOutcome> {
        self.shared.last.load_full().map(|o| (*o).clone())
    }

    /// Most recent successful payload, without blocking.
    pub fn last_success(&self) -> Option<Value> {
        self.shared.last_success.load_full().map(|p| (*p).clone())
    }

    /// Watch receiver that changes after every recorded cycle.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.cycle_tx.subscribe()
    }

    /// Whether the repeating schedule has been started.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cancel the schedule. An in-flight fetch is allowed to complete but
    /// its outcome is neither recorded nor broadcast.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;
    use tokio::sync::Notify as TestNotify;

    use super::*;

    /// Fetcher that replays a fixed sequence of outcomes.
    struct SeqFetcher {
        outcomes: Mutex<VecDeque<PollOutcome>>,
    }

    impl SeqFetcher {
        fn new(outcomes: Vec<PollOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
            }
        }
    }

    #[async_trait]
    impl Fetcher for SeqFetcher {
        async fn fetch(&self) -> PollOutcome {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Unknown("sequence exhausted".into())))
        }
    }

    #[tokio::test]
    async fn test_failure_never_overwrites_last_success() {
        let fetcher = SeqFetcher::new(vec![
            Ok(json!({"aqi": 42})),
            Err(FetchError::Unknown("connection reset".into())),
            Ok(json!({"aqi": 43})),
        ]);
        let poller = Poller::new(Arc::new(fetcher));

        assert!(poller.latest().is_none());
        assert!(poller.last_success().is_none());

        assert!(poller.prime_once().await.is_ok());
        assert_eq!(poller.last_success(), Some(json!({"aqi": 42})));

        assert!(poller.prime_once().await.is_err());
        // Latest reflects the failure, last_success keeps the old payload.
        assert!(matches!(poller.latest(), Some(Err(_))));
        assert_eq!(poller.last_success(), Some(json!({"aqi": 42})));

        assert!(poller.prime_once().await.is_ok());
        assert_eq!(poller.latest(), Some(Ok(json!({"aqi": 43}))));
        assert_eq!(poller.last_success(), Some(json!({"aqi": 43})));
    }

    /// Fetcher that tracks how many calls overlap.
    struct SlowFetcher {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        started: AtomicUsize,
    }

    impl SlowFetcher {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                started: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for SlowFetcher {
        async fn fetch(&self) -> PollOutcome {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            // Much slower than the poll interval used below.
            tokio::time::sleep(Duration::from_millis(35)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(json!({"ok": true}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_skips_ticks_and_never_overlaps() {
        let fetcher = Arc::new(SlowFetcher::new());
        let poller = Poller::new(fetcher.clone());

        poller.start(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        poller.stop();

        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
        let started = fetcher.started.load(Ordering::SeqCst);
        // 20 ticks came due; with skipped ticks only ~5 fetches run.
        assert!(started >= 2, "expected at least 2 fetches, got {}", started);
        assert!(started <= 6, "expected skipped ticks, got {} fetches", started);
    }

    /// Fetcher that blocks until released, so tests can stop the poller
    /// while a fetch is in flight.
    struct GatedFetcher {
        entered: TestNotify,
        release: TestNotify,
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch(&self) -> PollOutcome {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(json!({"late": true}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_arriving_after_stop_is_discarded() {
        let fetcher = Arc::new(GatedFetcher {
            entered: TestNotify::new(),
            release: TestNotify::new(),
        });
        let poller = Poller::new(fetcher.clone());

        poller.start(Duration::from_millis(10));
        fetcher.entered.notified().await;

        poller.stop();
        fetcher.release.notify_one();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(poller.latest().is_none());
        assert!(poller.last_success().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_refresh_triggers_extra_cycle() {
        let fetcher = Arc::new(SlowFetcher::new());
        let poller = Poller::new(fetcher.clone());

        poller.start(Duration::from_secs(3600));
        tokio::task::yield_now().await;
        assert_eq!(fetcher.started.load(Ordering::SeqCst), 0);

        poller.request_refresh();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetcher.started.load(Ordering::SeqCst), 1);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_survives_consecutive_failures() {
        let fetcher = SeqFetcher::new(vec![
            Err(FetchError::Unknown("down".into())),
            Err(FetchError::Quota("over quota".into())),
            Ok(json!({"aqi": 7})),
        ]);
        let poller = Poller::new(Arc::new(fetcher));

        poller.start(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(45)).await;
        poller.stop();

        assert_eq!(poller.last_success(), Some(json!({"aqi": 7})));
    }
}
