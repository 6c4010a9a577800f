//! The periodic fetch → classify → notify → record loop.
//!
//! [`PollLoop::spawn`] runs the loop in a dedicated tokio task. The delay is
//! measured from the end of one cycle to the start of the next. A failed
//! cycle is logged and the loop re-arms; only the cancellation token stops it.

use std::sync::Arc;
use std::time::Duration;

use pace_core::classifier::{classify, NotificationDecision};
use pace_core::Result;
use pace_data::paceman::LiveDataSource;
use pace_data::registry::SubscriptionRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::notifier::Notifier;

/// Default delay between two poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Summary of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Players in the registry when the cycle started.
    pub tracked: usize,
    /// Tracked players that had an active run.
    pub live: usize,
    /// Players a notification was sent for.
    pub notified: usize,
    /// Individual subscriber deliveries that failed.
    pub deliveries_failed: usize,
}

pub struct PollLoop {
    registry: Arc<SubscriptionRegistry>,
    source: Arc<dyn LiveDataSource>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl PollLoop {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        source: Arc<dyn LiveDataSource>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            source,
            notifier,
            clock,
            interval,
        }
    }

    /// Run a single cycle.
    ///
    /// Only a failed fetch is returned as an error; per-subscriber delivery
    /// failures are counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let snapshot = self.source.fetch_live_runs().await?;
        let live_runs = snapshot.by_player();
        let tracked = self.registry.snapshot();

        let mut report = CycleReport {
            tracked: tracked.len(),
            ..CycleReport::default()
        };

        for (key, subscription) in tracked {
            // Offline players keep their state untouched.
            let Some(run) = live_runs.get(&key) else {
                continue;
            };
            report.live += 1;

            let NotificationDecision::Notify {
                message,
                world_id,
                event_id,
            } = classify(&subscription, run)
            else {
                continue;
            };

            info!(player = %subscription.canonical_name, event = %event_id, "notifying subscribers");
            let broadcast = self
                .notifier
                .broadcast(&subscription.subscribers, &message)
                .await;
            report.notified += 1;
            report.deliveries_failed += broadcast.failed;

            if let Err(e) = self.registry.record_notification(&key, &world_id, &event_id) {
                // Unsubscribed while we were sending.
                debug!(player = %key, error = %e, "could not record notification");
            }
        }

        Ok(report)
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "poll loop started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.run_cycle() => match result {
                    Ok(report) => debug!(?report, "poll cycle finished"),
                    Err(e) => warn!(error = %e, "poll cycle failed; will retry"),
                },
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.interval) => {}
            }
        }

        info!("poll loop stopped");
    }

    /// Spawn [`PollLoop::run`] on the tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> PollerHandle {
        let token = cancel.clone();
        let handle = tokio::spawn(self.run(token));
        PollerHandle { handle, cancel }
    }
}

// ── PollerHandle ──────────────────────────────────────────────────────────────

/// Handle to the background poll task.
pub struct PollerHandle {
    handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl PollerHandle {
    /// Cancel the loop and wait for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "poll task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;
    use crate::notifier::MessageSink;
    use crate::sinks::MemorySink;
    use async_trait::async_trait;
    use pace_core::models::{LiveRun, LiveRunSnapshot, ProgressEvent};
    use pace_core::PaceError;
    use pace_data::store::MemoryStore;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    // ── fakes ─────────────────────────────────────────────────────────────

    /// Serves queued responses, repeating the last one once the queue drains.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<LiveRunSnapshot>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedSource {
        fn push(&self, response: Result<LiveRunSnapshot>) {
            self.responses.lock().push_back(response);
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LiveDataSource for ScriptedSource {
        async fn fetch_live_runs(&self) -> Result<LiveRunSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock();
            let next = if responses.len() > 1 {
                responses.pop_front()
            } else {
                None
            };
            match next {
                Some(r) => r,
                None => match responses.front() {
                    Some(Ok(snapshot)) => Ok(snapshot.clone()),
                    Some(Err(e)) => Err(PaceError::RemoteFetch(e.to_string())),
                    None => Ok(LiveRunSnapshot::default()),
                },
            }
        }
    }

    /// Signals on every sleep, then never wakes up.
    #[derive(Default)]
    struct StalledClock {
        entered: Notify,
    }

    #[async_trait]
    impl Clock for StalledClock {
        async fn sleep(&self, _duration: Duration) {
            self.entered.notify_one();
            std::future::pending::<()>().await;
        }
    }

    fn live_run(nickname: &str, world: &str, event_id: &str, igt: u64) -> LiveRun {
        LiveRun {
            nickname: nickname.to_string(),
            game_version: "1.16.1".to_string(),
            world_id: world.to_string(),
            event_list: vec![ProgressEvent {
                event_id: event_id.to_string(),
                rta: igt + 5_000,
                igt,
            }],
        }
    }

    struct Fixture {
        registry: Arc<SubscriptionRegistry>,
        source: Arc<ScriptedSource>,
        sink: Arc<MemorySink>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Arc::new(SubscriptionRegistry::open(Arc::new(MemoryStore::new()))),
                source: Arc::new(ScriptedSource::default()),
                sink: Arc::new(MemorySink::new()),
            }
        }

        fn poll_loop(&self, clock: Arc<dyn Clock>) -> PollLoop {
            let notifier = Notifier::new(self.sink.clone(), clock.clone(), Duration::from_millis(500));
            PollLoop::new(
                self.registry.clone(),
                self.source.clone(),
                notifier,
                clock,
                DEFAULT_POLL_INTERVAL,
            )
        }
    }

    // ── run_cycle ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cycle_notifies_all_subscribers_and_records() {
        let fx = Fixture::new();
        fx.registry.subscribe("Foo", "g1", None);
        fx.registry.subscribe("foo", "g2", None);
        fx.source.push(Ok(LiveRunSnapshot::new(vec![live_run(
            "FOO",
            "w1",
            "rsg.first_portal",
            300_000,
        )])));

        let report = fx.poll_loop(Arc::new(RecordingClock::new())).run_cycle().await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                tracked: 1,
                live: 1,
                notified: 1,
                deliveries_failed: 0
            }
        );
        let sent = fx.sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "g1");
        assert_eq!(sent[1].0, "g2");
        assert!(sent[0].1.starts_with("foo live pace:"));
        assert!(sent[0].1.contains("Event: Blind travel"));

        let last = fx.registry.get("foo").unwrap().last_notified.unwrap();
        assert!(last.matches("w1", "rsg.first_portal"));
    }

    #[tokio::test]
    async fn test_same_event_is_not_sent_twice() {
        let fx = Fixture::new();
        fx.registry.subscribe("Foo", "g1", None);
        fx.source.push(Ok(LiveRunSnapshot::new(vec![live_run(
            "foo",
            "w1",
            "rsg.enter_end",
            700_000,
        )])));
        let poll = fx.poll_loop(Arc::new(RecordingClock::new()));

        poll.run_cycle().await.unwrap();
        let second = poll.run_cycle().await.unwrap();

        assert_eq!(second.notified, 0);
        assert_eq!(fx.sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_absent_player_is_skipped() {
        let fx = Fixture::new();
        fx.registry.subscribe("Foo", "g1", None);
        fx.registry.record_notification("foo", "w0", "rsg.enter_stronghold").unwrap();
        fx.source.push(Ok(LiveRunSnapshot::new(vec![live_run(
            "someone_else",
            "w1",
            "rsg.credits",
            900_000,
        )])));

        let report = fx.poll_loop(Arc::new(RecordingClock::new())).run_cycle().await.unwrap();

        assert_eq!(report.live, 0);
        assert!(fx.sink.sent().is_empty());
        let last = fx.registry.get("foo").unwrap().last_notified.unwrap();
        assert!(last.matches("w0", "rsg.enter_stronghold"));
    }

    #[tokio::test]
    async fn test_slow_legacy_split_is_not_sent_or_recorded() {
        let fx = Fixture::new();
        fx.registry.subscribe("Foo", "g1", None);
        fx.source.push(Ok(LiveRunSnapshot::new(vec![live_run(
            "foo",
            "w1",
            "rsg.first_portal",
            480_001,
        )])));

        let report = fx.poll_loop(Arc::new(RecordingClock::new())).run_cycle().await.unwrap();

        assert_eq!(report.live, 1);
        assert_eq!(report.notified, 0);
        assert!(fx.registry.get("foo").unwrap().last_notified.is_none());
    }

    #[tokio::test]
    async fn test_failed_delivery_still_records_and_continues() {
        let fx = Fixture::new();
        fx.registry.subscribe("Foo", "g1", None);
        fx.registry.subscribe("Foo", "g2", None);
        fx.sink.fail_for("g1");
        fx.source.push(Ok(LiveRunSnapshot::new(vec![live_run(
            "foo",
            "w1",
            "rsg.credits",
            1_000_000,
        )])));

        let report = fx.poll_loop(Arc::new(RecordingClock::new())).run_cycle().await.unwrap();

        assert_eq!(report.deliveries_failed, 1);
        assert_eq!(fx.sink.sent().len(), 1);
        assert_eq!(fx.sink.sent()[0].0, "g2");
        assert!(fx.registry.get("foo").unwrap().last_notified.is_some());
    }

    /// Subscribes a late destination to the player on its first delivery.
    struct SubscribingSink {
        registry: Arc<SubscriptionRegistry>,
        deliveries: AtomicUsize,
    }

    #[async_trait]
    impl MessageSink for SubscribingSink {
        async fn deliver(&self, _destination_id: &str, _text: &str) -> Result<()> {
            if self.deliveries.fetch_add(1, Ordering::SeqCst) == 0 {
                self.registry.subscribe("Foo", "late", Some("9"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_subscribe_during_cycle_survives_recording() {
        let fx = Fixture::new();
        fx.registry.subscribe("Foo", "g1", None);
        fx.source.push(Ok(LiveRunSnapshot::new(vec![live_run(
            "foo",
            "w",
            "rsg.credits",
            1_000_000,
        )])));
        let sink = Arc::new(SubscribingSink {
            registry: fx.registry.clone(),
            deliveries: AtomicUsize::new(0),
        });
        let clock: Arc<dyn Clock> = Arc::new(RecordingClock::new());
        let poll = PollLoop::new(
            fx.registry.clone(),
            fx.source.clone(),
            Notifier::new(sink, clock.clone(), Duration::ZERO),
            clock,
            DEFAULT_POLL_INTERVAL,
        );

        let report = poll.run_cycle().await.unwrap();

        assert_eq!(report.notified, 1);
        let foo = fx.registry.get("foo").unwrap();
        assert_eq!(foo.subscribers, vec!["g1", "late"]);
        assert_eq!(foo.room_id.as_deref(), Some("9"));
        assert!(foo.last_notified.unwrap().matches("w", "rsg.credits"));
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned() {
        let fx = Fixture::new();
        fx.source.push(Err(PaceError::RemoteFetch("timeout".to_string())));
        let err = fx
            .poll_loop(Arc::new(RecordingClock::new()))
            .run_cycle()
            .await
            .unwrap_err();
        assert!(matches!(err, PaceError::RemoteFetch(_)));
    }

    // ── run / spawn ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_loop_survives_fetch_errors() {
        let fx = Fixture::new();
        fx.registry.subscribe("Foo", "g1", None);
        fx.source.push(Err(PaceError::RemoteFetch("boom".to_string())));
        fx.source.push(Ok(LiveRunSnapshot::new(vec![live_run(
            "foo",
            "w1",
            "rsg.enter_stronghold",
            600_000,
        )])));

        let clock = Arc::new(RecordingClock::new());
        let handle = fx.poll_loop(clock.clone()).spawn(CancellationToken::new());

        tokio::time::timeout(Duration::from_secs(5), async {
            while fx.sink.sent().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("loop should recover and notify");

        handle.shutdown().await;
        assert!(fx.source.fetches() >= 2);
        assert!(clock.sleeps().contains(&DEFAULT_POLL_INTERVAL));
    }

    #[tokio::test]
    async fn test_cancel_during_delay_does_not_fetch_again() {
        let fx = Fixture::new();
        let clock = Arc::new(StalledClock::default());
        let handle = fx.poll_loop(clock.clone()).spawn(CancellationToken::new());

        tokio::time::timeout(Duration::from_secs(5), clock.entered.notified())
            .await
            .expect("loop should reach its delay");

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown should be prompt");
        assert_eq!(fx.source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_never_fetches() {
        let fx = Fixture::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        fx.poll_loop(Arc::new(RecordingClock::new())).run(cancel).await;
        assert_eq!(fx.source.fetches(), 0);
    }
}
