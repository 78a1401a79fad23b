//! # Warm-up Scheduler
//!
//! A recognizer handle that has sat idle pays a cold-start penalty on its
//! next real request. The scheduler hides that penalty by exercising idle
//! handles against a short silent clip, from two triggers:
//!
//! 1. **Periodic**: a cancellable background loop fires every configured
//!    interval — meaningful where the process is long-lived.
//! 2. **Opportunistic**: the health endpoint fires a detached pass when the
//!    interval has elapsed and no pass is running. In environments where
//!    background tasks are not reliably scheduled (on-demand process
//!    lifetimes), health-check traffic becomes the de facto clock.
//!
//! ## State machine:
//! `Idle → Running → Idle`. The transition to Running is a compare-exchange
//! on an atomic flag, so two near-simultaneous health checks launch at most
//! one pass; `last_pass` is stamped optimistically at trigger time to stop
//! rapid successive checks from piling up triggers.
//!
//! Warm-up failures are logged and swallowed. They never propagate to any
//! caller; a stuck handle is bounded by a per-handle timeout so one bad
//! handle cannot stall the pass or process shutdown.

use crate::audio::AudioClip;
use crate::recognition::backend::RecognizeError;
use crate::recognition::pool::RecognizerPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Sample rate of the synthetic silent clip used for warm-up.
const WARMUP_SAMPLE_RATE: u32 = 16_000;

/// Length of the silent clip in milliseconds. Long enough to be a valid
/// request, short enough to be nearly free.
const WARMUP_CLIP_MILLIS: u32 = 100;

pub struct WarmUpScheduler {
    pool: Arc<RecognizerPool>,
    interval: Duration,
    handle_timeout: Duration,
    language: String,

    /// When the last pass was triggered (not finished). `None` until the
    /// first pass, so the first health check always warms.
    last_pass: Mutex<Option<Instant>>,

    /// True while a pass is in flight. Shared with detached pass tasks so
    /// they can flip it back when done.
    running: Arc<AtomicBool>,
}

impl WarmUpScheduler {
    pub fn new(
        pool: Arc<RecognizerPool>,
        interval: Duration,
        handle_timeout: Duration,
        language: String,
    ) -> Self {
        Self {
            pool,
            interval,
            handle_timeout,
            language,
            last_pass: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Warm every currently idle handle. Returns how many handles were warmed.
    ///
    /// The idle list is snapshotted in one critical section
    /// ([`RecognizerPool::drain_idle`]) and processed entirely outside the
    /// lock: each handle gets its own task, its own silent clip, and its own
    /// timeout, then goes back through `pool.release` whatever happened.
    pub async fn warm_up_all(&self) -> usize {
        Self::run_pass(
            Arc::clone(&self.pool),
            self.handle_timeout,
            self.language.clone(),
        )
        .await
    }

    async fn run_pass(
        pool: Arc<RecognizerPool>,
        handle_timeout: Duration,
        language: String,
    ) -> usize {
        let handles = pool.drain_idle();
        if handles.is_empty() {
            tracing::debug!("Warm-up pass found no idle handles");
            return 0;
        }

        let count = handles.len();
        tracing::info!(handles = count, "Starting warm-up pass");
        let started = Instant::now();

        let mut tasks = Vec::with_capacity(count);
        for mut handle in handles {
            let pool = Arc::clone(&pool);
            let language = language.clone();
            tasks.push(tokio::spawn(async move {
                let clip = AudioClip::silence(WARMUP_SAMPLE_RATE, WARMUP_CLIP_MILLIS);
                let outcome =
                    tokio::time::timeout(handle_timeout, handle.recognize(&clip, &language)).await;

                match outcome {
                    // Silence is expected to come back unintelligible; both
                    // count as a successful warm exercise of the handle
                    Ok(Ok(_)) | Ok(Err(RecognizeError::Unintelligible)) => {
                        tracing::debug!(handle = %handle.id(), "Handle warmed");
                    }
                    Ok(Err(RecognizeError::Unavailable(detail))) => {
                        tracing::warn!(handle = %handle.id(), detail = %detail, "Warm-up call failed");
                    }
                    Err(_) => {
                        tracing::warn!(handle = %handle.id(), "Warm-up call timed out");
                    }
                }

                pool.release(handle);
            }));
        }

        for task in tasks {
            // A panicked warm-up task loses its handle but must not take the
            // pass (or the process) down with it
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Warm-up task panicked");
            }
        }

        tracing::info!(
            handles = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Warm-up pass finished"
        );
        count
    }

    /// Opportunistic trigger, called from the health endpoint.
    ///
    /// Fires a detached warm-up pass only if the interval has elapsed since
    /// the last trigger and no pass is currently running; never blocks the
    /// health response. Returns whether a pass was launched.
    pub fn maybe_trigger(&self) -> bool {
        {
            let last_pass = self.last_pass.lock().unwrap();
            if let Some(at) = *last_pass {
                if at.elapsed() < self.interval {
                    return false;
                }
            }
        }

        if !self.begin_pass() {
            return false;
        }

        let pool = Arc::clone(&self.pool);
        let handle_timeout = self.handle_timeout;
        let language = self.language.clone();
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            Self::run_pass(pool, handle_timeout, language).await;
            running.store(false, Ordering::SeqCst);
        });
        true
    }

    /// Periodic trigger: run a pass every interval until `shutdown` flips.
    pub async fn run_periodic(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval() yields immediately; consume that first tick so the loop
        // waits a full interval before its first pass
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Periodic warm-up loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.begin_pass() {
                        self.warm_up_all().await;
                        self.finish_pass();
                    } else {
                        tracing::debug!("Skipping periodic warm-up, a pass is already running");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Periodic warm-up loop stopping");
                    break;
                }
            }
        }
    }

    /// Idle → Running via compare-exchange; stamps `last_pass` optimistically
    /// on success so concurrent triggers back off immediately.
    fn begin_pass(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        *self.last_pass.lock().unwrap() = Some(Instant::now());
        true
    }

    fn finish_pass(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether a pass is currently running (health reporting).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Seconds since the last pass was triggered, if any (health reporting).
    pub fn seconds_since_last_pass(&self) -> Option<u64> {
        self.last_pass
            .lock()
            .unwrap()
            .map(|at| at.elapsed().as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::backend::{RecognizeError, SpeechBackend};
    use crate::recognition::pool::{HandleFactory, RecognizerHandle};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Stub backend that counts calls and optionally dawdles.
    struct SlowBackend {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl SpeechBackend for SlowBackend {
        async fn recognize(
            &self,
            _clip: &AudioClip,
            _language: &str,
        ) -> Result<String, RecognizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Err(RecognizeError::Unintelligible)
        }
    }

    fn stub_factory(calls: Arc<AtomicUsize>, delay: Duration) -> Box<HandleFactory> {
        Box::new(move || {
            Ok(RecognizerHandle::new(Arc::new(SlowBackend {
                calls: calls.clone(),
                delay,
            })))
        })
    }

    fn scheduler(pool: Arc<RecognizerPool>, interval: Duration) -> Arc<WarmUpScheduler> {
        Arc::new(WarmUpScheduler::new(
            pool,
            interval,
            Duration::from_millis(200),
            "en-US".to_string(),
        ))
    }

    #[tokio::test]
    async fn test_warm_up_exercises_and_returns_all_idle_handles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(
            RecognizerPool::new(3, 4, stub_factory(calls.clone(), Duration::ZERO)).unwrap(),
        );
        let scheduler = scheduler(Arc::clone(&pool), Duration::from_secs(240));

        let warmed = scheduler.warm_up_all().await;

        assert_eq!(warmed, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(pool.idle_count(), 3);
    }

    #[tokio::test]
    async fn test_warm_up_with_empty_pool_is_a_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(
            RecognizerPool::new(0, 4, stub_factory(calls.clone(), Duration::ZERO)).unwrap(),
        );
        let scheduler = scheduler(pool, Duration::from_secs(240));

        assert_eq!(scheduler.warm_up_all().await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_launch_one_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(
            RecognizerPool::new(2, 4, stub_factory(calls.clone(), Duration::from_millis(50)))
                .unwrap(),
        );
        // Zero interval: the elapsed-time check never suppresses a trigger,
        // only the running flag can
        let scheduler = scheduler(Arc::clone(&pool), Duration::ZERO);

        let first = scheduler.maybe_trigger();
        let second = scheduler.maybe_trigger();

        assert!(first);
        assert!(!second, "second trigger must observe the running pass");

        // Let the detached pass finish, then confirm it ran exactly once
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2); // 2 handles, 1 pass
        assert!(!scheduler.is_running());
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test]
    async fn test_trigger_respects_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(
            RecognizerPool::new(1, 4, stub_factory(calls.clone(), Duration::ZERO)).unwrap(),
        );
        let scheduler = scheduler(pool, Duration::from_secs(240));

        assert!(scheduler.maybe_trigger()); // first ever trigger always fires
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            !scheduler.maybe_trigger(),
            "interval has not elapsed, no new pass"
        );
        assert!(scheduler.seconds_since_last_pass().is_some());
    }

    #[tokio::test]
    async fn test_stuck_handle_is_bounded_by_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Backend sleeps far longer than the per-handle timeout
        let pool = Arc::new(
            RecognizerPool::new(1, 4, stub_factory(calls.clone(), Duration::from_secs(60)))
                .unwrap(),
        );
        let scheduler = Arc::new(WarmUpScheduler::new(
            Arc::clone(&pool),
            Duration::from_secs(240),
            Duration::from_millis(20),
            "en-US".to_string(),
        ));

        let started = Instant::now();
        scheduler.warm_up_all().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        // The timed-out handle still made it back to the pool
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_periodic_loop_stops_on_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(
            RecognizerPool::new(1, 4, stub_factory(calls.clone(), Duration::ZERO)).unwrap(),
        );
        let scheduler = scheduler(pool, Duration::from_millis(10));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loop_task = tokio::spawn(Arc::clone(&scheduler).run_periodic(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), loop_task)
            .await
            .expect("loop must stop promptly after shutdown")
            .unwrap();

        assert!(
            calls.load(Ordering::SeqCst) >= 1,
            "loop should have warmed at least once"
        );
    }
}
