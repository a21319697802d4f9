//! # Debounced Capture
//!
//! Editor activity arrives in bursts. Each session gets one [`Trigger`]; every
//! `touch` restarts that session's timer, and only when the timer elapses
//! without another touch does the capture run, exactly once.
//!
//! ```text
//! touch ─┬─ touch ─┬─ touch ──────── 1250ms ────────▶ capture()
//!        └ abort   └ abort
//! ```
//!
//! Restarting the timer is the only cancellation primitive. A capture that has
//! started running is never interrupted: aborting only affects a task still
//! sleeping.
//!
//! Timers run on the tokio runtime that was current when the session was
//! scheduled. The capture itself is blocking store I/O, so it runs on the
//! runtime's blocking pool, never on an async worker.

use crate::error::{RecallError, Result};
use crate::model::SessionKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1250);

type CaptureFn = Arc<dyn Fn() + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct DebounceState {
    delay: Mutex<Duration>,
    runtime: Handle,
    capture: Mutex<CaptureFn>,
    generation: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceState {
    /// Run the capture if no touch happened since `generation` was issued.
    fn fire(&self, generation: u64) {
        {
            let mut pending = lock(&self.pending);
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            pending.take();
        }
        let capture = lock(&self.capture).clone();
        capture();
    }
}

/// Restartable handle for one session's debounced capture.
#[derive(Clone)]
pub struct Trigger {
    state: Arc<DebounceState>,
}

impl Trigger {
    /// Restart the delay. The capture runs once the delay elapses untouched.
    pub fn touch(&self) {
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::clone(&self.state);
        let delay = self.delay();
        let mut pending = lock(&self.state.pending);
        if let Some(task) = pending.take() {
            task.abort();
        }
        *pending = Some(self.state.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = tokio::task::spawn_blocking(move || state.fire(generation)).await {
                tracing::warn!(error = %err, "Debounced capture did not complete");
            }
        }));
    }

    /// Drop a pending capture without running it. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        match lock(&self.state.pending).take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Run a pending capture now instead of waiting. Returns whether one ran.
    pub fn flush(&self) -> bool {
        if !self.cancel() {
            return false;
        }
        let capture = lock(&self.state.capture).clone();
        capture();
        true
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state.pending).is_some()
    }

    pub fn delay(&self) -> Duration {
        *lock(&self.state.delay)
    }
}

/// Per-session debounce handles.
pub struct SyncScheduler {
    delay: Duration,
    triggers: Mutex<HashMap<SessionKey, Trigger>>,
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl SyncScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            triggers: Mutex::default(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Get the trigger for `session`, creating it on first use.
    ///
    /// Scheduling an already scheduled session swaps in the new capture and
    /// keeps any pending timer. A given `delay` replaces the session's delay
    /// from the next touch on; `None` keeps the current one.
    pub fn schedule<F>(&self, session: SessionKey, delay: Option<Duration>, capture: F) -> Result<Trigger>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut triggers = lock(&self.triggers);
        if let Some(trigger) = triggers.get(&session) {
            *lock(&trigger.state.capture) = Arc::new(capture);
            if let Some(delay) = delay {
                *lock(&trigger.state.delay) = delay;
            }
            return Ok(trigger.clone());
        }

        let runtime = Handle::try_current()
            .map_err(|e| RecallError::Api(format!("Debounced capture needs a tokio runtime: {e}")))?;
        let trigger = Trigger {
            state: Arc::new(DebounceState {
                delay: Mutex::new(delay.unwrap_or(self.delay)),
                runtime,
                capture: Mutex::new(Arc::new(capture)),
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
            }),
        };
        tracing::debug!(session = %session, delay_ms = trigger.delay().as_millis() as u64, "Scheduled capture");
        triggers.insert(session, trigger.clone());
        Ok(trigger)
    }

    pub fn trigger(&self, session: &SessionKey) -> Option<Trigger> {
        lock(&self.triggers).get(session).cloned()
    }

    /// Forget a session, cancelling its pending capture.
    pub fn remove(&self, session: &SessionKey) -> bool {
        match lock(&self.triggers).remove(session) {
            Some(trigger) => {
                trigger.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop tracking a session without cancelling it. A capture already
    /// pending still runs through the caller's `Trigger`.
    pub fn release(&self, session: &SessionKey) -> bool {
        lock(&self.triggers).remove(session).is_some()
    }

    /// Run every pending capture now. Returns how many ran.
    pub fn flush_all(&self) -> usize {
        let triggers: Vec<Trigger> = lock(&self.triggers).values().cloned().collect();
        triggers.iter().filter(|t| t.flush()).count()
    }

    pub fn pending(&self) -> usize {
        lock(&self.triggers).values().filter(|t| t.is_pending()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_touches_collapses_into_one_capture() {
        let scheduler = SyncScheduler::default();
        let (count, capture) = counter();
        let trigger = scheduler.schedule("/a.js".into(), None, capture).unwrap();

        for _ in 0..10 {
            trigger.touch();
            sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(trigger.is_pending());

        sleep(Duration::from_millis(1300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!trigger.is_pending());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_capture_separately() {
        let scheduler = SyncScheduler::new(Duration::from_millis(500));
        let (count, capture) = counter();
        let trigger = scheduler.schedule("/a.js".into(), None, capture).unwrap();

        trigger.touch();
        sleep(Duration::from_millis(600)).await;
        trigger.touch();
        sleep(Duration::from_millis(600)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_are_debounced_independently() {
        let scheduler = SyncScheduler::default();
        let (a_count, a_capture) = counter();
        let (b_count, b_capture) = counter();
        let a = scheduler.schedule("/a.js".into(), None, a_capture).unwrap();
        let b = scheduler
            .schedule("/b.js".into(), Some(Duration::from_millis(100)), b_capture)
            .unwrap();

        a.touch();
        b.touch();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(a_count.load(Ordering::SeqCst), 0);
        assert_eq!(b_count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(1200)).await;
        assert_eq!(a_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_now_and_cancel_drops() {
        let scheduler = SyncScheduler::default();
        let (count, capture) = counter();
        let trigger = scheduler.schedule("/a.js".into(), None, capture).unwrap();

        assert!(!trigger.flush());
        trigger.touch();
        assert!(trigger.flush());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        trigger.touch();
        assert!(trigger.cancel());
        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_swaps_the_capture() {
        let scheduler = SyncScheduler::default();
        let (old_count, old_capture) = counter();
        let (new_count, new_capture) = counter();
        let first = scheduler.schedule("/a.js".into(), None, old_capture).unwrap();
        first.touch();
        scheduler.schedule("/a.js".into(), None, new_capture).unwrap();

        sleep(Duration::from_secs(2)).await;
        assert_eq!(old_count.load(Ordering::SeqCst), 0);
        assert_eq!(new_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_all_and_remove() {
        let scheduler = SyncScheduler::default();
        let (count, capture) = counter();
        let a = scheduler.schedule("/a.js".into(), None, capture).unwrap();
        let (b_count, b_capture) = counter();
        let b = scheduler.schedule("/b.js".into(), None, b_capture).unwrap();

        a.touch();
        b.touch();
        assert_eq!(scheduler.pending(), 2);
        assert!(scheduler.remove(&"/b.js".into()));
        assert_eq!(scheduler.flush_all(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(b_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_with_a_delay_replaces_it() {
        let scheduler = SyncScheduler::default();
        let (count, capture) = counter();
        scheduler.schedule("/a.js".into(), None, || {}).unwrap();
        let trigger = scheduler
            .schedule("/a.js".into(), Some(Duration::from_millis(100)), capture)
            .unwrap();

        assert_eq!(trigger.delay(), Duration::from_millis(100));
        trigger.touch();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.schedule("/a.js".into(), None, || {}).unwrap();
        assert_eq!(trigger.delay(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn released_session_still_fires_its_pending_capture() {
        let scheduler = SyncScheduler::default();
        let (count, capture) = counter();
        let trigger = scheduler.schedule("/a.js".into(), None, capture).unwrap();
        trigger.touch();

        assert!(scheduler.release(&"/a.js".into()));
        assert!(scheduler.trigger(&"/a.js".into()).is_none());
        assert!(!scheduler.release(&"/a.js".into()));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_capture_does_not_stall_other_tasks() {
        let scheduler = SyncScheduler::new(Duration::from_millis(10));
        let trigger = scheduler
            .schedule("/slow.js".into(), None, || std::thread::sleep(Duration::from_millis(300)))
            .unwrap();
        trigger.touch();

        let mut longest = Duration::ZERO;
        let mut last = std::time::Instant::now();
        for _ in 0..60 {
            sleep(Duration::from_millis(5)).await;
            let now = std::time::Instant::now();
            longest = longest.max(now - last);
            last = now;
        }

        assert!(longest < Duration::from_millis(150), "ticker stalled for {:?}", longest);
    }

    #[test]
    fn scheduling_outside_a_runtime_is_an_error() {
        let scheduler = SyncScheduler::default();
        assert!(scheduler.schedule("/a.js".into(), None, || {}).is_err());
    }
}
