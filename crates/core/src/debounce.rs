//! Debounced trigger: run an action once a quiet window has elapsed since
//! the last `arm`.
//!
//! Used by the change scheduler (mutation bursts -> one scan) and by the
//! gallery (failed patches -> one rebuild). Each trigger owns an independent
//! timer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

type Action = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Pending {
    /// Bumped on every arm/cancel; a timer only fires if it is still current.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    window: Duration,
    action: Action,
    pending: Mutex<Pending>,
}

/// Restartable one-shot timer around an action.
///
/// Must be armed from within a tokio runtime.
#[derive(Clone)]
pub struct DebouncedTrigger {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DebouncedTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedTrigger")
            .field("window", &self.inner.window)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl DebouncedTrigger {
    pub fn new<F>(window: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                window,
                action: Arc::new(action),
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.inner.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// (Re)start the window. The action runs once the window elapses with
    /// no further `arm` or `cancel`.
    pub fn arm(&self) {
        let deadline = Instant::now() + self.inner.window;
        let mut pending = self.pending();
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.generation = pending.generation.wrapping_add(1);
        let generation = pending.generation;

        let inner = Arc::clone(&self.inner);
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut pending = inner.pending.lock().unwrap_or_else(|e| e.into_inner());
                if pending.generation != generation {
                    return;
                }
                pending.timer = None;
            }
            (inner.action)();
        }));
    }

    /// Drop a pending fire, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending();
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending().timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(window: Duration) -> (DebouncedTrigger, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let trigger = DebouncedTrigger::new(window, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (trigger, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_inside_window_fires_once() {
        let (trigger, fired) = counting(Duration::from_millis(500));

        for _ in 0..10 {
            trigger.arm();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(trigger.is_pending());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!trigger.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_triggers_fire_each_time() {
        let (trigger, fired) = counting(Duration::from_millis(500));

        for _ in 0..4 {
            trigger.arm();
            tokio::time::sleep(Duration::from_millis(600)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let (trigger, fired) = counting(Duration::from_millis(500));

        trigger.arm();
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
        assert!(!trigger.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_restarts_from_last_arm() {
        let (trigger, fired) = counting(Duration::from_millis(500));

        trigger.arm();
        tokio::time::sleep(Duration::from_millis(400)).await;
        trigger.arm();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
