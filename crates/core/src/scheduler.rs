//! Change scheduler: turns mutation bursts into debounced scans.
//!
//! ```text
//!   STOPPED --start--> ARMED --mutation--> PENDING --window elapsed--> ARMED
//!      ^                 |                    |
//!      +------stop-------+--------stop--------+
//! ```
//!
//! `start` subscribes first and then scans once, so no mutation made after
//! the initial scan can be missed.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::debounce::DebouncedTrigger;
use crate::dom::MutationBatch;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Armed,
    Pending,
}

type ScanFn = Arc<dyn Fn() + Send + Sync>;

pub struct ChangeScheduler {
    scan: ScanFn,
    trigger: DebouncedTrigger,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChangeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeScheduler")
            .field("state", &self.state())
            .finish()
    }
}

impl ChangeScheduler {
    /// `scan` runs once on `start` and after every debounce window.
    pub fn new<F>(window: Duration, scan: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let scan: ScanFn = Arc::new(scan);
        let debounced = Arc::clone(&scan);
        Self {
            trigger: DebouncedTrigger::new(window, move || debounced()),
            scan,
            listener: Mutex::new(None),
        }
    }

    fn listener(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// STOPPED -> ARMED: attach to `mutations` and scan immediately.
    /// Returns false (and does nothing) if already started.
    pub fn start(&self, mut mutations: broadcast::Receiver<MutationBatch>) -> bool {
        {
            let mut listener = self.listener();
            if listener.is_some() {
                return false;
            }

            let trigger = self.trigger.clone();
            *listener = Some(tokio::spawn(async move {
                loop {
                    match mutations.recv().await {
                        Ok(batch) if batch.is_empty() => {}
                        Ok(_) => trigger.arm(),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // Something changed; a scan covers all of it.
                            debug!("Mutation listener lagged by {} batches", missed);
                            trigger.arm();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("Mutation stream closed");
                            break;
                        }
                    }
                }
            }));
        }

        info!("Change scheduler armed");
        (self.scan)();
        true
    }

    /// ARMED/PENDING -> STOPPED: detach and drop any pending scan.
    pub fn stop(&self) {
        let listener = self.listener().take();
        if let Some(listener) = listener {
            listener.abort();
            info!("Change scheduler stopped");
        }
        self.trigger.cancel();
    }

    pub fn state(&self) -> SchedulerState {
        if self.listener().is_none() {
            SchedulerState::Stopped
        } else if self.trigger.is_pending() {
            SchedulerState::Pending
        } else {
            SchedulerState::Armed
        }
    }
}

impl Drop for ChangeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
