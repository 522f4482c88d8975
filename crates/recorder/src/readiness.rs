//! Readiness - wait for iframes, stylesheets and images to load
//!
//! Each deferred item gets one watcher task. The watcher races the element's
//! load event against a timer; the first to complete wins and the other
//! branch is dropped (the timer with it). A shared latch makes the callback
//! fire at most once even if a stale watcher completes late.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::events::DomEvent;
use snapshot::WaitFor;

/// One-shot latch: the first `fire` wins
#[derive(Debug, Clone, Default)]
pub struct LoadLatch {
    fired: Arc<AtomicBool>,
}

impl LoadLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True for the first caller only
    pub fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Whether both handles share the same latch
    pub fn same(&self, other: &LoadLatch) -> bool {
        Arc::ptr_eq(&self.fired, &other.fired)
    }
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    TimedOut,
    NextTick,
    /// The event source went away before anything happened
    Closed,
}

impl LoadOutcome {
    /// Whether the deferred work should run
    pub fn should_run(&self) -> bool {
        !matches!(self, LoadOutcome::Closed)
    }
}

async fn next_match(rx: &mut broadcast::Receiver<DomEvent>, expected: DomEvent) -> bool {
    loop {
        match rx.recv().await {
            Ok(event) if event == expected => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("[Readiness] Missed {} load events while waiting for {:?}", skipped, expected);
                continue;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

/// Wait until `expected` is published, according to `wait`
///
/// `rx` must be subscribed before the deferred item is handed out, or an
/// early load event is lost.
pub async fn wait_for_load(
    mut rx: broadcast::Receiver<DomEvent>,
    expected: DomEvent,
    wait: WaitFor,
    timeout: Duration,
) -> LoadOutcome {
    match wait {
        WaitFor::NextTick => {
            tokio::task::yield_now().await;
            LoadOutcome::NextTick
        }
        WaitFor::LoadEvent => {
            if next_match(&mut rx, expected).await {
                LoadOutcome::Loaded
            } else {
                LoadOutcome::Closed
            }
        }
        WaitFor::LoadOrTimeout => {
            tokio::select! {
                loaded = next_match(&mut rx, expected) => {
                    if loaded { LoadOutcome::Loaded } else { LoadOutcome::Closed }
                }
                _ = tokio::time::sleep(timeout) => LoadOutcome::TimedOut,
            }
        }
    }
}
