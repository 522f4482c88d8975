//! Recording Session Management
//!
//! One session per recording. It owns the live document and the snapshot
//! service behind a single lock, so the walker always runs alone:
//! - Full snapshots run synchronously under the lock
//! - Deferred items become watcher tasks (at most one per live node)
//! - Fired watchers enqueue tasks; a single worker re-enters the walker
//!   and reports results as [`SnapshotEvent`]s

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use crate::error::Result;
use crate::events::{DomEvent, EventBus, SnapshotEvent};
use crate::readiness::{wait_for_load, LoadLatch};
use dom::{Dom, NodeId};
use snapshot::{Deferred, Id, SerializedNode, SnapshotConfig, SnapshotOptions, SnapshotService, WaitFor, WalkArgs};

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub id: String,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Work for the session worker
#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskKind {
    SerializeIframe { iframe: NodeId, strict: bool },
    SerializeStylesheet(NodeId),
    InlineImage {
        image: NodeId,
        prior_cross_origin: Option<String>,
    },
}

#[derive(Debug)]
struct Task {
    /// Recording the task was scheduled in; stale tasks are dropped
    generation: u64,
    kind: TaskKind,
}

/// A spawned watcher; aborted when its recording is reset
struct Watcher {
    latch: LoadLatch,
    abort: Option<AbortHandle>,
}

struct Inner<D> {
    dom: D,
    service: SnapshotService,
}

/// Spawns watchers for deferred items
#[derive(Clone)]
struct Scheduler {
    bus: Arc<EventBus>,
    pending: Arc<DashMap<NodeId, Watcher>>,
    tasks: mpsc::UnboundedSender<Task>,
    generation: Arc<AtomicU64>,
    iframe_timeout: Duration,
    stylesheet_timeout: Duration,
}

impl Scheduler {
    fn schedule(&self, deferred: Vec<Deferred>) {
        for item in deferred {
            let node = item.node();
            let latch = LoadLatch::new();
            match self.pending.entry(node) {
                dashmap::mapref::entry::Entry::Occupied(_) => {
                    tracing::debug!("[RecordingSession] Node {} already has a pending watcher", node);
                    continue;
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(Watcher {
                        latch: latch.clone(),
                        abort: None,
                    });
                }
            }

            let (expected, wait, timeout, kind) = match item {
                Deferred::Iframe { iframe, wait, strict } => (
                    DomEvent::IframeLoaded(iframe),
                    wait,
                    self.iframe_timeout,
                    TaskKind::SerializeIframe { iframe, strict },
                ),
                Deferred::Stylesheet { link } => (
                    DomEvent::StylesheetLoaded(link),
                    WaitFor::LoadOrTimeout,
                    self.stylesheet_timeout,
                    TaskKind::SerializeStylesheet(link),
                ),
                Deferred::Image {
                    image,
                    prior_cross_origin,
                } => (
                    DomEvent::ImageLoaded(image),
                    WaitFor::LoadEvent,
                    Duration::ZERO,
                    TaskKind::InlineImage {
                        image,
                        prior_cross_origin,
                    },
                ),
            };

            // Subscribe before spawning so an immediate load is not missed
            let rx = self.bus.subscribe();
            let pending = self.pending.clone();
            let tasks = self.tasks.clone();
            let generation = self.generation.load(Ordering::SeqCst);
            let watcher_latch = latch.clone();

            let handle = tokio::spawn(async move {
                let outcome = wait_for_load(rx, expected, wait, timeout).await;
                pending.remove_if(&node, |_, current| current.latch.same(&watcher_latch));
                if !outcome.should_run() || !watcher_latch.fire() {
                    return;
                }
                tracing::debug!("[RecordingSession] {:?} ready ({:?})", kind, outcome);
                if let Err(e) = tasks.send(Task { generation, kind }) {
                    tracing::debug!("[RecordingSession] Worker gone, dropping {:?}", e.0.kind);
                }
            });

            // The watcher may already have finished and removed itself
            if let Some(mut watcher) = self.pending.get_mut(&node) {
                if watcher.latch.same(&latch) {
                    watcher.abort = Some(handle.abort_handle());
                }
            }
        }
    }
}

/// Recording Session - owns the live document for one recording
pub struct RecordingSession<D: Dom + Send + 'static> {
    pub config: SessionConfig,
    pub event_bus: Arc<EventBus>,
    inner: Arc<Mutex<Inner<D>>>,
    scheduler: Scheduler,
    worker: JoinHandle<()>,
}

impl<D: Dom + Send + 'static> RecordingSession<D> {
    /// Create a session; results of deferred work arrive on the returned receiver
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: SessionConfig, dom: D) -> Result<(Self, mpsc::UnboundedReceiver<SnapshotEvent>)> {
        let options = config.snapshot.resolve()?;
        Ok(Self::with_options(config, options, dom))
    }

    /// Create a session with pre-resolved options (custom mask hooks)
    pub fn with_options(
        config: SessionConfig,
        options: SnapshotOptions,
        dom: D,
    ) -> (Self, mpsc::UnboundedReceiver<SnapshotEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();

        let scheduler = Scheduler {
            bus: Arc::new(EventBus::new()),
            pending: Arc::new(DashMap::new()),
            tasks: tasks_tx,
            generation: Arc::new(AtomicU64::new(0)),
            iframe_timeout: options.iframe_load_timeout,
            stylesheet_timeout: options.stylesheet_load_timeout,
        };
        let inner = Arc::new(Mutex::new(Inner {
            dom,
            service: SnapshotService::with_options(options),
        }));
        let worker = tokio::spawn(run_worker(inner.clone(), scheduler.clone(), tasks_rx, events_tx));

        tracing::info!("[RecordingSession] Started recording session {}", config.id);
        let session = Self {
            config,
            event_bus: scheduler.bus.clone(),
            inner,
            scheduler,
            worker,
        };
        (session, events_rx)
    }

    /// Serialize `doc` and start watching whatever is still loading
    pub async fn take_full_snapshot(&self, doc: NodeId) -> Option<SerializedNode> {
        let mut guard = self.inner.lock().await;
        let Inner { dom, service } = &mut *guard;
        let snapshot = service.snapshot(dom, doc);
        self.scheduler.schedule(snapshot.deferred);
        snapshot.root
    }

    /// Serialize a node the mutation observer found after the full snapshot
    pub async fn serialize_added_node(&self, node: NodeId) -> Option<SerializedNode> {
        let mut guard = self.inner.lock().await;
        let Inner { dom, service } = &mut *guard;
        let args = WalkArgs {
            newly_added_element: true,
            ..WalkArgs::from_options(service.options())
        };
        let snapshot = service.serialize_node_with_id(dom, node, args);
        self.scheduler.schedule(snapshot.deferred);
        snapshot.root
    }

    /// Run `f` against the live document (while no walk is running)
    pub async fn with_dom<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard.dom)
    }

    /// Forward a load event from the document
    pub fn notify(&self, event: DomEvent) {
        self.event_bus.publish(event);
    }

    /// Snapshot id of a live node, -1 when unknown
    pub async fn mirror_id(&self, node: NodeId) -> Id {
        self.inner.lock().await.service.mirror().get_id(node)
    }

    /// Number of watchers still waiting on a load
    pub fn pending_count(&self) -> usize {
        self.scheduler.pending.len()
    }

    /// Start a new recording: ids restart at 1, pending work is dropped
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        self.scheduler.generation.fetch_add(1, Ordering::SeqCst);
        for entry in self.scheduler.pending.iter() {
            let watcher = entry.value();
            watcher.latch.fire();
            if let Some(abort) = &watcher.abort {
                abort.abort();
            }
        }
        self.scheduler.pending.clear();
        guard.service.reset();
        tracing::info!("[RecordingSession] Reset recording session {}", self.config.id);
    }
}

impl<D: Dom + Send + 'static> Drop for RecordingSession<D> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker<D: Dom + Send + 'static>(
    inner: Arc<Mutex<Inner<D>>>,
    scheduler: Scheduler,
    mut tasks: mpsc::UnboundedReceiver<Task>,
    events: mpsc::UnboundedSender<SnapshotEvent>,
) {
    while let Some(task) = tasks.recv().await {
        let mut guard = inner.lock().await;
        if task.generation != scheduler.generation.load(Ordering::SeqCst) {
            tracing::debug!("[RecordingSession] Dropping task from a previous recording: {:?}", task.kind);
            continue;
        }
        let Inner { dom, service } = &mut *guard;

        let event = match task.kind {
            TaskKind::SerializeIframe { iframe, strict } => {
                service
                    .serialize_loaded_iframe(dom, iframe, strict)
                    .map(|(document, deferred)| {
                        scheduler.schedule(deferred);
                        SnapshotEvent::IframeLoaded { iframe, document }
                    })
            }
            TaskKind::SerializeStylesheet(link) => service
                .serialize_loaded_stylesheet(dom, link)
                .map(|node| SnapshotEvent::StylesheetLoaded { link, node }),
            TaskKind::InlineImage {
                image,
                prior_cross_origin,
            } => service
                .inline_loaded_image(dom, image, prior_cross_origin.as_deref())
                .map(|(id, data_url)| SnapshotEvent::ImageInlined { image, id, data_url }),
        };
        drop(guard);

        if let Some(event) = event {
            if events.send(event).is_err() {
                tracing::debug!("[RecordingSession] Event receiver dropped");
            }
        }
    }
}
