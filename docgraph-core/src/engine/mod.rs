//! Invalidation Engine
//!
//! The engine ties the built graph to a change source. It serves document
//! reads and consumes the source's change batches.
//!
//! # How It Works
//!
//! 1. `read` looks up the document's node and asks its store for the value
//!    of the current epoch. On a miss, the raw content is fetched from the
//!    source and parsed; concurrent readers share that one computation.
//!
//! 2. For every change batch, `on_batch`:
//!    a. maps each changed name to a node (unknown names are ignored),
//!    b. collects every node that transitively depends on those nodes,
//!    c. resets them in rank order, dependencies first.
//!
//! 3. Nothing is recomputed eagerly. A reset document is parsed again on its
//!    next read.
//!
//! # Lifecycle
//!
//! `Built → Running → Stopped`. `start` spawns the consumer task; when the
//! source's stream closes the engine is `Stopped`: reads keep working but
//! no longer see external changes.
//!
//! # Consistency
//!
//! Reads of several documents are not transactional. During an invalidation
//! pass a reader may see one document's fresh value next to another's stale
//! value.

mod report;

pub use report::InvalidationReport;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::doc::{downcast, DocOutcome, DocReader, Docs};
use crate::error::{DocError, DocResult, EngineError};
use crate::graph::{DocGraph, Node};
use crate::key::DocKey;
use crate::source::{ChangeSource, DocChange};

/// Reports buffered for slow subscribers before they start lagging.
const REPORT_BUFFER: usize = 64;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    /// Graph built, not consuming changes yet.
    Built = 0,

    /// Consuming change batches.
    Running = 1,

    /// The change stream closed. Cached values no longer track changes.
    Stopped = 2,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => EngineState::Built,
            1 => EngineState::Running,
            _ => EngineState::Stopped,
        }
    }
}

/// Lazily parsed documents over a change source, invalidated by dependency.
pub struct DocEngine<S> {
    graph: DocGraph,
    source: Arc<S>,
    state: AtomicU8,

    /// Serializes invalidation passes.
    pass: Mutex<()>,

    reports: broadcast::Sender<InvalidationReport>,
}

impl<S: ChangeSource> DocEngine<S> {
    pub fn new(graph: DocGraph, source: Arc<S>) -> Self {
        let (reports, _) = broadcast::channel(REPORT_BUFFER);
        Self {
            graph,
            source,
            state: AtomicU8::new(EngineState::Built as u8),
            pass: Mutex::new(()),
            reports,
        }
    }

    pub fn graph(&self) -> &DocGraph {
        &self.graph
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Read a document as `T`.
    ///
    /// Blocks while another thread computes the same document. A failed
    /// fetch or parse is cached like a value until the document is reset.
    pub fn read<T, K>(&self, key: &K) -> DocResult<Arc<T>>
    where
        T: Any + Send + Sync,
        K: DocKey,
    {
        downcast(key.name(), self.read_value(key)?)
    }

    /// Read a document without recovering its type.
    pub fn read_value<K: DocKey>(&self, key: &K) -> DocOutcome {
        self.node_for(key)?;
        self.read_index(key.index())
    }

    /// Current epoch of a document's store.
    pub fn epoch<K: DocKey>(&self, key: &K) -> Option<u64> {
        self.node_for(key).ok().map(|node| node.cell().epoch())
    }

    /// Whether a document has a cached outcome for its current epoch.
    pub fn is_cached<K: DocKey>(&self, key: &K) -> bool {
        self.node_for(key)
            .map(|node| node.cell().is_ready())
            .unwrap_or(false)
    }

    /// Receive a report for every invalidation pass from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationReport> {
        self.reports.subscribe()
    }

    /// Invalidate everything affected by one batch of changes.
    ///
    /// Passes never overlap: concurrent callers run one after another.
    pub fn on_batch(&self, batch: &[DocChange]) -> InvalidationReport {
        let _pass = self.pass.lock();

        let mut seeds = Vec::with_capacity(batch.len());
        let mut ignored = Vec::new();
        for change in batch {
            match self.graph.index_of(&change.name) {
                Some(index) => seeds.push(index),
                None => {
                    if !ignored.contains(&change.name) {
                        ignored.push(change.name.clone());
                    }
                }
            }
        }
        seeds.sort_unstable();
        seeds.dedup();

        let invalidated = self.graph.impact_set(seeds.iter().copied());
        for &index in &invalidated {
            let node = &self.graph.nodes()[index];
            let epoch = node.cell().reset();
            debug!(name = node.name(), rank = node.rank(), epoch, "reset document");
        }

        if !ignored.is_empty() {
            debug!(?ignored, "ignored changes to unregistered documents");
        }
        info!(
            changes = batch.len(),
            seeds = seeds.len(),
            invalidated = invalidated.len(),
            "invalidation pass"
        );

        let report = InvalidationReport {
            changes: batch.len(),
            seeds,
            invalidated,
            ignored,
        };
        let _ = self.reports.send(report.clone());
        report
    }

    /// Ask the source to stop; the consumer stops once the stream drains.
    pub fn close(&self) {
        self.source.close();
    }

    fn node_for<K: DocKey>(&self, key: &K) -> DocResult<&Node> {
        match self.graph.node(key.index()) {
            Some(node) if node.name() == key.name() => Ok(node),
            _ => Err(DocError::Unregistered {
                name: key.name().to_string(),
                index: key.index(),
            }),
        }
    }

    fn compute(&self, node: &Node) -> DocOutcome {
        let name = node.name();
        debug!(name, "computing document");

        let raw = self.source.get_doc(name).map_err(|err| DocError::Fetch {
            name: name.to_string(),
            reason: err.to_string(),
        })?;

        let docs = Docs::new(self, name, node.dependencies());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (node.parser())(&docs, &raw)))
            .unwrap_or_else(|payload| {
                Err(DocError::Panicked {
                    name: name.to_string(),
                    message: panic_message(payload.as_ref()),
                })
            });

        if let Err(err) = &outcome {
            warn!(name, %err, "document failed for this epoch");
        }
        outcome
    }
}

impl<S: ChangeSource> DocEngine<S> {
    /// Start consuming the source's change batches on a Tokio task.
    ///
    /// Must be called from within a Tokio runtime, once. The task ends when
    /// the source's stream closes. A failed start leaves the engine `Built`.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        self.state
            .compare_exchange(
                EngineState::Built as u8,
                EngineState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| EngineError::AlreadyStarted)?;

        let Some(mut batches) = self.source.watch() else {
            self.state.store(EngineState::Built as u8, Ordering::Release);
            return Err(EngineError::WatchUnavailable);
        };

        info!(documents = self.graph.len(), "invalidation engine started");

        let engine = Arc::clone(self);
        Ok(runtime.spawn(async move {
            while let Some(batch) = batches.recv().await {
                engine.on_batch(&batch);
            }
            let stopped = engine.state.compare_exchange(
                EngineState::Running as u8,
                EngineState::Stopped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            if stopped.is_ok() {
                warn!("change stream closed; documents no longer track external changes");
            }
        }))
    }
}

impl<S: ChangeSource> DocReader for DocEngine<S> {
    fn read_index(&self, index: usize) -> DocOutcome {
        let Some(node) = self.graph.node(index) else {
            return Err(DocError::Unregistered {
                name: String::new(),
                index,
            });
        };
        node.cell().get_or_compute(|| self.compute(node))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
