//! Filesystem change source.
//!
//! Documents are files with a configured extension anywhere under a root
//! directory; the document name is the file stem. The source keeps a
//! name-to-path map, seeded by walking the tree at startup and kept current
//! from watcher events.
//!
//! Raw watcher events are coalesced: a batch is emitted once the quiet
//! window has passed without any further relevant event.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::{BatchReceiver, ChangeBatch, ChangeOp, ChangeSource, DocChange};
use crate::config::SourceConfig;
use crate::error::SourceError;

type FileMap = DashMap<String, PathBuf>;

/// Change source backed by a watched directory tree.
pub struct FsSource {
    config: SourceConfig,
    files: Arc<FileMap>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    receiver: Mutex<Option<BatchReceiver>>,
}

impl FsSource {
    /// Scan the root, attach a recursive watcher and spawn the debounce task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: SourceConfig) -> Result<Self, SourceError> {
        let files = Arc::new(FileMap::new());
        scan(&config.root, &config.suffix, &files)?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = raw_tx.send(res);
        })?;
        watcher.watch(&config.root, RecursiveMode::Recursive)?;

        let (batch_tx, batch_rx) = mpsc::channel(config.batch_buffer.max(1));
        tokio::spawn(debounce(
            raw_rx,
            batch_tx,
            Arc::clone(&files),
            config.suffix.clone(),
            config.quiet_window(),
        ));

        info!(
            root = %config.root.display(),
            documents = files.len(),
            "fs source watching"
        );

        Ok(Self {
            config,
            files,
            watcher: Mutex::new(Some(watcher)),
            receiver: Mutex::new(Some(batch_rx)),
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Path currently mapped to `name`.
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        self.files.get(name).map(|entry| entry.value().clone())
    }

    /// Names of every known document, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl ChangeSource for FsSource {
    fn get_doc(&self, name: &str) -> Result<String, SourceError> {
        let Some(path) = self.path_of(name) else {
            error!(name, "fs source: no file for document");
            return Err(SourceError::UnknownDocument(name.to_string()));
        };
        std::fs::read_to_string(&path).map_err(|source| {
            error!(name, path = %path.display(), %source, "fs source: read failed");
            SourceError::Io { path, source }
        })
    }

    fn watch(&self) -> Option<BatchReceiver> {
        self.receiver.lock().take()
    }

    fn close(&self) {
        if self.watcher.lock().take().is_some() {
            info!(root = %self.config.root.display(), "fs source closed");
        }
    }
}

/// Walk `root` and map every matching file's stem to its path.
fn scan(root: &Path, suffix: &str, files: &FileMap) -> Result<(), SourceError> {
    std::fs::metadata(root).map_err(|source| SourceError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                info!(%err, "fs source ignore");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            debug!(path = %entry.path().display(), "fs source scan directory");
            continue;
        }
        if let Some(name) = doc_name(entry.path(), suffix) {
            files.insert(name, entry.path().to_path_buf());
        }
    }
    Ok(())
}

/// Document name for `path`, if it carries the document suffix.
fn doc_name(path: &Path, suffix: &str) -> Option<String> {
    if path.extension()?.to_str()? != suffix {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

/// Turn one raw watcher event into document changes, updating the file map.
fn classify(event: &Event, suffix: &str, files: &FileMap, out: &mut ChangeBatch) {
    for path in &event.paths {
        let Some(name) = doc_name(path, suffix) else {
            continue;
        };

        let op = match &event.kind {
            EventKind::Create(_) => ChangeOp::Create,
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.exists() {
                    ChangeOp::Create
                } else {
                    ChangeOp::Remove
                }
            }
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => ChangeOp::Write,
            EventKind::Remove(_) => ChangeOp::Remove,
            _ => continue,
        };

        match op {
            ChangeOp::Remove => {
                files.remove(&name);
            }
            ChangeOp::Create | ChangeOp::Write => {
                files.insert(name.clone(), path.clone());
            }
        }

        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        out.push(DocChange::new(name, dir, op));
    }
}

/// Coalesce raw events into batches separated by a quiet window.
async fn debounce(
    mut raw: mpsc::UnboundedReceiver<notify::Result<Event>>,
    out: mpsc::Sender<ChangeBatch>,
    files: Arc<FileMap>,
    suffix: String,
    window: Duration,
) {
    let mut pending = ChangeBatch::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let quiet = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = raw.recv() => match event {
                Some(Ok(event)) => {
                    let before = pending.len();
                    classify(&event, &suffix, &files, &mut pending);
                    if pending.len() > before {
                        deadline = Some(Instant::now() + window);
                    }
                }
                Some(Err(err)) => warn!(%err, "fs source watcher error"),
                None => break,
            },
            _ = quiet => {
                deadline = None;
                let batch = std::mem::take(&mut pending);
                info!(changes = batch.len(), "fs source updates");
                if out.send(batch).await.is_err() {
                    debug!("fs source consumer gone");
                    return;
                }
            }
        }
    }

    // Closed sources deliver nothing more.
    if !pending.is_empty() {
        info!(changes = pending.len(), "fs source dropping pending changes on close");
    }
    debug!("fs source debounce task finished");
}
