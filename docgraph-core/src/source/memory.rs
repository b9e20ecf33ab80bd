//! In-memory change source.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

use super::{BatchReceiver, ChangeBatch, ChangeSource};
use crate::error::SourceError;

/// Documents held in memory, with batches published explicitly.
///
/// Content updates and change notifications are independent: `set_doc`
/// only changes what the next fetch returns, `publish` tells the engine.
pub struct MemorySource {
    docs: RwLock<HashMap<String, String>>,
    sender: Mutex<Option<mpsc::Sender<ChangeBatch>>>,
    receiver: Mutex<Option<BatchReceiver>>,
}

impl MemorySource {
    /// Create a source whose stream buffers up to `buffer` batches.
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        Self {
            docs: RwLock::new(HashMap::new()),
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        }
    }

    /// Seed the source from name/content pairs.
    pub fn with_docs<I, N, C>(buffer: usize, docs: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let source = Self::new(buffer);
        for (name, content) in docs {
            source.set_doc(name, content);
        }
        source
    }

    pub fn set_doc(&self, name: impl Into<String>, content: impl Into<String>) {
        self.docs.write().insert(name.into(), content.into());
    }

    pub fn remove_doc(&self, name: &str) -> Option<String> {
        self.docs.write().remove(name)
    }

    /// Deliver a batch to the consumer.
    ///
    /// Returns `false` if the source is closed or the consumer is gone.
    pub async fn publish(&self, batch: ChangeBatch) -> bool {
        let sender = self.sender.lock().clone();
        match sender {
            Some(tx) => {
                debug!(changes = batch.len(), "publishing batch");
                tx.send(batch).await.is_ok()
            }
            None => false,
        }
    }
}

impl ChangeSource for MemorySource {
    fn get_doc(&self, name: &str) -> Result<String, SourceError> {
        self.docs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::UnknownDocument(name.to_string()))
    }

    fn watch(&self) -> Option<BatchReceiver> {
        self.receiver.lock().take()
    }

    fn close(&self) {
        self.sender.lock().take();
    }
}
