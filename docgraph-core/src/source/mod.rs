//! Change Sources
//!
//! A change source supplies raw document content by name and reports when
//! documents change. The engine consumes the [`ChangeSource`] trait only;
//! two implementations ship with the crate:
//!
//! - [`MemorySource`]: documents held in memory, batches published by hand.
//! - [`FsSource`]: documents are files under a directory tree, batches come
//!   from a debounced filesystem watcher.

mod fs;
mod memory;

pub use fs::FsSource;
pub use memory::MemorySource;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SourceError;

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Write,
    Remove,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            ChangeOp::Create => "create",
            ChangeOp::Write => "write",
            ChangeOp::Remove => "remove",
        };
        f.write_str(op)
    }
}

/// One change to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocChange {
    /// Document name, matched against registered keys.
    pub name: String,

    /// Where the document lives (the containing directory for files).
    pub path: PathBuf,

    pub op: ChangeOp,
}

impl DocChange {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, op: ChangeOp) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            op,
        }
    }
}

/// Changes delivered together, in the order they were observed.
pub type ChangeBatch = Vec<DocChange>;

/// Receiving end of a source's batch stream.
///
/// The stream closing means no further batches will ever arrive.
pub type BatchReceiver = mpsc::Receiver<ChangeBatch>;

/// Supplies raw content and change notifications.
pub trait ChangeSource: Send + Sync + 'static {
    /// Raw content of the named document.
    fn get_doc(&self, name: &str) -> Result<String, SourceError>;

    /// Hand out the batch stream.
    ///
    /// The stream has a single consumer: the first call returns it, later
    /// calls return `None`.
    fn watch(&self) -> Option<BatchReceiver>;

    /// Release resources. No batches are delivered after this returns,
    /// and the stream closes once pending batches are drained.
    fn close(&self);
}
