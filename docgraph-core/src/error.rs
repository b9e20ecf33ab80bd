//! Error types
//!
//! Errors are split by where they surface:
//!
//! - [`GraphError`]: configuration mistakes found while registering or
//!   building the graph. These are fatal and prevent the engine from starting.
//! - [`DocError`]: a single document failed to load for the current epoch.
//!   The outcome is cached until the document is reset.
//! - [`SourceError`]: failures inside a change source (missing document,
//!   I/O, watcher setup).
//! - [`EngineError`]: lifecycle misuse of the engine.

use std::path::PathBuf;

/// Configuration errors raised by registration and graph build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A key's index does not fit the declared capacity.
    #[error("index {index} for '{name}' is out of range (capacity {capacity})")]
    IndexOutOfRange {
        name: String,
        index: usize,
        capacity: usize,
    },

    /// The same index was registered twice.
    #[error("index {index} registered twice ('{existing}' then '{name}')")]
    DuplicateRegistration {
        index: usize,
        existing: String,
        name: String,
    },

    /// Two different indices were registered under one name.
    #[error("name '{name}' registered for both index {first} and index {second}")]
    DuplicateName {
        name: String,
        first: usize,
        second: usize,
    },

    /// A dependency points at an index that is out of range or was never registered.
    #[error("'{name}' depends on unknown index {dependency}")]
    UnknownDependency { name: String, dependency: usize },

    /// A slot below capacity was never registered.
    #[error("index {index} was never registered")]
    Unregistered { index: usize },

    /// The dependency declarations contain a cycle.
    #[error("dependency cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// A document could not be produced for the current epoch.
///
/// Cloned out of the cache to every reader of the failed epoch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocError {
    /// The change source could not supply raw content.
    #[error("fetch '{name}' failed: {reason}")]
    Fetch { name: String, reason: String },

    /// The parser rejected the raw content.
    #[error("parse '{name}' failed: {reason}")]
    Parse { name: String, reason: String },

    /// The cached value is not of the requested type.
    #[error("document '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// The parser panicked.
    #[error("parser for '{name}' panicked: {message}")]
    Panicked { name: String, message: String },

    /// A parser read a document it did not declare as a dependency.
    #[error("'{name}' read '{dependency}' without declaring it as a dependency")]
    UndeclaredDependency { name: String, dependency: String },

    /// The key does not belong to the graph.
    #[error("no document registered at index {index} ('{name}')")]
    Unregistered { name: String, index: usize },
}

/// Errors produced by a change source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No document with this name is known to the source.
    #[error("unknown document '{0}'")]
    UnknownDocument(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The filesystem watcher could not be created or attached.
    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Lifecycle errors of the invalidation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `start` was called more than once.
    #[error("engine already started")]
    AlreadyStarted,

    /// `start` was called outside a Tokio runtime.
    #[error("no Tokio runtime to run the change consumer on")]
    NoRuntime,

    /// The change source no longer hands out its batch stream.
    #[error("change source stream is unavailable (already taken or closed)")]
    WatchUnavailable,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result alias for graph configuration.
pub type GraphResult<T> = Result<T, GraphError>;

/// Result alias for document reads.
pub type DocResult<T> = Result<T, DocError>;
