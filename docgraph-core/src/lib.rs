//! Docgraph Core
//!
//! This crate keeps a set of named documents that are expensive to parse
//! and that may be derived from each other. It implements:
//!
//! - Lazy, memoized document reads with single-flight computation
//! - A validated dependency graph with topological ranks
//! - Transitive invalidation driven by batches of external change events
//! - Change sources backed by memory or by a watched directory tree
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `doc`: the per-document store and type-erased parsers
//! - `graph`: registration, validation, ranking and impact sets
//! - `engine`: the read path and the change-consuming invalidation loop
//! - `source`: the change source contract and its implementations
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docgraph_core::{DocEngine, DocName, GraphBuilder, MemorySource};
//!
//! let items = DocName::new(0, "items");
//! let mut builder = GraphBuilder::with_capacity(1);
//! builder.register(&items, |raw: &str| Ok::<_, String>(raw.to_uppercase()), &[])?;
//!
//! let source = Arc::new(MemorySource::with_docs(16, [("items", "sword")]));
//! let engine = Arc::new(DocEngine::new(builder.build()?, source));
//! engine.start()?;
//!
//! let value = engine.read::<String, _>(&items)?;
//! assert_eq!(*value, "SWORD");
//! ```

pub mod config;
pub mod doc;
pub mod engine;
pub mod error;
pub mod graph;
pub mod key;
pub mod source;

pub use config::SourceConfig;
pub use doc::{DocOutcome, DocStore, DocValue, Docs};
pub use engine::{DocEngine, EngineState, InvalidationReport};
pub use error::{DocError, DocResult, EngineError, GraphError, GraphResult, SourceError};
pub use graph::{DocGraph, GraphBuilder};
pub use key::{DocKey, DocName};
pub use source::{ChangeBatch, ChangeOp, ChangeSource, DocChange, FsSource, MemorySource};
