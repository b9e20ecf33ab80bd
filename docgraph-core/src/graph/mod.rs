//! Dependency Graph
//!
//! This module implements the graph of documents and the documents they
//! read.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are registered documents, stored in a fixed array indexed by the
//!   key's dense index.
//! - Edges are declared dependencies: if A's parser reads B, A depends on B.
//!
//! When a document changes, we traverse the reverse edges to find every
//! document derived from it and invalidate them.
//!
//! # Lifecycle
//!
//! 1. A [`GraphBuilder`] collects registrations (single-threaded setup).
//! 2. [`GraphBuilder::build`] validates them, materializes the reverse
//!    (`dependents`) edges and assigns topological ranks.
//! 3. The resulting [`DocGraph`] is read-only, apart from each node's
//!    document cell.
//!
//! Configuration mistakes (unknown dependencies, duplicates, cycles) are
//! reported by `register` or `build` and never surface later.

mod node;
mod registry;
mod scheduler;

pub use node::{Edges, Node};
pub use registry::NameRegistry;

use std::any::Any;
use std::fmt::Display;

use tracing::{debug, info};

use crate::doc::{erase_derived_parser, erase_parser, Docs, Parser};
use crate::error::{DocResult, GraphError, GraphResult};
use crate::key::DocKey;
use node::Registration;

/// Collects document registrations before the graph is built.
pub struct GraphBuilder {
    slots: Vec<Option<Registration>>,
    names: NameRegistry,
}

impl GraphBuilder {
    /// Create a builder for documents indexed `0..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            names: NameRegistry::new(),
        }
    }

    /// Number of document slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Register a document, its parser and the documents its parser reads.
    ///
    /// The parser receives the raw content fetched from the change source.
    /// Use [`register_derived`](Self::register_derived) when the parser also
    /// needs the parsed values of its dependencies.
    pub fn register<K, T, E, F>(&mut self, key: &K, parser: F, deps: &[K]) -> GraphResult<()>
    where
        K: DocKey,
        T: Any + Send + Sync,
        E: Display,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    {
        self.register_erased(key, erase_parser(parser), deps)
    }

    /// Register a document whose parser reads its dependencies.
    ///
    /// The parser gets a [`Docs`] handle; reads through it are restricted to
    /// `deps`. Its error is cached as returned.
    pub fn register_derived<K, T, F>(
        &mut self,
        key: &K,
        parser: F,
        deps: &[K],
    ) -> GraphResult<()>
    where
        K: DocKey,
        T: Any + Send + Sync,
        F: Fn(&Docs<'_>, &str) -> DocResult<T> + Send + Sync + 'static,
    {
        self.register_erased(key, erase_derived_parser(parser), deps)
    }

    /// Register a document with an already type-erased parser.
    pub fn register_erased<K: DocKey>(
        &mut self,
        key: &K,
        parser: Parser,
        deps: &[K],
    ) -> GraphResult<()> {
        let index = key.index();
        let name = key.name();
        let capacity = self.slots.len();

        if index >= capacity {
            return Err(GraphError::IndexOutOfRange {
                name: name.to_string(),
                index,
                capacity,
            });
        }
        if let Some(existing) = &self.slots[index] {
            return Err(GraphError::DuplicateRegistration {
                index,
                existing: existing.name.clone(),
                name: name.to_string(),
            });
        }

        let mut dependencies = Edges::new();
        for dep in deps {
            let dependency = dep.index();
            if dependency >= capacity {
                return Err(GraphError::UnknownDependency {
                    name: name.to_string(),
                    dependency,
                });
            }
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }

        self.names.bind(name, index)?;
        debug!(index, name, ?dependencies, "registered document");
        self.slots[index] = Some(Registration {
            name: name.to_string(),
            dependencies,
            parser,
        });
        Ok(())
    }

    /// Validate registrations, build reverse edges and rank every node.
    pub fn build(self) -> GraphResult<DocGraph> {
        let mut nodes = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(registration) => nodes.push(Node::new(index, registration)),
                None => return Err(GraphError::Unregistered { index }),
            }
        }

        for index in 0..nodes.len() {
            let dependencies = nodes[index].dependencies().to_vec();
            for dependency in dependencies {
                nodes[dependency].add_dependent(index);
            }
        }

        let order = scheduler::assign_ranks(&mut nodes)?;
        info!(documents = nodes.len(), "dependency graph built");

        Ok(DocGraph {
            nodes,
            names: self.names,
            order,
        })
    }
}

/// The built, validated dependency graph.
#[derive(Debug)]
pub struct DocGraph {
    nodes: Vec<Node>,
    names: NameRegistry,
    order: Vec<usize>,
}

impl DocGraph {
    /// Number of documents.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Index registered under `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(name)
    }

    pub fn names(&self) -> &NameRegistry {
        &self.names
    }

    pub fn rank(&self, index: usize) -> Option<usize> {
        self.node(index).map(Node::rank)
    }

    pub fn dependencies(&self, index: usize) -> &[usize] {
        self.node(index).map(Node::dependencies).unwrap_or_default()
    }

    pub fn dependents(&self, index: usize) -> &[usize] {
        self.node(index).map(Node::dependents).unwrap_or_default()
    }

    /// All indices, dependencies first.
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// The seeds plus every document that transitively depends on them,
    /// sorted by rank.
    pub fn impact_set<I>(&self, seeds: I) -> Vec<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        scheduler::impact_set(&self.nodes, seeds)
    }
}
