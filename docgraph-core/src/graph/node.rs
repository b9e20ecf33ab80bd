//! Graph Nodes
//!
//! This module defines the node records that live in the dependency graph,
//! one per registered document.

use std::fmt;

use smallvec::SmallVec;

use crate::doc::{DocOutcome, DocStore, Parser};

/// Edge list. Most documents read only a handful of others.
pub type Edges = SmallVec<[usize; 4]>;

/// What `GraphBuilder::register` records for one index.
pub(crate) struct Registration {
    pub(crate) name: String,
    pub(crate) dependencies: Edges,
    pub(crate) parser: Parser,
}

/// A node in the dependency graph.
///
/// Everything except the cell is fixed at build time.
pub struct Node {
    /// Dense index of the document.
    index: usize,

    /// Document name, as reported by the change source.
    name: String,

    /// Nodes this node's parser reads before itself.
    dependencies: Edges,

    /// Nodes that declared this node as a dependency.
    dependents: Edges,

    /// Position in the topological order.
    rank: usize,

    parser: Parser,

    cell: DocStore<DocOutcome>,
}

impl Node {
    pub(crate) fn new(index: usize, registration: Registration) -> Self {
        Self {
            index,
            name: registration.name,
            dependencies: registration.dependencies,
            dependents: Edges::new(),
            rank: 0,
            parser: registration.parser,
            cell: DocStore::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indices this node depends on.
    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }

    /// Indices that depend on this node.
    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }

    /// Topological rank. Dependencies always rank below their dependents.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub(crate) fn parser(&self) -> &Parser {
        &self.parser
    }

    pub(crate) fn cell(&self) -> &DocStore<DocOutcome> {
        &self.cell
    }

    pub(crate) fn add_dependent(&mut self, index: usize) {
        if !self.dependents.contains(&index) {
            self.dependents.push(index);
        }
    }

    pub(crate) fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("rank", &self.rank)
            .field("cached", &self.cell.is_ready())
            .finish()
    }
}
