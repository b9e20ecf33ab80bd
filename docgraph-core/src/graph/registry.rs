//! Name Registry
//!
//! Maps document names to node indices. Written during registration, read
//! by the engine to correlate change events with nodes.

use indexmap::IndexMap;

use crate::error::{GraphError, GraphResult};

/// Name-to-index lookup, iterated in registration order.
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    by_name: IndexMap<String, usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `index`.
    ///
    /// Rebinding a name to the index it already has is a no-op; binding it to
    /// a different index is a configuration error.
    pub fn bind(&mut self, name: &str, index: usize) -> GraphResult<()> {
        match self.by_name.get(name) {
            Some(&first) if first != index => Err(GraphError::DuplicateName {
                name: name.to_string(),
                first,
                second: index,
            }),
            Some(_) => Ok(()),
            None => {
                self.by_name.insert(name.to_string(), index);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered names with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_name.iter().map(|(name, &index)| (name.as_str(), index))
    }
}
