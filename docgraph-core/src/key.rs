//! Document Keys
//!
//! A key is the caller's identity for a document: a dense index used for
//! array storage and a name used to match change events. The graph never
//! invents keys, it only reads `index()` and `name()`.

use std::fmt;

/// Identity of a registrable document.
///
/// Indices must be dense (`0..capacity`) and stable for the process
/// lifetime. Names must be unique and match the names the change source
/// reports.
///
/// ```rust
/// use docgraph_core::DocKey;
///
/// #[derive(Clone, Copy)]
/// enum Table { Items, Shops }
///
/// impl DocKey for Table {
///     fn index(&self) -> usize { *self as usize }
///     fn name(&self) -> &str {
///         match self {
///             Table::Items => "items",
///             Table::Shops => "shops",
///         }
///     }
/// }
/// ```
pub trait DocKey {
    /// Dense index of this document.
    fn index(&self) -> usize;

    /// Name used to correlate change events.
    fn name(&self) -> &str;
}

impl<K: DocKey + ?Sized> DocKey for &K {
    fn index(&self) -> usize {
        (**self).index()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A plain index/name pair, for callers without their own key type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocName {
    index: usize,
    name: String,
}

impl DocName {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl DocKey for DocName {
    fn index(&self) -> usize {
        self.index
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DocName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}
