//! Documents
//!
//! A document is a value derived from raw text by a parser. Each registered
//! document owns a [`DocStore`] that memoizes the parser's outcome until the
//! document is invalidated.
//!
//! Documents of different types share one graph, so the cached value is held
//! type-erased as a [`DocValue`]. The typed view is recovered at the read
//! site with a downcast.
//!
//! Parsers of derived documents receive a [`Docs`] handle through which they
//! read the documents they declared as dependencies.

mod store;

pub use store::DocStore;

use std::any::{self, Any};
use std::fmt::Display;
use std::sync::Arc;

use crate::error::{DocError, DocResult};
use crate::key::DocKey;

/// A parsed document, type-erased.
pub type DocValue = Arc<dyn Any + Send + Sync>;

/// What a document's store caches for one epoch: a value or the error that
/// prevented it.
pub type DocOutcome = Result<DocValue, DocError>;

/// Type-erased parser stored on a graph node.
pub type Parser = Arc<dyn Fn(&Docs<'_>, &str) -> DocOutcome + Send + Sync>;

/// Something that can produce a document's outcome by index.
pub(crate) trait DocReader {
    fn read_index(&self, index: usize) -> DocOutcome;
}

/// Read access to a document's declared dependencies while it is parsed.
///
/// A failed read returns the dependency's own error, so a parser that
/// propagates it with `?` reports the upstream document rather than itself.
pub struct Docs<'a> {
    reader: &'a dyn DocReader,
    name: &'a str,
    dependencies: &'a [usize],
}

impl<'a> Docs<'a> {
    pub(crate) fn new(reader: &'a dyn DocReader, name: &'a str, dependencies: &'a [usize]) -> Self {
        Self {
            reader,
            name,
            dependencies,
        }
    }

    /// Name of the document being parsed.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Read a dependency.
    ///
    /// Only documents declared at registration may be read; anything else
    /// would not invalidate this document when it changes.
    pub fn get<T, K>(&self, key: &K) -> DocResult<Arc<T>>
    where
        T: Any + Send + Sync,
        K: DocKey,
    {
        if !self.dependencies.contains(&key.index()) {
            return Err(DocError::UndeclaredDependency {
                name: self.name.to_string(),
                dependency: key.name().to_string(),
            });
        }
        self.reader
            .read_index(key.index())
            .and_then(|value| downcast(key.name(), value))
    }

    /// A parse error attributed to the document being parsed.
    pub fn parse_error(&self, reason: impl Display) -> DocError {
        DocError::Parse {
            name: self.name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Recover the typed value of a document.
pub(crate) fn downcast<T>(name: &str, value: DocValue) -> DocResult<Arc<T>>
where
    T: Any + Send + Sync,
{
    value.downcast::<T>().map_err(|_| DocError::TypeMismatch {
        name: name.to_string(),
        expected: any::type_name::<T>(),
    })
}

/// Wrap a parser of raw content into a [`Parser`].
///
/// Parse failures are rendered with `Display` and become [`DocError::Parse`].
pub fn erase_parser<T, E, F>(parse: F) -> Parser
where
    T: Any + Send + Sync,
    E: Display,
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
{
    Arc::new(move |docs: &Docs<'_>, raw: &str| match parse(raw) {
        Ok(value) => Ok(Arc::new(value) as DocValue),
        Err(err) => Err(docs.parse_error(err)),
    })
}

/// Wrap a parser that also reads its dependencies into a [`Parser`].
///
/// The parser's error is cached as returned: propagate a dependency failure
/// with `?`, and build its own failures with [`Docs::parse_error`].
pub fn erase_derived_parser<T, F>(parse: F) -> Parser
where
    T: Any + Send + Sync,
    F: Fn(&Docs<'_>, &str) -> DocResult<T> + Send + Sync + 'static,
{
    Arc::new(move |docs: &Docs<'_>, raw: &str| {
        parse(docs, raw).map(|value| Arc::new(value) as DocValue)
    })
}
