use crate::binding::Binding;
use crate::error::ParseError;
use sparterm::{Graph, Triple, Variable};
use std::fmt;
use std::sync::Arc;

/// The three shapes a result can take, decided once when the stream is classified.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ResultKind {
    /// The answer of an `ASK` query.
    Boolean,
    /// The answer of a `SELECT` query: fields and bindings.
    ResultSet,
    /// The answer of a `CONSTRUCT` or `DESCRIBE` query: triples.
    Graph,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Boolean => "boolean",
            Self::ResultSet => "result set",
            Self::Graph => "graph",
        })
    }
}

/// A fully materialized result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResults {
    Boolean(bool),
    Solutions(SolutionSet),
    Graph(Graph),
}

impl QueryResults {
    #[inline]
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Boolean(_) => ResultKind::Boolean,
            Self::Solutions(_) => ResultKind::ResultSet,
            Self::Graph(_) => ResultKind::Graph,
        }
    }
}

impl From<bool> for QueryResults {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<SolutionSet> for QueryResults {
    #[inline]
    fn from(value: SolutionSet) -> Self {
        Self::Solutions(value)
    }
}

impl From<Graph> for QueryResults {
    #[inline]
    fn from(value: Graph) -> Self {
        Self::Graph(value)
    }
}

/// An in-memory result set: the ordered fields and every binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionSet {
    fields: Arc<[Variable]>,
    bindings: Vec<Binding>,
}

impl SolutionSet {
    pub fn new(fields: impl Into<Arc<[Variable]>>, bindings: Vec<Binding>) -> Self {
        Self {
            fields: fields.into(),
            bindings,
        }
    }

    /// The ordered fields of the result set.
    #[inline]
    pub fn fields(&self) -> &[Variable] {
        &self.fields
    }

    #[inline]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// A lazy stream over a copy of this result set.
    pub fn to_stream(&self) -> Solutions {
        Solutions::new(
            Arc::clone(&self.fields),
            self.bindings.clone().into_iter().map(Ok),
        )
    }
}

impl<'a> IntoIterator for &'a SolutionSet {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

/// A lazy, single-consumption stream of [`Binding`]s sharing the same fields.
///
/// Bindings are yielded in the order the source produced them.
pub struct Solutions {
    fields: Arc<[Variable]>,
    inner: Box<dyn Iterator<Item = Result<Binding, ParseError>> + Send>,
}

impl Solutions {
    pub fn new(
        fields: impl Into<Arc<[Variable]>>,
        inner: impl Iterator<Item = Result<Binding, ParseError>> + Send + 'static,
    ) -> Self {
        Self {
            fields: fields.into(),
            inner: Box::new(inner),
        }
    }

    /// The ordered fields of the result set.
    #[inline]
    pub fn fields(&self) -> &[Variable] {
        &self.fields
    }

    pub(crate) fn shared_fields(&self) -> Arc<[Variable]> {
        Arc::clone(&self.fields)
    }

    /// Consumes the stream into an in-memory [`SolutionSet`].
    pub fn collect_set(self) -> Result<SolutionSet, ParseError> {
        let fields = Arc::clone(&self.fields);
        Ok(SolutionSet {
            fields,
            bindings: self.collect::<Result<_, _>>()?,
        })
    }
}

impl From<SolutionSet> for Solutions {
    fn from(set: SolutionSet) -> Self {
        Self::new(set.fields, set.bindings.into_iter().map(Ok))
    }
}

impl Iterator for Solutions {
    type Item = Result<Binding, ParseError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A lazy, single-consumption stream of [`Triple`]s.
///
/// Triples are yielded in the order the source produced them.
pub struct Triples {
    inner: Box<dyn Iterator<Item = Result<Triple, ParseError>> + Send>,
}

impl Triples {
    pub fn new(inner: impl Iterator<Item = Result<Triple, ParseError>> + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// Consumes the stream into an in-memory [`Graph`].
    pub fn collect_graph(self) -> Result<Graph, ParseError> {
        self.collect()
    }
}

impl Iterator for Triples {
    type Item = Result<Triple, ParseError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl From<Graph> for Triples {
    fn from(graph: Graph) -> Self {
        Self::new(graph.into_iter().map(Ok))
    }
}

/// What a parser has found at the start of a stream.
pub(crate) enum ParsedResults {
    Boolean(bool),
    Solutions(Solutions),
    Graph(Triples),
}

impl ParsedResults {
    pub(crate) fn kind(&self) -> ResultKind {
        match self {
            Self::Boolean(_) => ResultKind::Boolean,
            Self::Solutions(_) => ResultKind::ResultSet,
            Self::Graph(_) => ResultKind::Graph,
        }
    }
}
