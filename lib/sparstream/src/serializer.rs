use crate::binding::Binding;
use crate::error::{Mode, SerializeError};
use crate::format::Format;
use crate::parser::StreamingParser;
use crate::registry;
use crate::results::{QueryResults, ResultKind, SolutionSet, Solutions, Triples};
use sparterm::{Graph, Namespaces, Triple, Variable};
use std::io::{self, Read, Write};
use std::mem::take;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Output is handed out in chunks of about this size.
///
/// Encoders stop filling a chunk once it reaches this size, so a chunk may exceed it by one record.
pub const CHUNK_SOFT_LIMIT: usize = 64 * 1024;

static PASS_THROUGH_COUNT: AtomicU64 = AtomicU64::new(0);
static RE_ENCODED_COUNT: AtomicU64 = AtomicU64::new(0);

/// Counts of the serializers built by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializerStats {
    /// Serializers copying their source bytes verbatim.
    pub pass_through: u64,
    /// Serializers decoding their source and encoding it again.
    pub re_encoded: u64,
}

/// Returns how many serializers have been built so far, by kind.
pub fn serializer_stats() -> SerializerStats {
    SerializerStats {
        pass_through: PASS_THROUGH_COUNT.load(Ordering::Relaxed),
        re_encoded: RE_ENCODED_COUNT.load(Ordering::Relaxed),
    }
}

/// Settings shared by the encoders.
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    namespaces: Namespaces,
}

impl SerializerConfig {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefixes RDF/XML output may declare.
    #[inline]
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    #[inline]
    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            namespaces: Namespaces::common(),
        }
    }
}

/// Encoder for the formats of the SPARQL results family.
pub(crate) trait SolutionsWriter: Send {
    /// Writes a complete boolean document.
    fn write_boolean(&mut self, value: bool, output: &mut Vec<u8>) -> Result<(), SerializeError>;

    fn write_head(&mut self, fields: &[Variable], output: &mut Vec<u8>)
    -> Result<(), SerializeError>;

    fn write_binding(&mut self, binding: &Binding, output: &mut Vec<u8>)
    -> Result<(), SerializeError>;

    fn write_tail(&mut self, _output: &mut Vec<u8>) -> Result<(), SerializeError> {
        Ok(())
    }
}

/// Encoder for the graph formats.
pub(crate) trait TriplesWriter: Send {
    fn write_head(&mut self, _output: &mut Vec<u8>) -> Result<(), SerializeError> {
        Ok(())
    }

    fn write_triple(&mut self, triple: &Triple, output: &mut Vec<u8>)
    -> Result<(), SerializeError>;

    fn write_tail(&mut self, _output: &mut Vec<u8>) -> Result<(), SerializeError> {
        Ok(())
    }
}

pub(crate) enum ResultsWriter {
    Solutions(Box<dyn SolutionsWriter>),
    Triples(Box<dyn TriplesWriter>),
}

/// Builds the encoder of a format.
pub(crate) type ResultsSerializer = fn(&SerializerConfig) -> ResultsWriter;

/// Anything a [`StreamingSerializer`] can encode.
pub enum ResultSource {
    Boolean(bool),
    Solutions(Solutions),
    Triples(Triples),
    /// A parser, copied verbatim when the target format is its own.
    Parser(StreamingParser),
}

impl From<bool> for ResultSource {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Solutions> for ResultSource {
    #[inline]
    fn from(solutions: Solutions) -> Self {
        Self::Solutions(solutions)
    }
}

impl From<SolutionSet> for ResultSource {
    #[inline]
    fn from(solutions: SolutionSet) -> Self {
        Self::Solutions(solutions.into())
    }
}

impl From<Triples> for ResultSource {
    #[inline]
    fn from(triples: Triples) -> Self {
        Self::Triples(triples)
    }
}

impl From<Graph> for ResultSource {
    #[inline]
    fn from(graph: Graph) -> Self {
        Self::Triples(graph.into())
    }
}

impl From<QueryResults> for ResultSource {
    fn from(results: QueryResults) -> Self {
        match results {
            QueryResults::Boolean(value) => value.into(),
            QueryResults::Solutions(solutions) => solutions.into(),
            QueryResults::Graph(graph) => graph.into(),
        }
    }
}

impl From<StreamingParser> for ResultSource {
    #[inline]
    fn from(parser: StreamingParser) -> Self {
        Self::Parser(parser)
    }
}

impl ResultSource {
    fn kind(&mut self) -> Result<ResultKind, SerializeError> {
        Ok(match self {
            Self::Boolean(_) => ResultKind::Boolean,
            Self::Solutions(_) => ResultKind::ResultSet,
            Self::Triples(_) => ResultKind::Graph,
            Self::Parser(parser) => parser.classify()?,
        })
    }
}

/// Encodes a result into a wire format, as a lazy sequence of byte chunks.
///
/// When the source is a [`StreamingParser`] of the same format that has not been parsed,
/// its bytes are copied as they are instead of being decoded and encoded again.
///
/// ```
/// use sparstream::{Format, StreamingSerializer};
///
/// let mut output = Vec::new();
/// StreamingSerializer::new(Format::Csv, true)?.write_to(&mut output)?;
/// assert_eq!(output, b"true\n");
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub struct StreamingSerializer {
    format: Format,
    body: Body,
}

enum Body {
    PassThrough(Box<dyn Read + Send>),
    Boolean(bool, Box<dyn SolutionsWriter>),
    Solutions(Solutions, Box<dyn SolutionsWriter>),
    Triples(Triples, Box<dyn TriplesWriter>),
}

impl StreamingSerializer {
    /// Builds a serializer with the default [`SerializerConfig`].
    pub fn new(format: Format, source: impl Into<ResultSource>) -> Result<Self, SerializeError> {
        Self::with_config(format, source, &SerializerConfig::default())
    }

    /// Builds a serializer.
    ///
    /// Fails right away if the format can't represent the kind of the source.
    pub fn with_config(
        format: Format,
        source: impl Into<ResultSource>,
        config: &SerializerConfig,
    ) -> Result<Self, SerializeError> {
        let mut source = source.into();
        if let ResultSource::Parser(parser) = source {
            if parser.format() == format && parser.mode() != Mode::Parsing {
                PASS_THROUGH_COUNT.fetch_add(1, Ordering::Relaxed);
                trace!("Copying the {format} stream as it is");
                return Ok(Self {
                    format,
                    body: Body::PassThrough(parser.into_raw()?),
                });
            }
            source = ResultSource::Parser(parser);
        }
        let build_writer = registry::lookup_format(format)
            .and_then(registry::FormatEntry::serializer)
            .ok_or(SerializeError::NoSerializer(format))?;
        let kind = source.kind()?;
        if !format.supports(kind) {
            return Err(SerializeError::UnsupportedKind { format, kind });
        }
        let body = match (build_writer(config), source) {
            (ResultsWriter::Solutions(writer), ResultSource::Boolean(value)) => {
                Body::Boolean(value, writer)
            }
            (ResultsWriter::Solutions(writer), ResultSource::Solutions(solutions)) => {
                Body::Solutions(solutions, writer)
            }
            (ResultsWriter::Triples(writer), ResultSource::Triples(triples)) => {
                Body::Triples(triples, writer)
            }
            (ResultsWriter::Solutions(writer), ResultSource::Parser(mut parser)) => {
                if kind == ResultKind::Boolean {
                    Body::Boolean(parser.boolean()?, writer)
                } else {
                    Body::Solutions(parser.bindings()?, writer)
                }
            }
            (ResultsWriter::Triples(writer), ResultSource::Parser(mut parser)) => {
                Body::Triples(parser.triples()?, writer)
            }
            (ResultsWriter::Triples(_), ResultSource::Boolean(_) | ResultSource::Solutions(_))
            | (ResultsWriter::Solutions(_), ResultSource::Triples(_)) => {
                return Err(SerializeError::UnsupportedKind { format, kind });
            }
        };
        RE_ENCODED_COUNT.fetch_add(1, Ordering::Relaxed);
        Ok(Self { format, body })
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Whether the source bytes are copied without being decoded.
    #[inline]
    pub fn is_pass_through(&self) -> bool {
        matches!(self.body, Body::PassThrough(_))
    }

    /// The media type of the produced bytes.
    #[inline]
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    /// Returns the encoded output as a lazy sequence of chunks.
    pub fn produce(self) -> Chunks {
        Chunks {
            state: match self.body {
                Body::PassThrough(reader) => ChunksState::PassThrough(reader),
                Body::Boolean(value, writer) => ChunksState::Boolean(value, writer),
                Body::Solutions(solutions, writer) => ChunksState::Solutions {
                    solutions,
                    writer,
                    started: false,
                },
                Body::Triples(triples, writer) => ChunksState::Triples {
                    triples,
                    writer,
                    started: false,
                },
            },
            buffer: Vec::new(),
        }
    }

    /// Writes the whole output and returns the writer.
    pub fn write_to<W: Write>(self, mut writer: W) -> Result<W, SerializeError> {
        for chunk in self.produce() {
            writer.write_all(&chunk?)?;
        }
        writer.flush()?;
        Ok(writer)
    }
}

/// The chunks of a [`StreamingSerializer`] output.
///
/// Each chunk holds at most [`CHUNK_SOFT_LIMIT`] bytes plus the last encoded record.
/// An error ends the sequence.
#[must_use]
pub struct Chunks {
    state: ChunksState,
    buffer: Vec<u8>,
}

enum ChunksState {
    PassThrough(Box<dyn Read + Send>),
    Boolean(bool, Box<dyn SolutionsWriter>),
    Solutions {
        solutions: Solutions,
        writer: Box<dyn SolutionsWriter>,
        started: bool,
    },
    Triples {
        triples: Triples,
        writer: Box<dyn TriplesWriter>,
        started: bool,
    },
    Done,
}

impl Chunks {
    /// Fills the buffer up to the soft limit, returns `true` when the output is complete.
    fn fill(&mut self) -> Result<bool, SerializeError> {
        while self.buffer.len() < CHUNK_SOFT_LIMIT {
            match &mut self.state {
                ChunksState::Done => return Ok(true),
                ChunksState::PassThrough(reader) => {
                    let start = self.buffer.len();
                    self.buffer.resize(CHUNK_SOFT_LIMIT, 0);
                    let read = loop {
                        match reader.read(&mut self.buffer[start..]) {
                            Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
                            result => break result,
                        }
                    };
                    match read {
                        Ok(0) => {
                            self.buffer.truncate(start);
                            return Ok(true);
                        }
                        Ok(read) => {
                            // Raw bytes are handed out as soon as they arrive
                            self.buffer.truncate(start + read);
                            return Ok(false);
                        }
                        Err(e) => {
                            self.buffer.truncate(start);
                            return Err(e.into());
                        }
                    }
                }
                ChunksState::Boolean(value, writer) => {
                    writer.write_boolean(*value, &mut self.buffer)?;
                    return Ok(true);
                }
                ChunksState::Solutions {
                    solutions,
                    writer,
                    started,
                } => {
                    if !*started {
                        writer.write_head(solutions.fields(), &mut self.buffer)?;
                        *started = true;
                    }
                    match solutions.next() {
                        Some(binding) => writer.write_binding(&binding?, &mut self.buffer)?,
                        None => {
                            writer.write_tail(&mut self.buffer)?;
                            return Ok(true);
                        }
                    }
                }
                ChunksState::Triples {
                    triples,
                    writer,
                    started,
                } => {
                    if !*started {
                        writer.write_head(&mut self.buffer)?;
                        *started = true;
                    }
                    match triples.next() {
                        Some(triple) => writer.write_triple(&triple?, &mut self.buffer)?,
                        None => {
                            writer.write_tail(&mut self.buffer)?;
                            return Ok(true);
                        }
                    }
                }
            }
        }
        Ok(false)
    }
}

impl Iterator for Chunks {
    type Item = Result<Vec<u8>, SerializeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.fill() {
            Ok(true) => self.state = ChunksState::Done,
            Ok(false) => (),
            Err(error) => {
                self.state = ChunksState::Done;
                self.buffer.clear();
                return Some(Err(error));
            }
        }
        if self.buffer.is_empty() {
            None
        } else {
            Some(Ok(take(&mut self.buffer)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparterm::{Literal, NamedNode};
    use std::sync::Arc;

    fn solutions(count: usize) -> SolutionSet {
        let fields: Arc<[Variable]> = vec![Variable::new_unchecked("v")].into();
        let bindings = (0..count)
            .map(|i| {
                Binding::new(
                    Arc::clone(&fields),
                    vec![Some(Literal::new_simple_literal(i.to_string()).into())],
                )
            })
            .collect();
        SolutionSet::new(fields, bindings)
    }

    #[test]
    fn large_outputs_are_chunked() -> Result<(), SerializeError> {
        let chunks = StreamingSerializer::new(Format::Csv, solutions(50_000))?
            .produce()
            .collect::<Result<Vec<_>, _>>()?;
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() < CHUNK_SOFT_LIMIT + 64);
        }
        let total = chunks.concat();
        assert!(total.starts_with(b"v\n0\n1\n"));
        assert!(total.ends_with(b"49999\n"));
        Ok(())
    }

    #[test]
    fn unsupported_kind_fails_right_away() {
        let graph: Graph = [Triple::new(
            NamedNode::new_unchecked("http://e.com/s"),
            NamedNode::new_unchecked("http://e.com/p"),
            NamedNode::new_unchecked("http://e.com/o"),
        )]
        .into_iter()
        .collect();
        assert!(matches!(
            StreamingSerializer::new(Format::Csv, graph),
            Err(SerializeError::UnsupportedKind {
                format: Format::Csv,
                kind: ResultKind::Graph
            })
        ));
        assert!(matches!(
            StreamingSerializer::new(Format::NTriples, true),
            Err(SerializeError::UnsupportedKind { .. })
        ));
    }

    #[test]
    fn pass_through_copies_bytes() -> Result<(), SerializeError> {
        let before = serializer_stats();
        let body: &'static [u8] = b"not even { valid json";
        let serializer =
            StreamingSerializer::new(Format::SparqlJson, StreamingParser::new(Format::SparqlJson, body))?;
        assert!(serializer.is_pass_through());
        assert_eq!(serializer.write_to(Vec::new())?, body);
        assert!(serializer_stats().pass_through > before.pass_through);
        Ok(())
    }

    #[test]
    fn re_encoding_is_counted() -> Result<(), SerializeError> {
        let before = serializer_stats();
        let serializer = StreamingSerializer::new(Format::SparqlJson, false)?;
        assert!(!serializer.is_pass_through());
        assert!(serializer_stats().re_encoded > before.re_encoded);
        Ok(())
    }
}
