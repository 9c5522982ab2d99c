use crate::error::{Mode, ParseError, StreamError, SyntaxError};
use crate::format::Format;
use crate::registry;
use crate::results::{ParsedResults, QueryResults, ResultKind, Solutions, Triples};
use sparterm::{Triple, Variable};
use std::io::{self, BufReader, Read};
use std::mem::replace;
use std::sync::Arc;
use tracing::debug;

const SUPPORTED_CHARSETS: [&str; 3] = ["utf-8", "utf8", "us-ascii"];

/// A result stream in some [`Format`], read at most once.
///
/// The stream is either copied as raw bytes through [`Read`] (or [`into_raw`](Self::into_raw))
/// or parsed after [`classify`](Self::classify), never both: the first use fixes the [`Mode`].
/// The lazy [`bindings`](Self::bindings) and [`triples`](Self::triples) can be taken only once
/// unless the result has been materialized with [`get`](Self::get).
///
/// ```
/// use sparstream::{Format, ResultKind, StreamingParser};
///
/// let data = r#"{"head":{"vars":["s"]},"results":{"bindings":[{"s":{"type":"uri","value":"http://example.com/"}}]}}"#;
/// let mut parser = StreamingParser::new(Format::SparqlJson, data.as_bytes());
/// assert_eq!(parser.classify()?, ResultKind::ResultSet);
/// assert_eq!(parser.fields()?[0].as_str(), "s");
/// for binding in parser.bindings()? {
///     assert_eq!(binding?.get("s").unwrap().to_lexical(), "http://example.com/");
/// }
/// assert!(parser.bindings().is_err()); // already consumed
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub struct StreamingParser {
    format: Format,
    charset: String,
    mode: Mode,
    state: State,
}

enum State {
    Unread(Box<dyn Read + Send>),
    Boolean(bool),
    /// The bindings are `None` once handed out.
    Solutions(Arc<[Variable]>, Option<Solutions>),
    Graph(Option<Triples>),
    Materialized(QueryResults),
    /// Classification or materialization failed with this message: nothing is left to read.
    Failed(String),
}

impl StreamingParser {
    /// Wraps a stream of the given format, in UTF-8.
    pub fn new(format: Format, reader: impl Read + Send + 'static) -> Self {
        Self {
            format,
            charset: "utf-8".into(),
            mode: Mode::Unset,
            state: State::Unread(Box::new(reader)),
        }
    }

    /// Sets the charset announced with the stream, like the `charset` parameter of a `Content-Type` header.
    ///
    /// Only UTF-8 and its ASCII subset are supported: others fail at classification.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    #[inline]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Reads just enough of the stream to know what it holds.
    ///
    /// Switches to [`Mode::Parsing`]. Later calls return the same kind without reading anything.
    pub fn classify(&mut self) -> Result<ResultKind, StreamError> {
        if self.mode == Mode::RawStream {
            return Err(StreamError::ModeConflict {
                current: Mode::RawStream,
                requested: Mode::Parsing,
            });
        }
        self.mode = Mode::Parsing;
        let reader = match replace(&mut self.state, State::Failed(String::new())) {
            State::Unread(reader) => reader,
            State::Failed(message) => return Err(self.failed_again(message)),
            state => {
                self.state = state;
                return Ok(self.kind());
            }
        };
        let parsed = match self.parse(reader) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Failed to classify the {} stream: {e}", self.format);
                return Err(self.fail(e));
            }
        };
        self.state = match parsed {
            ParsedResults::Boolean(value) => State::Boolean(value),
            ParsedResults::Solutions(solutions) => {
                State::Solutions(solutions.shared_fields(), Some(solutions))
            }
            ParsedResults::Graph(triples) => State::Graph(Some(Triples::new(
                triples.map(|triple| triple.map(Triple::with_encoded_iris)),
            ))),
        };
        let kind = self.kind();
        debug!("Classified the {} stream as a {kind} result", self.format);
        Ok(kind)
    }

    fn parse(&self, reader: Box<dyn Read + Send>) -> Result<ParsedResults, ParseError> {
        let charset = self.charset.trim().to_ascii_lowercase();
        if !SUPPORTED_CHARSETS.contains(&charset.as_str()) {
            return Err(SyntaxError::msg(format!(
                "The charset {} is not supported, only UTF-8 is",
                self.charset
            ))
            .into());
        }
        let parser = registry::lookup_format(self.format)
            .and_then(registry::FormatEntry::parser)
            .ok_or_else(|| SyntaxError::msg(format!("There is no parser for {}", self.format)))?;
        parser(Box::new(BufReader::new(reader)))
    }

    fn kind(&self) -> ResultKind {
        match &self.state {
            State::Boolean(_) => ResultKind::Boolean,
            State::Solutions(..) => ResultKind::ResultSet,
            State::Graph(_) => ResultKind::Graph,
            State::Materialized(results) => results.kind(),
            // Callers classify first
            State::Unread(_) | State::Failed(_) => ResultKind::Graph,
        }
    }

    /// Records the failure for the later calls.
    fn fail(&mut self, error: impl Into<StreamError>) -> StreamError {
        let error = error.into();
        self.state = State::Failed(error.to_string());
        error
    }

    fn failed_again(&mut self, message: String) -> StreamError {
        let error = StreamError::Failed(message.clone());
        self.state = State::Failed(message);
        error
    }

    fn wrong_kind(&self, expected: ResultKind) -> StreamError {
        StreamError::WrongKind {
            expected,
            actual: self.kind(),
        }
    }

    /// The ordered fields of a result set.
    pub fn fields(&mut self) -> Result<&[Variable], StreamError> {
        self.classify()?;
        match &self.state {
            State::Solutions(fields, _) => Ok(fields),
            State::Materialized(QueryResults::Solutions(solutions)) => Ok(solutions.fields()),
            _ => Err(self.wrong_kind(ResultKind::ResultSet)),
        }
    }

    /// The value of a boolean result.
    pub fn boolean(&mut self) -> Result<bool, StreamError> {
        self.classify()?;
        match &self.state {
            State::Boolean(value) | State::Materialized(QueryResults::Boolean(value)) => Ok(*value),
            _ => Err(self.wrong_kind(ResultKind::Boolean)),
        }
    }

    /// The lazy bindings of a result set.
    ///
    /// Fails with [`StreamError::StreamReplay`] on a second call, unless [`get`](Self::get) has been called.
    pub fn bindings(&mut self) -> Result<Solutions, StreamError> {
        self.classify()?;
        match &mut self.state {
            State::Solutions(_, solutions) => solutions.take().ok_or(StreamError::StreamReplay),
            State::Materialized(QueryResults::Solutions(solutions)) => Ok(solutions.to_stream()),
            _ => Err(self.wrong_kind(ResultKind::ResultSet)),
        }
    }

    /// The lazy triples of a graph, with their IRIs percent-encoded.
    ///
    /// Fails with [`StreamError::StreamReplay`] on a second call, unless [`get`](Self::get) has been called.
    pub fn triples(&mut self) -> Result<Triples, StreamError> {
        self.classify()?;
        match &mut self.state {
            State::Graph(triples) => triples.take().ok_or(StreamError::StreamReplay),
            State::Materialized(QueryResults::Graph(graph)) => Ok(graph.clone().into()),
            _ => Err(self.wrong_kind(ResultKind::Graph)),
        }
    }

    /// Reads the whole result into memory, once, and returns it.
    pub fn get(&mut self) -> Result<&QueryResults, StreamError> {
        self.materialize()?;
        match &self.state {
            State::Materialized(results) => Ok(results),
            _ => Err(StreamError::StreamReplay),
        }
    }

    /// Reads the whole result into memory and returns it.
    pub fn into_results(mut self) -> Result<QueryResults, StreamError> {
        self.materialize()?;
        match self.state {
            State::Materialized(results) => Ok(results),
            _ => Err(StreamError::StreamReplay),
        }
    }

    fn materialize(&mut self) -> Result<(), StreamError> {
        self.classify()?;
        let results = match replace(&mut self.state, State::Failed(String::new())) {
            State::Boolean(value) => QueryResults::Boolean(value),
            State::Solutions(_, Some(solutions)) => {
                solutions.collect_set().map_err(|e| self.fail(e))?.into()
            }
            State::Graph(Some(triples)) => triples.collect_graph().map_err(|e| self.fail(e))?.into(),
            state @ (State::Materialized(_) | State::Solutions(_, None) | State::Graph(None)) => {
                let is_materialized = matches!(state, State::Materialized(_));
                self.state = state;
                return if is_materialized {
                    Ok(())
                } else {
                    Err(StreamError::StreamReplay)
                };
            }
            State::Failed(message) => return Err(self.failed_again(message)),
            state @ State::Unread(_) => {
                self.state = state;
                return Err(StreamError::StreamReplay);
            }
        };
        self.state = State::Materialized(results);
        Ok(())
    }

    /// Returns the unread stream, for a verbatim copy.
    ///
    /// Fails if the stream has been classified.
    pub fn into_raw(self) -> Result<Box<dyn Read + Send>, StreamError> {
        match self.state {
            State::Unread(reader) if self.mode != Mode::Parsing => Ok(reader),
            _ => Err(StreamError::ModeConflict {
                current: self.mode,
                requested: Mode::RawStream,
            }),
        }
    }
}

/// Raw access to the stream bytes. Switches to [`Mode::RawStream`].
impl Read for StreamingParser {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.mode == Mode::Parsing {
            return Err(StreamError::ModeConflict {
                current: Mode::Parsing,
                requested: Mode::RawStream,
            }
            .into());
        }
        self.mode = Mode::RawStream;
        match &mut self.state {
            State::Unread(reader) => reader.read(buf),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparterm::NamedNode;

    const SRJ: &str = r#"{"head":{"vars":["x"]},"results":{"bindings":[{"x":{"type":"literal","value":"1"}},{}]}}"#;

    #[test]
    fn classify_is_cached() -> Result<(), StreamError> {
        let mut parser = StreamingParser::new(Format::SparqlJson, SRJ.as_bytes());
        assert_eq!(parser.mode(), Mode::Unset);
        assert_eq!(parser.classify()?, ResultKind::ResultSet);
        assert_eq!(parser.classify()?, ResultKind::ResultSet);
        assert_eq!(parser.mode(), Mode::Parsing);
        assert_eq!(parser.fields()?.len(), 1);
        assert_eq!(parser.bindings()?.count(), 2);
        Ok(())
    }

    #[test]
    fn bindings_are_taken_once() -> Result<(), StreamError> {
        let mut parser = StreamingParser::new(Format::SparqlJson, SRJ.as_bytes());
        drop(parser.bindings()?);
        assert!(matches!(parser.bindings(), Err(StreamError::StreamReplay)));
        assert!(matches!(parser.get(), Err(StreamError::StreamReplay)));
        Ok(())
    }

    #[test]
    fn materialized_results_can_be_read_again() -> Result<(), StreamError> {
        let mut parser = StreamingParser::new(Format::SparqlJson, SRJ.as_bytes());
        let QueryResults::Solutions(solutions) = parser.get()? else {
            panic!("solutions expected")
        };
        assert_eq!(solutions.len(), 2);
        assert_eq!(parser.bindings()?.count(), 2);
        assert_eq!(parser.bindings()?.count(), 2);
        assert!(matches!(
            parser.into_results()?,
            QueryResults::Solutions(solutions) if solutions.len() == 2
        ));
        Ok(())
    }

    #[test]
    fn raw_and_parsed_modes_exclude_each_other() -> Result<(), StreamError> {
        let mut parser = StreamingParser::new(Format::SparqlJson, SRJ.as_bytes());
        let mut start = [0; 9];
        parser.read_exact(&mut start).map_err(ParseError::from)?;
        assert_eq!(&start, b"{\"head\":{");
        assert_eq!(parser.mode(), Mode::RawStream);
        assert!(matches!(
            parser.classify(),
            Err(StreamError::ModeConflict {
                current: Mode::RawStream,
                requested: Mode::Parsing
            })
        ));

        let mut parser = StreamingParser::new(Format::SparqlJson, SRJ.as_bytes());
        parser.classify()?;
        assert!(parser.read(&mut [0; 4]).is_err());
        assert!(matches!(
            parser.into_raw(),
            Err(StreamError::ModeConflict {
                current: Mode::Parsing,
                requested: Mode::RawStream
            })
        ));
        Ok(())
    }

    #[test]
    fn wrong_kind() -> Result<(), StreamError> {
        let mut parser =
            StreamingParser::new(Format::SparqlJson, &br#"{"head":{},"boolean":false}"#[..]);
        assert!(!parser.boolean()?);
        assert!(matches!(
            parser.fields(),
            Err(StreamError::WrongKind {
                expected: ResultKind::ResultSet,
                actual: ResultKind::Boolean
            })
        ));
        assert!(parser.triples().is_err());
        Ok(())
    }

    #[test]
    fn failures_are_remembered() {
        let mut parser = StreamingParser::new(Format::SparqlJson, &b"{\"head\":"[..]);
        let Err(StreamError::Parse(first)) = parser.classify() else {
            panic!("parse error expected")
        };
        let Err(StreamError::Failed(message)) = parser.classify() else {
            panic!("the failure should be remembered")
        };
        assert_eq!(message, first.to_string());
        assert!(matches!(parser.bindings(), Err(StreamError::Failed(_))));

        let mut parser = StreamingParser::new(
            Format::SparqlJson,
            &br#"{"head":{"vars":["x"]},"results":{"bindings":[{"x":{"type":"foo","value":"1"}}]}}"#[..],
        );
        assert_eq!(parser.classify().ok(), Some(ResultKind::ResultSet));
        let Err(first) = parser.get() else {
            panic!("invalid binding expected")
        };
        let Err(StreamError::Failed(message)) = parser.get() else {
            panic!("the failure should be remembered")
        };
        assert_eq!(message, first.to_string());
    }

    #[test]
    fn unsupported_charset() {
        let mut parser = StreamingParser::new(Format::Csv, &b"true\n"[..]).with_charset("latin-1");
        assert!(matches!(parser.classify(), Err(StreamError::Parse(_))));
        let mut parser = StreamingParser::new(Format::Csv, &b"true\n"[..]).with_charset("UTF-8");
        assert!(matches!(parser.classify(), Ok(ResultKind::Boolean)));
    }

    #[test]
    fn spreadsheets_cannot_be_parsed() {
        let mut parser = StreamingParser::new(Format::Xls, &b""[..]);
        assert!(matches!(parser.classify(), Err(StreamError::Parse(_))));
    }

    #[test]
    fn triple_iris_are_encoded() -> Result<(), StreamError> {
        let mut parser = StreamingParser::new(
            Format::NTriples,
            &b"<http://e.com/a b> <http://e.com/p> <http://e.com/{o}> .\n"[..],
        );
        let graph = parser.triples()?.collect_graph()?;
        let triple = graph.iter().next().unwrap();
        assert_eq!(
            triple.subject.to_lexical(),
            NamedNode::new_unchecked("http://e.com/a%20b").as_str()
        );
        assert_eq!(triple.object.to_lexical(), "http://e.com/%7Bo%7D");
        Ok(())
    }
}
