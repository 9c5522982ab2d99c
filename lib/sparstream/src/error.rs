use crate::format::Format;
use crate::results::ResultKind;
use json_event_parser::{JsonParseError, JsonSyntaxError};
use std::fmt;
use std::io;
use std::sync::Arc;

/// Error returned while parsing a result stream.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// I/O error while reading the stream.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An error in the stream syntax.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl From<ParseError> for io::Error {
    #[inline]
    fn from(error: ParseError) -> Self {
        match error {
            ParseError::Io(error) => error,
            ParseError::Syntax(error) => error.into(),
        }
    }
}

#[doc(hidden)]
impl From<JsonParseError> for ParseError {
    fn from(error: JsonParseError) -> Self {
        match error {
            JsonParseError::Syntax(error) => SyntaxError(SyntaxErrorKind::Json(error)).into(),
            JsonParseError::Io(error) => error.into(),
        }
    }
}

#[doc(hidden)]
impl From<oxttl::TurtleParseError> for ParseError {
    fn from(error: oxttl::TurtleParseError) -> Self {
        match error {
            oxttl::TurtleParseError::Syntax(error) => {
                SyntaxError(SyntaxErrorKind::Turtle(error)).into()
            }
            oxttl::TurtleParseError::Io(error) => error.into(),
        }
    }
}

#[doc(hidden)]
impl From<quick_xml::Error> for ParseError {
    #[inline]
    fn from(error: quick_xml::Error) -> Self {
        match error {
            quick_xml::Error::Io(error) => {
                Self::Io(Arc::try_unwrap(error).unwrap_or_else(|e| io::Error::new(e.kind(), e)))
            }
            _ => Self::Syntax(SyntaxError(SyntaxErrorKind::Xml(error))),
        }
    }
}

#[doc(hidden)]
impl From<quick_xml::escape::EscapeError> for ParseError {
    #[inline]
    fn from(error: quick_xml::escape::EscapeError) -> Self {
        quick_xml::Error::from(error).into()
    }
}

#[doc(hidden)]
impl From<quick_xml::encoding::EncodingError> for ParseError {
    #[inline]
    fn from(error: quick_xml::encoding::EncodingError) -> Self {
        quick_xml::Error::from(error).into()
    }
}

#[doc(hidden)]
impl From<quick_xml::events::attributes::AttrError> for ParseError {
    #[inline]
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        quick_xml::Error::from(error).into()
    }
}

#[doc(hidden)]
impl From<csv::Error> for ParseError {
    fn from(error: csv::Error) -> Self {
        if error.is_io_error() {
            if let csv::ErrorKind::Io(error) = error.into_kind() {
                return Self::Io(error);
            }
            return Self::Syntax(SyntaxError::msg("CSV I/O error"));
        }
        Self::Syntax(SyntaxError(SyntaxErrorKind::Csv(error)))
    }
}

/// An error in the syntax of the parsed stream.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct SyntaxError(#[from] SyntaxErrorKind);

#[derive(Debug, thiserror::Error)]
enum SyntaxErrorKind {
    #[error(transparent)]
    Json(JsonSyntaxError),
    #[error(transparent)]
    Xml(quick_xml::Error),
    #[error(transparent)]
    Csv(csv::Error),
    #[error(transparent)]
    Turtle(oxttl::TurtleSyntaxError),
    #[error("{msg} on line {line}: '{fragment}'")]
    Line {
        msg: String,
        line: u64,
        fragment: String,
    },
    #[error("{0}")]
    Msg(String),
}

impl SyntaxError {
    /// Builds an error from a printable error message.
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        Self(SyntaxErrorKind::Msg(msg.into()))
    }

    /// Builds an error pointing to the line of the stream that could not be parsed.
    pub(crate) fn located_message(msg: impl Into<String>, line: u64, fragment: &str) -> Self {
        Self(SyntaxErrorKind::Line {
            msg: msg.into(),
            line,
            fragment: fragment.trim_end().to_owned(),
        })
    }

    /// The 1-based number of the offending line, if known.
    pub fn line(&self) -> Option<u64> {
        match &self.0 {
            SyntaxErrorKind::Line { line, .. } => Some(*line),
            SyntaxErrorKind::Json(e) => Some(e.location().start.line + 1),
            SyntaxErrorKind::Csv(e) => e.position().map(csv::Position::line),
            SyntaxErrorKind::Turtle(e) => Some(e.location().start.line + 1),
            SyntaxErrorKind::Xml(_) | SyntaxErrorKind::Msg(_) => None,
        }
    }

    /// The piece of input that could not be parsed, if known.
    pub fn fragment(&self) -> Option<&str> {
        match &self.0 {
            SyntaxErrorKind::Line { fragment, .. } => Some(fragment),
            _ => None,
        }
    }
}

impl From<SyntaxError> for io::Error {
    #[inline]
    fn from(error: SyntaxError) -> Self {
        match error.0 {
            SyntaxErrorKind::Xml(quick_xml::Error::Io(error)) => {
                Arc::try_unwrap(error).unwrap_or_else(|e| Self::new(e.kind(), e))
            }
            SyntaxErrorKind::Msg(msg) => Self::new(io::ErrorKind::InvalidData, msg),
            _ => Self::new(io::ErrorKind::InvalidData, error),
        }
    }
}

/// How a [`StreamingParser`](crate::StreamingParser) has been used so far.
///
/// A parser starts `Unset` and moves once and for all to either `RawStream` or `Parsing`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Mode {
    Unset,
    RawStream,
    Parsing,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unset => "unset",
            Self::RawStream => "raw stream",
            Self::Parsing => "parsing",
        })
    }
}

/// Misuse of the single-consumption contract of [`StreamingParser`](crate::StreamingParser),
/// or a parse failure met while classifying the stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The parser is already in another mode.
    #[error("the stream is used in {current} mode, it can't be switched to {requested} mode")]
    ModeConflict { current: Mode, requested: Mode },
    /// The lazy sequence of bindings or triples has already been handed out.
    #[error("the result stream has already been consumed")]
    StreamReplay,
    /// The result has not the kind required by the called operation.
    #[error("expected a {expected} result, found a {actual} result")]
    WrongKind {
        expected: ResultKind,
        actual: ResultKind,
    },
    /// An earlier classification or materialization failed with this message.
    #[error("the result stream already failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<StreamError> for io::Error {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Parse(error) => error.into(),
            _ => Self::other(error),
        }
    }
}

/// Error returned by [`StreamingSerializer`](crate::StreamingSerializer).
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The format can't represent this kind of result.
    #[error("{format} can't serialize a {kind} result")]
    UnsupportedKind { format: Format, kind: ResultKind },
    /// No serializer is registered for this format.
    #[error("there is no serializer for {0}")]
    NoSerializer(Format),
    /// The source stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The value can't be written in this format.
    #[error("{0}")]
    Unserializable(String),
}

impl From<ParseError> for SerializeError {
    #[inline]
    fn from(error: ParseError) -> Self {
        Self::Stream(error.into())
    }
}

impl From<SerializeError> for io::Error {
    fn from(error: SerializeError) -> Self {
        match error {
            SerializeError::Io(error) => error,
            SerializeError::Stream(error) => error.into(),
            _ => Self::new(io::ErrorKind::InvalidInput, error),
        }
    }
}
