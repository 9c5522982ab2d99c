#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod binding;
mod csv;
mod error;
mod format;
mod json;
mod ntriples;
mod parser;
mod pipeline;
mod rdfxml;
mod registry;
mod results;
mod serializer;
mod turtle;
mod xls;
mod xml;

pub use crate::binding::{Binding, FieldIndex, Iter as BindingIter};
pub use crate::error::{Mode, ParseError, SerializeError, StreamError, SyntaxError};
pub use crate::format::{Format, FormatFamily};
pub use crate::parser::StreamingParser;
pub use crate::pipeline::QUEUE_CAPACITY;
pub use crate::registry::{
    FORMATS, FormatEntry, lookup_extension, lookup_format, lookup_media_type, negotiate,
    parse_with_extension,
};
pub use crate::results::{QueryResults, ResultKind, SolutionSet, Solutions, Triples};
pub use crate::serializer::{
    CHUNK_SOFT_LIMIT, Chunks, ResultSource, SerializerConfig, SerializerStats, StreamingSerializer,
    serializer_stats,
};
