//! The table of supported formats and HTTP content negotiation over it.

use crate::error::ParseError;
use crate::format::{Format, FormatFamily};
use crate::parser::StreamingParser;
use crate::results::{ParsedResults, ResultKind};
use crate::serializer::{ResultsSerializer, ResultsWriter, SerializerConfig};
use crate::{csv, json, ntriples, rdfxml, turtle, xls, xml};
use std::io::{BufRead, Read};

/// Reads the start of a stream and returns what it holds.
pub(crate) type ResultsParser = fn(Box<dyn BufRead + Send>) -> Result<ParsedResults, ParseError>;

/// A row of the [`FORMATS`] table.
pub struct FormatEntry {
    format: Format,
    name: &'static str,
    priority: f32,
    parser: Option<ResultsParser>,
    serializer: Option<ResultsSerializer>,
}

impl FormatEntry {
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    /// A human readable name like `SPARQL Results JSON`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn extension(&self) -> &'static str {
        self.format.file_extension()
    }

    #[inline]
    pub fn family(&self) -> FormatFamily {
        self.format.family()
    }

    /// Multiplies the client quality factor during negotiation.
    #[inline]
    pub fn priority(&self) -> f32 {
        self.priority
    }

    #[inline]
    pub fn has_parser(&self) -> bool {
        self.parser.is_some()
    }

    #[inline]
    pub fn has_serializer(&self) -> bool {
        self.serializer.is_some()
    }

    pub(crate) fn parser(&self) -> Option<ResultsParser> {
        self.parser
    }

    pub(crate) fn serializer(&self) -> Option<ResultsSerializer> {
        self.serializer
    }
}

/// Every supported format, in preference order for ties.
pub static FORMATS: [FormatEntry; 7] = [
    FormatEntry {
        format: Format::RdfXml,
        name: "RDF/XML",
        priority: 1.,
        parser: Some(rdfxml::parse),
        serializer: Some(rdfxml_writer),
    },
    FormatEntry {
        format: Format::NTriples,
        name: "N-Triples",
        priority: 1.,
        parser: Some(ntriples::parse),
        serializer: Some(ntriples_writer),
    },
    FormatEntry {
        format: Format::Turtle,
        name: "Turtle",
        priority: 1.,
        parser: Some(turtle::parse),
        serializer: Some(turtle_writer),
    },
    FormatEntry {
        format: Format::SparqlJson,
        name: "SPARQL Results JSON",
        priority: 0.9,
        parser: Some(json::parse),
        serializer: Some(srj_writer),
    },
    FormatEntry {
        format: Format::SparqlXml,
        name: "SPARQL Results XML",
        priority: 1.,
        parser: Some(xml::parse),
        serializer: Some(srx_writer),
    },
    FormatEntry {
        format: Format::Csv,
        name: "CSV",
        priority: 1.,
        parser: Some(csv::parse),
        serializer: Some(csv_writer),
    },
    FormatEntry {
        format: Format::Xls,
        name: "Excel Spreadsheet (XLS)",
        priority: 1.,
        parser: None,
        serializer: Some(xls_writer),
    },
];

fn rdfxml_writer(config: &SerializerConfig) -> ResultsWriter {
    ResultsWriter::Triples(Box::new(rdfxml::RdfXmlWriter::new(config.namespaces().clone())))
}

fn ntriples_writer(_: &SerializerConfig) -> ResultsWriter {
    ResultsWriter::Triples(Box::new(ntriples::NTriplesWriter))
}

fn turtle_writer(config: &SerializerConfig) -> ResultsWriter {
    ResultsWriter::Triples(Box::new(turtle::TurtleWriter::new(config.namespaces())))
}

fn srj_writer(_: &SerializerConfig) -> ResultsWriter {
    ResultsWriter::Solutions(Box::<json::SrjWriter>::default())
}

fn srx_writer(_: &SerializerConfig) -> ResultsWriter {
    ResultsWriter::Solutions(Box::new(xml::SrxWriter))
}

fn csv_writer(_: &SerializerConfig) -> ResultsWriter {
    ResultsWriter::Solutions(Box::new(csv::CsvWriter))
}

fn xls_writer(_: &SerializerConfig) -> ResultsWriter {
    ResultsWriter::Solutions(Box::<xls::XlsWriter>::default())
}

/// The table row of a format.
pub fn lookup_format(format: Format) -> Option<&'static FormatEntry> {
    FORMATS.iter().find(|entry| entry.format == format)
}

/// The table row of a media type, parameters and aliases being accepted.
///
/// ```
/// use sparstream::{Format, lookup_media_type};
///
/// let entry = lookup_media_type("application/json; charset=utf-8").unwrap();
/// assert_eq!(entry.format(), Format::SparqlJson);
/// assert_eq!(entry.priority(), 0.9);
/// ```
pub fn lookup_media_type(media_type: &str) -> Option<&'static FormatEntry> {
    lookup_format(Format::from_media_type(media_type)?)
}

/// The table row of a file extension like `srx`.
pub fn lookup_extension(extension: &str) -> Option<&'static FormatEntry> {
    lookup_format(Format::from_extension(extension)?)
}

/// Builds a parser for a file extension, if a parser exists for the matching format.
pub fn parse_with_extension(
    reader: impl Read + Send + 'static,
    extension: &str,
) -> Option<StreamingParser> {
    let entry = lookup_extension(extension)?;
    entry
        .has_parser()
        .then(|| StreamingParser::new(entry.format, reader))
}

/// Picks the format to answer with from an HTTP `Accept` header.
///
/// Only formats with a serializer able to encode every kind in `allowed_kinds` are candidates.
/// Each candidate gets the quality of the most specific matching media range, multiplied by its priority;
/// ties go to the earliest entry of [`FORMATS`]. An empty header accepts anything.
///
/// ```
/// use sparstream::{Format, ResultKind, negotiate};
///
/// let entry = negotiate("text/csv;q=0.5, application/sparql-results+xml", &[ResultKind::ResultSet]).unwrap();
/// assert_eq!(entry.format(), Format::SparqlXml);
/// // SPARQL Results JSON loses ties
/// let entry = negotiate("*/*", &[ResultKind::Boolean]).unwrap();
/// assert_eq!(entry.format(), Format::SparqlXml);
/// ```
pub fn negotiate(accept: &str, allowed_kinds: &[ResultKind]) -> Option<&'static FormatEntry> {
    let ranges = parse_accept(accept);
    let mut best: Option<(&'static FormatEntry, f32)> = None;
    for entry in &FORMATS {
        if entry.serializer.is_none()
            || !allowed_kinds.iter().all(|kind| entry.format.supports(*kind))
        {
            continue;
        }
        let Some(quality) = quality(&ranges, entry.format) else {
            continue;
        };
        let score = quality * entry.priority;
        if score > 0. && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((entry, score));
        }
    }
    best.map(|(entry, _)| entry)
}

struct MediaRange<'a> {
    main_type: &'a str,
    sub_type: &'a str,
    quality: f32,
}

fn parse_accept(accept: &str) -> Vec<MediaRange<'_>> {
    if accept.trim().is_empty() {
        return vec![MediaRange {
            main_type: "*",
            sub_type: "*",
            quality: 1.,
        }];
    }
    accept
        .split(',')
        .filter_map(|range| {
            let mut parts = range.split(';');
            let (main_type, sub_type) = parts.next()?.trim().split_once('/')?;
            let mut quality = 1.;
            for parameter in parts {
                if let Some((key, value)) = parameter.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("q") {
                        quality = value.trim().parse::<f32>().ok()?.clamp(0., 1.);
                    }
                }
            }
            Some(MediaRange {
                main_type: main_type.trim(),
                sub_type: sub_type.trim(),
                quality,
            })
        })
        .collect()
}

/// The quality of the most specific range matching the format or one of its aliases, if any.
fn quality(ranges: &[MediaRange<'_>], format: Format) -> Option<f32> {
    let mut best: Option<(u8, f32)> = None;
    for range in ranges {
        let specificity = if range.main_type == "*" && range.sub_type == "*" {
            0
        } else if range.sub_type == "*" {
            if !format.media_types().any(|media_type| {
                media_type
                    .split_once('/')
                    .is_some_and(|(main_type, _)| range.main_type.eq_ignore_ascii_case(main_type))
            }) {
                continue;
            }
            1
        } else if Format::from_media_type(&format!("{}/{}", range.main_type, range.sub_type))
            == Some(format)
        {
            2
        } else {
            continue;
        };
        if best.is_none_or(|(best_specificity, _)| specificity > best_specificity) {
            best = Some((specificity, range.quality));
        }
    }
    best.map(|(_, quality)| quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_and_lookups() {
        assert_eq!(FORMATS.len(), 7);
        assert_eq!(
            lookup_extension("srj").map(FormatEntry::format),
            Some(Format::SparqlJson)
        );
        assert_eq!(
            lookup_media_type("text/plain").map(FormatEntry::name),
            Some("N-Triples")
        );
        assert_eq!(
            lookup_media_type("text/turtle").map(FormatEntry::format),
            Some(Format::Turtle)
        );
        assert!(lookup_media_type("text/n3").is_none());
        assert!(!lookup_format(Format::Xls).is_some_and(FormatEntry::has_parser));
        assert!(FORMATS.iter().all(FormatEntry::has_serializer));
    }

    #[test]
    fn negotiation_follows_quality() {
        let pick = |accept, kinds: &[ResultKind]| negotiate(accept, kinds).map(FormatEntry::format);
        assert_eq!(
            pick("text/csv, application/sparql-results+json;q=0.9", &[ResultKind::ResultSet]),
            Some(Format::Csv)
        );
        assert_eq!(
            pick("application/sparql-results+json", &[ResultKind::ResultSet]),
            Some(Format::SparqlJson)
        );
        assert_eq!(pick("text/*", &[ResultKind::Graph]), Some(Format::NTriples));
        assert_eq!(pick("*/*", &[ResultKind::Graph]), Some(Format::RdfXml));
        assert_eq!(pick("", &[ResultKind::ResultSet]), Some(Format::SparqlXml));
        assert_eq!(pick("text/csv", &[ResultKind::Graph]), None);
        assert_eq!(pick("*/*, text/csv;q=0", &[ResultKind::Boolean]), Some(Format::SparqlXml));
        assert_eq!(pick("text/csv;q=0", &[ResultKind::Boolean]), None);
        assert_eq!(pick("application/json", &[ResultKind::Boolean]), Some(Format::SparqlJson));
        assert_eq!(pick("text/turtle", &[ResultKind::Graph]), Some(Format::Turtle));
    }

    #[test]
    fn negotiation_matches_aliases() {
        let pick = |accept, kinds: &[ResultKind]| negotiate(accept, kinds).map(FormatEntry::format);
        assert_eq!(
            pick("application/json", &[ResultKind::ResultSet]),
            Some(Format::SparqlJson)
        );
        assert_eq!(
            pick("application/xml;q=0.5, application/json", &[ResultKind::ResultSet]),
            Some(Format::SparqlJson)
        );
        assert_eq!(
            pick("application/x-turtle, application/rdf+xml;q=0.8", &[ResultKind::Graph]),
            Some(Format::Turtle)
        );
        // N-Triples is also served as application/n-triples
        assert_eq!(
            pick("application/*, application/rdf+xml;q=0", &[ResultKind::Graph]),
            Some(Format::NTriples)
        );
    }

    #[test]
    fn parse_with_unknown_extension() {
        assert!(parse_with_extension(&b""[..], "jsonld").is_none());
        assert!(parse_with_extension(&b""[..], "ttl").is_some());
        assert!(parse_with_extension(&b""[..], "xls").is_none());
        assert!(parse_with_extension(&b""[..], "srx").is_some());
    }
}
