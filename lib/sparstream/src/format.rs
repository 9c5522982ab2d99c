use crate::results::ResultKind;
use std::fmt;

/// The wire formats spoken with SPARQL endpoints.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
#[non_exhaustive]
pub enum Format {
    /// [N-Triples](https://www.w3.org/TR/n-triples/), served as `text/plain`
    NTriples,
    /// [RDF/XML](https://www.w3.org/TR/rdf-syntax-grammar/)
    RdfXml,
    /// [Turtle](https://www.w3.org/TR/turtle/)
    Turtle,
    /// [SPARQL Query Results XML Format](https://www.w3.org/TR/rdf-sparql-XMLres/)
    SparqlXml,
    /// [SPARQL Query Results JSON Format](https://www.w3.org/TR/sparql11-results-json/)
    SparqlJson,
    /// [SPARQL Query Results CSV Format](https://www.w3.org/TR/sparql11-results-csv-tsv/)
    Csv,
    /// SpreadsheetML workbook
    Xls,
}

/// Canonical media types and aliases.
const MEDIA_TYPES: [(&str, Format); 13] = [
    ("application/json", Format::SparqlJson),
    ("application/n-triples", Format::NTriples),
    ("application/rdf+xml", Format::RdfXml),
    ("application/sparql-results+json", Format::SparqlJson),
    ("application/sparql-results+xml", Format::SparqlXml),
    ("application/vnd.ms-excel", Format::Xls),
    ("application/xml", Format::SparqlXml),
    ("text/csv", Format::Csv),
    ("text/plain", Format::NTriples),
    ("text/turtle", Format::Turtle),
    ("application/x-sparql-results+json", Format::SparqlJson),
    ("application/x-turtle", Format::Turtle),
    ("application/x-sparql-results+xml", Format::SparqlXml),
];

/// The two families of formats: RDF graphs and SPARQL results tables.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum FormatFamily {
    Graph,
    SparqlResults,
}

impl FormatFamily {
    /// The kinds of result the formats of this family can carry.
    pub fn supported_kinds(self) -> &'static [ResultKind] {
        match self {
            Self::Graph => &[ResultKind::Graph],
            Self::SparqlResults => &[ResultKind::Boolean, ResultKind::ResultSet],
        }
    }
}

impl Format {
    /// The format [IANA media type](https://tools.ietf.org/html/rfc2046).
    ///
    /// ```
    /// use sparstream::Format;
    ///
    /// assert_eq!(Format::NTriples.media_type(), "text/plain")
    /// ```
    #[inline]
    pub fn media_type(self) -> &'static str {
        match self {
            Self::NTriples => "text/plain",
            Self::RdfXml => "application/rdf+xml",
            Self::Turtle => "text/turtle",
            Self::SparqlXml => "application/sparql-results+xml",
            Self::SparqlJson => "application/sparql-results+json",
            Self::Csv => "text/csv",
            Self::Xls => "application/vnd.ms-excel",
        }
    }

    /// The format usual file extension.
    ///
    /// ```
    /// use sparstream::Format;
    ///
    /// assert_eq!(Format::SparqlJson.file_extension(), "srj")
    /// ```
    #[inline]
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::NTriples => "nt",
            Self::RdfXml => "rdf",
            Self::Turtle => "ttl",
            Self::SparqlXml => "srx",
            Self::SparqlJson => "srj",
            Self::Csv => "csv",
            Self::Xls => "xls",
        }
    }

    /// The format name.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NTriples => "N-Triples",
            Self::RdfXml => "RDF/XML",
            Self::Turtle => "Turtle",
            Self::SparqlXml => "SPARQL Results in XML",
            Self::SparqlJson => "SPARQL Results in JSON",
            Self::Csv => "CSV",
            Self::Xls => "Spreadsheet",
        }
    }

    #[inline]
    pub fn family(self) -> FormatFamily {
        match self {
            Self::NTriples | Self::RdfXml | Self::Turtle => FormatFamily::Graph,
            Self::SparqlXml | Self::SparqlJson | Self::Csv | Self::Xls => {
                FormatFamily::SparqlResults
            }
        }
    }

    /// Checks if the format is able to carry a given kind of result.
    #[inline]
    pub fn supports(self, kind: ResultKind) -> bool {
        self.family().supported_kinds().contains(&kind)
    }

    /// Looks for a known format from a media type.
    ///
    /// Parameters like `charset` are ignored and some aliases are supported.
    ///
    /// ```
    /// use sparstream::Format;
    ///
    /// assert_eq!(
    ///     Format::from_media_type("application/sparql-results+json; charset=utf-8"),
    ///     Some(Format::SparqlJson)
    /// );
    /// assert_eq!(Format::from_media_type("application/n-triples"), Some(Format::NTriples));
    /// ```
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let media_type = media_type.split_once(';').map_or(media_type, |(t, _)| t).trim();
        MEDIA_TYPES
            .into_iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(media_type))
            .map(|(_, format)| format)
    }

    /// Every media type of the format, aliases included.
    pub(crate) fn media_types(self) -> impl Iterator<Item = &'static str> {
        MEDIA_TYPES
            .into_iter()
            .filter(move |(_, format)| *format == self)
            .map(|(media_type, _)| media_type)
    }

    /// Looks for a known format from a file extension.
    ///
    /// ```
    /// use sparstream::Format;
    ///
    /// assert_eq!(Format::from_extension("srx"), Some(Format::SparqlXml));
    /// ```
    pub fn from_extension(extension: &str) -> Option<Self> {
        const EXTENSIONS: [(&str, Format); 11] = [
            ("csv", Format::Csv),
            ("json", Format::SparqlJson),
            ("nt", Format::NTriples),
            ("rdf", Format::RdfXml),
            ("srj", Format::SparqlJson),
            ("srx", Format::SparqlXml),
            ("ttl", Format::Turtle),
            ("txt", Format::NTriples),
            ("xls", Format::Xls),
            ("xml", Format::SparqlXml),
            ("owl", Format::RdfXml),
        ];
        EXTENSIONS
            .into_iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(extension))
            .map(|(_, format)| format)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_types_round_trip() {
        for format in [
            Format::NTriples,
            Format::RdfXml,
            Format::Turtle,
            Format::SparqlXml,
            Format::SparqlJson,
            Format::Csv,
            Format::Xls,
        ] {
            assert_eq!(Format::from_media_type(format.media_type()), Some(format));
            assert_eq!(Format::from_extension(format.file_extension()), Some(format));
        }
    }

    #[test]
    fn media_type_parameters_are_ignored() {
        assert_eq!(
            Format::from_media_type(" text/CSV ; charset=utf-8"),
            Some(Format::Csv)
        );
        assert_eq!(Format::from_media_type("text/html"), None);
        assert_eq!(
            Format::from_media_type("application/x-turtle"),
            Some(Format::Turtle)
        );
    }

    #[test]
    fn aliases_are_listed() {
        let json = Format::SparqlJson.media_types().collect::<Vec<_>>();
        assert!(json.contains(&"application/json"));
        assert!(json.contains(&"application/sparql-results+json"));
        assert!(Format::NTriples.media_types().any(|t| t == "application/n-triples"));
    }

    #[test]
    fn families() {
        assert!(Format::RdfXml.supports(ResultKind::Graph));
        assert!(!Format::RdfXml.supports(ResultKind::Boolean));
        assert!(Format::Turtle.supports(ResultKind::Graph));
        assert!(Format::Csv.supports(ResultKind::Boolean));
        assert!(!Format::SparqlJson.supports(ResultKind::Graph));
    }
}
