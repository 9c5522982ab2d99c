use sparterm::Namespaces;
use std::fmt::Write;
use std::time::Duration;

/// The media types requested by default, fastest to parse first.
pub const DEFAULT_MEDIA_TYPES: [&str; 4] = [
    "text/plain",
    "application/sparql-results+xml",
    "application/rdf+xml",
    "application/sparql-results+json",
];

/// Options of a single [`Endpoint::query`](crate::Endpoint::query) call.
///
/// ```
/// use sparclient::QueryOptions;
/// use std::time::Duration;
///
/// let options = QueryOptions::default()
///     .with_timeout(Duration::from_secs(30))
///     .without_common_prefixes();
/// assert_eq!(options.accept_header(), "text/plain, application/sparql-results+xml;q=0.9, application/rdf+xml;q=0.8, application/sparql-results+json;q=0.7");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    common_prefixes: bool,
    timeout: Option<Duration>,
    preferred_media_types: Vec<String>,
    defer: bool,
    log_failure: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            common_prefixes: true,
            timeout: None,
            preferred_media_types: DEFAULT_MEDIA_TYPES.iter().map(|t| (*t).into()).collect(),
            defer: true,
            log_failure: true,
        }
    }
}

impl QueryOptions {
    /// Do not prepend the `PREFIX` declarations of the namespaces used by the query.
    #[must_use]
    pub fn without_common_prefixes(mut self) -> Self {
        self.common_prefixes = false;
        self
    }

    /// Asks the endpoint to stop evaluating the query after this duration.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the media types to ask for, most preferred first.
    #[must_use]
    pub fn with_preferred_media_types(
        mut self,
        media_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.preferred_media_types = media_types.into_iter().map(Into::into).collect();
        self
    }

    /// Parses the whole response before returning instead of returning a stream.
    ///
    /// The fastest format to parse is then requested, whatever the preferred media types.
    #[must_use]
    pub fn eager(mut self) -> Self {
        self.defer = false;
        self
    }

    /// Logs failures at debug level instead of error level.
    #[must_use]
    pub fn without_failure_logging(mut self) -> Self {
        self.log_failure = false;
        self
    }

    pub fn common_prefixes(&self) -> bool {
        self.common_prefixes
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn preferred_media_types(&self) -> &[String] {
        &self.preferred_media_types
    }

    pub fn is_deferred(&self) -> bool {
        self.defer
    }

    pub fn log_failure(&self) -> bool {
        self.log_failure
    }

    /// The `Accept` header value built from the preferred media types.
    pub fn accept_header(&self) -> String {
        if self.defer {
            accept_header(&self.preferred_media_types)
        } else {
            accept_header(&DEFAULT_MEDIA_TYPES[..2])
        }
    }
}

/// Builds a weighted `Accept` header keeping the given order.
///
/// The first media type is unweighted, the following ones get `q=0.9`, `q=0.8`...
/// down to `q=0.1`.
pub fn accept_header(media_types: &[impl AsRef<str>]) -> String {
    let mut header = String::new();
    for (i, media_type) in media_types.iter().enumerate() {
        if i > 0 {
            header.push_str(", ");
        }
        header.push_str(media_type.as_ref());
        if i > 0 {
            let tenths = 10_usize.saturating_sub(i).max(1);
            let _ = write!(header, ";q=0.{tenths}");
        }
    }
    header
}

/// Removes the indentation common to all lines but the first, as Python docstrings do.
///
/// The first line is stripped, trailing whitespace is removed from every line
/// and leading and trailing blank lines are dropped.
pub fn trim_indentation(text: &str) -> String {
    let lines = text.lines().map(expand_tabs).collect::<Vec<_>>();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };
    let indent = rest
        .iter()
        .filter(|line| !line.trim_start().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min();
    let mut trimmed = vec![first.trim()];
    if let Some(indent) = indent {
        trimmed.extend(
            rest.iter()
                .map(|line| line.get(indent..).unwrap_or_default().trim_end()),
        );
    }
    while trimmed.last().is_some_and(|line| line.is_empty()) {
        trimmed.pop();
    }
    let start = trimmed
        .iter()
        .position(|line| !line.is_empty())
        .unwrap_or(trimmed.len());
    trimmed[start..].join("\n")
}

fn expand_tabs(line: &str) -> String {
    let mut expanded = String::with_capacity(line.len());
    for c in line.chars() {
        if c == '\t' {
            let spaces = 8 - expanded.chars().count() % 8;
            expanded.extend(std::iter::repeat_n(' ', spaces));
        } else {
            expanded.push(c);
        }
    }
    expanded
}

/// Trims the query indentation and, if `common_prefixes` is set, prepends the
/// `PREFIX` declarations of the namespaces whose `prefix:` appears in its text.
///
/// ```
/// use sparclient::normalize_query;
/// use sparterm::Namespaces;
///
/// let query = normalize_query(
///     "SELECT * WHERE {
///         ?s rdfs:label ?o
///     }",
///     &Namespaces::common(),
///     true,
/// );
/// assert_eq!(
///     query,
///     "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n\nSELECT * WHERE {\n    ?s rdfs:label ?o\n}"
/// );
/// ```
pub fn normalize_query(query: &str, namespaces: &Namespaces, common_prefixes: bool) -> String {
    let query = trim_indentation(query);
    if !common_prefixes {
        return query;
    }
    let mut normalized = String::new();
    for (prefix, namespace) in namespaces.iter() {
        if query.contains(&format!("{prefix}:")) {
            let _ = writeln!(normalized, "PREFIX {prefix}: <{namespace}>");
        }
    }
    normalized.push('\n');
    normalized.push_str(&query);
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indentation_is_trimmed() {
        assert_eq!(
            trim_indentation("\n    SELECT ?s WHERE {\n      ?s ?p ?o\n    }\n  "),
            "SELECT ?s WHERE {\n  ?s ?p ?o\n}"
        );
        assert_eq!(trim_indentation("ASK {}"), "ASK {}");
        assert_eq!(trim_indentation(""), "");
        assert_eq!(trim_indentation("  \n\t\n"), "");
    }

    #[test]
    fn only_referenced_prefixes_are_added() {
        let namespaces = Namespaces::default()
            .with("foaf", "http://xmlns.com/foaf/0.1/")
            .with("dc", "http://purl.org/dc/elements/1.1/")
            .with("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
        assert_eq!(
            normalize_query("SELECT ?n WHERE { ?p a foaf:Person ; foaf:name ?n ; rdf:type ?t }", &namespaces, true),
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/>\nPREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\nSELECT ?n WHERE { ?p a foaf:Person ; foaf:name ?n ; rdf:type ?t }"
        );
        assert_eq!(
            normalize_query("ASK { ?s foaf:name ?n }", &namespaces, false),
            "ASK { ?s foaf:name ?n }"
        );
    }

    #[test]
    fn accept_weights_decrease() {
        assert_eq!(accept_header(&["text/plain"]), "text/plain");
        let types = (0..12).map(|i| format!("a/{i}")).collect::<Vec<_>>();
        let header = accept_header(&types);
        assert!(header.starts_with("a/0, a/1;q=0.9, a/2;q=0.8, "));
        assert!(header.ends_with("a/9;q=0.1, a/10;q=0.1, a/11;q=0.1"));
    }

    #[test]
    fn eager_queries_ask_for_fast_formats() {
        let options = QueryOptions::default()
            .with_preferred_media_types(["application/sparql-results+json"])
            .eager();
        assert_eq!(
            options.accept_header(),
            "text/plain, application/sparql-results+xml;q=0.9"
        );
    }
}
