use crate::named_node::NamedNode;
use std::collections::BTreeMap;

const COMMON_NAMESPACES: [(&str, &str); 25] = [
    ("afn", "http://jena.hpl.hp.com/ARQ/function#"),
    ("cc", "http://creativecommons.org/ns#"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("doap", "http://usefulinc.com/ns/doap#"),
    ("fhs", "http://vocab.ox.ac.uk/fhs/"),
    ("fn", "http://www.w3.org/2005/xpath-functions#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("geo", "http://www.w3.org/2003/01/geo/wgs84_pos#"),
    ("gr", "http://purl.org/goodrelations/v1#"),
    ("oo", "http://purl.org/openorg/"),
    ("ov", "http://open.vocab.org/terms/"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("oxp", "http://ns.ox.ac.uk/namespace/oxpoints/2009/02/owl#"),
    ("qb", "http://purl.org/linked-data/cube#"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("sdmxdim", "http://purl.org/linked-data/sdmx/2009/dimension#"),
    ("sioc", "http://rdfs.org/sioc/ns#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("srx", "http://www.w3.org/2005/sparql-results#"),
    ("time", "http://www.w3.org/2006/time#"),
    ("v", "http://www.w3.org/2006/vcard/ns#"),
    ("void", "http://rdfs.org/ns/void#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

/// A table of prefix to namespace IRI mappings.
///
/// Prefixes are kept sorted so that everything derived from the table
/// (SPARQL `PREFIX` declarations, XML namespace declarations) is deterministic.
///
/// ```
/// use sparterm::Namespaces;
///
/// let mut namespaces = Namespaces::default();
/// namespaces.insert("ex", "http://example.com/");
/// assert_eq!(
///     namespaces.expand("ex:foo").unwrap().as_str(),
///     "http://example.com/foo"
/// );
/// assert_eq!(
///     namespaces.contract("http://example.com/foo").as_deref(),
///     Some("ex:foo")
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    prefixes: BTreeMap<String, String>,
}

impl Namespaces {
    /// The namespaces commonly found in the data served by SPARQL endpoints
    /// (`rdf`, `rdfs`, `owl`, `xsd`, `skos`, `foaf`, `dcterms`...).
    pub fn common() -> Self {
        COMMON_NAMESPACES.into_iter().collect()
    }

    /// Adds or replaces a prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    #[must_use]
    pub fn with(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.insert(prefix, namespace);
        self
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Iterates on the `(prefix, namespace)` pairs, sorted by prefix.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, n)| (p.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Turns a `prefix:local` name into an IRI if the prefix is known.
    pub fn expand(&self, name: &str) -> Option<NamedNode> {
        let (prefix, local) = name.split_once(':')?;
        Some(NamedNode::new_unchecked(format!(
            "{}{local}",
            self.get(prefix)?
        )))
    }

    /// Splits an IRI into a prefix and a local name using the longest matching namespace.
    pub fn split<'a>(&'a self, iri: &'a str) -> Option<(&'a str, &'a str)> {
        self.prefixes
            .iter()
            .filter_map(|(prefix, namespace)| {
                Some((prefix.as_str(), namespace.len(), iri.strip_prefix(namespace.as_str())?))
            })
            .max_by_key(|(_, len, _)| *len)
            .map(|(prefix, _, local)| (prefix, local))
    }

    /// Shortens an IRI into a `prefix:local` name if a namespace matches.
    pub fn contract(&self, iri: &str) -> Option<String> {
        let (prefix, local) = self.split(iri)?;
        Some(format!("{prefix}:{local}"))
    }
}

impl<P: Into<String>, N: Into<String>> FromIterator<(P, N)> for Namespaces {
    fn from_iter<I: IntoIterator<Item = (P, N)>>(iter: I) -> Self {
        Self {
            prefixes: iter
                .into_iter()
                .map(|(p, n)| (p.into(), n.into()))
                .collect(),
        }
    }
}

impl<P: Into<String>, N: Into<String>> Extend<(P, N)> for Namespaces {
    fn extend<I: IntoIterator<Item = (P, N)>>(&mut self, iter: I) {
        self.prefixes
            .extend(iter.into_iter().map(|(p, n)| (p.into(), n.into())));
    }
}
