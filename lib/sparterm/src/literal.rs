use crate::named_node::NamedNode;
use oxilangtag::{LanguageTag, LanguageTagParseError};
use std::fmt;
use std::fmt::Write;

/// An owned RDF [literal](https://www.w3.org/TR/rdf11-concepts/#dfn-literal).
///
/// A literal carries at most one of a language tag or a datatype.
/// Equality is structural: `"foo"` and `"foo"^^xsd:string` are different values.
///
/// The default string formatter is returning an N-Triples compatible representation:
/// ```
/// use sparterm::Literal;
/// use sparterm::NamedNode;
///
/// assert_eq!(
///     "\"foo\\nbar\"",
///     Literal::new_simple_literal("foo\nbar").to_string()
/// );
///
/// assert_eq!(
///     "\"1999-01-01\"^^<http://www.w3.org/2001/XMLSchema#date>",
///     Literal::new_typed_literal(
///         "1999-01-01",
///         NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#date")
///     )
///     .to_string()
/// );
///
/// assert_eq!(
///     "\"foo\"@en",
///     Literal::new_language_tagged_literal("foo", "en")?.to_string()
/// );
/// # Result::<(), sparterm::LanguageTagParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct Literal(LiteralContent);

#[derive(PartialEq, Eq, Ord, PartialOrd, Debug, Clone, Hash)]
enum LiteralContent {
    Simple(String),
    LanguageTagged { value: String, language: String },
    Typed { value: String, datatype: NamedNode },
}

impl Literal {
    /// Builds an RDF [simple literal](https://www.w3.org/TR/rdf11-concepts/#dfn-simple-literal).
    #[inline]
    pub fn new_simple_literal(value: impl Into<String>) -> Self {
        Self(LiteralContent::Simple(value.into()))
    }

    /// Builds an RDF [literal](https://www.w3.org/TR/rdf11-concepts/#dfn-literal) with a [datatype](https://www.w3.org/TR/rdf11-concepts/#dfn-datatype-iri).
    #[inline]
    pub fn new_typed_literal(value: impl Into<String>, datatype: impl Into<NamedNode>) -> Self {
        Self(LiteralContent::Typed {
            value: value.into(),
            datatype: datatype.into(),
        })
    }

    /// Builds an RDF [language-tagged string](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tagged-string).
    ///
    /// The language tag is validated against [BCP47](https://tools.ietf.org/html/bcp47).
    pub fn new_language_tagged_literal(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, LanguageTagParseError> {
        Ok(Self::new_language_tagged_literal_unchecked(
            value,
            LanguageTag::parse(language.into())?.into_inner(),
        ))
    }

    /// Builds an RDF [language-tagged string](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tagged-string)
    /// without validating the language tag.
    ///
    /// [`Literal::new_language_tagged_literal()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_language_tagged_literal_unchecked(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self(LiteralContent::LanguageTagged {
            value: value.into(),
            language: language.into(),
        })
    }

    /// The literal [lexical form](https://www.w3.org/TR/rdf11-concepts/#dfn-lexical-form).
    #[inline]
    pub fn value(&self) -> &str {
        match &self.0 {
            LiteralContent::Simple(value)
            | LiteralContent::LanguageTagged { value, .. }
            | LiteralContent::Typed { value, .. } => value,
        }
    }

    /// The literal [language tag](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tag) if it is a [language-tagged string](https://www.w3.org/TR/rdf11-concepts/#dfn-language-tagged-string).
    #[inline]
    pub fn language(&self) -> Option<&str> {
        match &self.0 {
            LiteralContent::LanguageTagged { language, .. } => Some(language),
            _ => None,
        }
    }

    /// The explicit literal [datatype](https://www.w3.org/TR/rdf11-concepts/#dfn-datatype-iri), if any.
    #[inline]
    pub fn datatype(&self) -> Option<&NamedNode> {
        match &self.0 {
            LiteralContent::Typed { datatype, .. } => Some(datatype),
            _ => None,
        }
    }

    /// Checks if this literal has neither a language tag nor a datatype.
    #[inline]
    pub fn is_plain(&self) -> bool {
        matches!(self.0, LiteralContent::Simple(_))
    }

    /// Extract components from this literal (value, datatype and language tag).
    #[inline]
    pub fn destruct(self) -> (String, Option<NamedNode>, Option<String>) {
        match self.0 {
            LiteralContent::Simple(s) => (s, None, None),
            LiteralContent::LanguageTagged { value, language } => (value, None, Some(language)),
            LiteralContent::Typed { value, datatype } => (value, Some(datatype), None),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            LiteralContent::Simple(value) => print_quoted_str(value, f),
            LiteralContent::LanguageTagged { value, language } => {
                print_quoted_str(value, f)?;
                write!(f, "@{language}")
            }
            LiteralContent::Typed { value, datatype } => {
                print_quoted_str(value, f)?;
                write!(f, "^^{datatype}")
            }
        }
    }
}

impl<'a> From<&'a str> for Literal {
    #[inline]
    fn from(value: &'a str) -> Self {
        Self::new_simple_literal(value)
    }
}

impl From<String> for Literal {
    #[inline]
    fn from(value: String) -> Self {
        Self::new_simple_literal(value)
    }
}

/// Writes a string as an N-Triples quoted string, escaping what has to be.
pub fn print_quoted_str(string: &str, f: &mut impl Write) -> fmt::Result {
    f.write_char('"')?;
    for c in string.chars() {
        match c {
            '\u{08}' => f.write_str("\\b"),
            '\t' => f.write_str("\\t"),
            '\n' => f.write_str("\\n"),
            '\u{0c}' => f.write_str("\\f"),
            '\r' => f.write_str("\\r"),
            '"' => f.write_str("\\\""),
            '\\' => f.write_str("\\\\"),
            '\0'..='\u{1f}' | '\u{7f}' => write!(f, "\\u{:04X}", u32::from(c)),
            c => f.write_char(c),
        }?;
    }
    f.write_char('"')
}
