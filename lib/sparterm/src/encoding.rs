//! Percent-encoding of the characters N-Triples and RDF/XML can't carry inside an IRI.

use crate::named_node::NamedNode;
use crate::triple::{Subject, Term, Triple};
use std::borrow::Cow;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Checks if a character has to be percent-encoded before being written inside an IRI.
#[inline]
pub fn is_forbidden_iri_char(c: char) -> bool {
    matches!(
        c,
        '\0'..=' ' | '^' | '<' | '>' | '"' | '{' | '}' | '|' | '`' | '\\'
    )
}

/// Percent-encodes the characters forbidden in IRIs (`^<>"{}|` + "`" + `\` and the controls up to the space).
///
/// The result is borrowed when the IRI has nothing to encode.
/// `%` is never encoded so the function is idempotent.
///
/// ```
/// use sparterm::encode_iri;
///
/// assert_eq!(encode_iri("http://example.com/foo bar"), "http://example.com/foo%20bar");
/// assert_eq!(encode_iri("http://example.com/foo%20bar"), "http://example.com/foo%20bar");
/// ```
pub fn encode_iri(iri: &str) -> Cow<'_, str> {
    let Some(first) = iri.find(is_forbidden_iri_char) else {
        return Cow::Borrowed(iri);
    };
    let mut encoded = String::with_capacity(iri.len() + 8);
    encoded.push_str(&iri[..first]);
    for c in iri[first..].chars() {
        match u8::try_from(c) {
            Ok(b) if is_forbidden_iri_char(c) => {
                encoded.push('%');
                encoded.push(char::from(HEX_DIGITS[usize::from(b >> 4)]));
                encoded.push(char::from(HEX_DIGITS[usize::from(b & 0xF)]));
            }
            _ => encoded.push(c),
        }
    }
    Cow::Owned(encoded)
}

/// Checks that an IRI contains no character that [`encode_iri`] would change.
#[inline]
pub fn is_encoded_iri(iri: &str) -> bool {
    !iri.contains(is_forbidden_iri_char)
}

impl NamedNode {
    /// Returns this IRI with the forbidden characters percent-encoded.
    #[must_use]
    pub fn into_encoded(self) -> Self {
        match encode_iri(self.as_str()) {
            Cow::Borrowed(_) => self,
            Cow::Owned(iri) => Self::new_unchecked(iri),
        }
    }
}

impl Triple {
    /// Percent-encodes the forbidden characters of every IRI in the triple.
    ///
    /// Literals and blank nodes are left untouched.
    #[must_use]
    pub fn with_encoded_iris(self) -> Self {
        Self {
            subject: match self.subject {
                Subject::NamedNode(node) => node.into_encoded().into(),
                Subject::BlankNode(node) => node.into(),
            },
            predicate: self.predicate.into_encoded(),
            object: match self.object {
                Term::NamedNode(node) => node.into_encoded().into(),
                object => object,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Literal;

    #[test]
    fn clean_iri_is_borrowed() {
        assert!(matches!(
            encode_iri("http://example.com/foo"),
            Cow::Borrowed("http://example.com/foo")
        ));
    }

    #[test]
    fn forbidden_characters_are_encoded() {
        assert_eq!(
            encode_iri("http://e.com/a b<c>\"{}|^`\\\n\t"),
            "http://e.com/a%20b%3Cc%3E%22%7B%7D%7C%5E%60%5C%0A%09"
        );
    }

    #[test]
    fn non_ascii_is_kept() {
        assert_eq!(
            encode_iri("http://e.com/\u{e9}t\u{e9}"),
            "http://e.com/\u{e9}t\u{e9}"
        );
    }

    #[test]
    fn encoding_is_idempotent() {
        for iri in [
            "http://example.com/foo bar",
            "http://example.com/%20",
            "http://example.com/{x}",
            "",
        ] {
            let once = encode_iri(iri).into_owned();
            assert_eq!(encode_iri(&once), once);
            assert!(is_encoded_iri(&once));
        }
    }

    #[test]
    fn triple_iris_are_encoded_but_not_literals() {
        let triple = Triple::new(
            NamedNode::new_unchecked("http://e.com/s s"),
            NamedNode::new_unchecked("http://e.com/p"),
            Literal::new_simple_literal("a b"),
        )
        .with_encoded_iris();
        assert_eq!(
            triple.to_string(),
            "<http://e.com/s%20s> <http://e.com/p> \"a b\""
        );
    }
}
