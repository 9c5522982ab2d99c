use rand::random;
use std::fmt;

/// An owned RDF [blank node](https://www.w3.org/TR/rdf11-concepts/#dfn-blank-node).
///
/// The common way to create a new blank node is to use the [`BlankNode::default()`] function.
///
/// It is also possible to create a blank node from a blank node identifier using the [`BlankNode::new()`] function.
/// The blank node identifier must be valid according to the N-Triples grammar.
///
/// The default string formatter is returning an N-Triples compatible representation:
/// ```
/// use sparterm::BlankNode;
///
/// assert_eq!("_:a122", BlankNode::new("a122")?.to_string());
/// # Result::<_,sparterm::BlankNodeIdParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct BlankNode {
    id: String,
}

impl BlankNode {
    /// Creates a blank node from a unique identifier.
    ///
    /// The blank node identifier must be valid according to the N-Triples grammar.
    pub fn new(id: impl Into<String>) -> Result<Self, BlankNodeIdParseError> {
        let id = id.into();
        validate_blank_node_identifier(&id)?;
        Ok(Self::new_unchecked(id))
    }

    /// Creates a blank node from a unique identifier without validation.
    ///
    /// [`BlankNode::new()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Returns the underlying ID of this blank node.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.id
    }
}

impl fmt::Display for BlankNode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.id)
    }
}

impl Default for BlankNode {
    /// Builds a new RDF [blank node](https://www.w3.org/TR/rdf11-concepts/#dfn-blank-node) with a unique id.
    fn default() -> Self {
        // The id must not start with a digit to be a valid XML NCName
        loop {
            let id = format!("{:x}", random::<u128>());
            if matches!(id.as_bytes().first(), Some(b'a'..=b'f')) {
                return Self { id };
            }
        }
    }
}

fn validate_blank_node_identifier(id: &str) -> Result<(), BlankNodeIdParseError> {
    let mut chars = id.chars();
    let front = chars.next().ok_or(BlankNodeIdParseError)?;
    if !(front.is_ascii_digit() || front == '_' || front == ':' || is_pn_chars_base(front)) {
        return Err(BlankNodeIdParseError);
    }
    for c in chars {
        if !(c == '.'
            || c == '-'
            || c == '_'
            || c == ':'
            || c == '\u{00B7}'
            || c.is_ascii_digit()
            || matches!(c, '\u{0300}'..='\u{036F}' | '\u{203F}'..='\u{2040}')
            || is_pn_chars_base(c))
        {
            return Err(BlankNodeIdParseError);
        }
    }
    // Could not be ended by a dot
    if id.ends_with('.') {
        Err(BlankNodeIdParseError)
    } else {
        Ok(())
    }
}

pub(crate) fn is_pn_chars_base(c: char) -> bool {
    matches!(c,
        'A'..='Z'
        | 'a'..='z'
        | '\u{00C0}'..='\u{00D6}'
        | '\u{00D8}'..='\u{00F6}'
        | '\u{00F8}'..='\u{02FF}'
        | '\u{0370}'..='\u{037D}'
        | '\u{037F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// An error raised during [`BlankNode`] IDs validation.
#[derive(Debug, thiserror::Error)]
#[error("The blank node identifier is invalid")]
pub struct BlankNodeIdParseError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        BlankNode::new("").unwrap_err();
        BlankNode::new("a").unwrap();
        BlankNode::new("0a-b.c").unwrap();
        BlankNode::new("a.").unwrap_err();
        BlankNode::new("a b").unwrap_err();
    }

    #[test]
    fn default_is_valid_and_starts_with_a_letter() {
        for _ in 0..64 {
            let node = BlankNode::default();
            BlankNode::new(node.as_str()).unwrap();
            assert!(node.as_str().starts_with(|c: char| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn default_ids_are_unique() {
        assert_ne!(BlankNode::default(), BlankNode::default());
    }
}
