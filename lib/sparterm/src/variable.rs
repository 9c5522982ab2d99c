use crate::blank_node::is_pn_chars_base;
use std::fmt;

/// A [SPARQL query](https://www.w3.org/TR/sparql11-query/) owned variable.
///
/// The default string formatter is returning a SPARQL compatible representation:
/// ```
/// use sparterm::{Variable, VariableNameParseError};
///
/// assert_eq!("?foo", Variable::new("foo")?.to_string());
/// # Result::<_,VariableNameParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct Variable {
    name: String,
}

impl Variable {
    /// Creates a variable name from a unique identifier.
    ///
    /// The variable identifier must be valid according to the SPARQL grammar.
    pub fn new(name: impl Into<String>) -> Result<Self, VariableNameParseError> {
        let name = name.into();
        validate_variable_identifier(&name)?;
        Ok(Self::new_unchecked(name))
    }

    /// Creates a variable name from a unique identifier without validation.
    ///
    /// [`Variable::new()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.name
    }
}

impl fmt::Display for Variable {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

fn validate_variable_identifier(id: &str) -> Result<(), VariableNameParseError> {
    let mut chars = id.chars();
    let front = chars.next().ok_or(VariableNameParseError)?;
    if !(front.is_ascii_digit() || front == '_' || is_pn_chars_base(front)) {
        return Err(VariableNameParseError);
    }
    for c in chars {
        if !(c.is_ascii_digit()
            || c == '_'
            || c == '\u{00B7}'
            || matches!(c, '\u{0300}'..='\u{036F}' | '\u{203F}'..='\u{2040}')
            || is_pn_chars_base(c))
        {
            return Err(VariableNameParseError);
        }
    }
    Ok(())
}

/// An error raised during [`Variable`] name validation.
#[derive(Debug, thiserror::Error)]
#[error("The variable name is invalid")]
pub struct VariableNameParseError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        Variable::new("x").unwrap();
        Variable::new("_1abc").unwrap();
        Variable::new("").unwrap_err();
        Variable::new("a-b").unwrap_err();
        Variable::new("?a").unwrap_err();
    }
}
