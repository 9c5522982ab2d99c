//! Definition of [`Binding`], one row of a SPARQL result set.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sparterm::{Term, Variable};
use std::fmt;
use std::iter::Zip;
use std::ops::Index;
use std::sync::Arc;

/// Tuple associating the fields of a result set with the terms bound to them.
///
/// It is the equivalent of a row in SQL.
/// Every binding of a result set shares the same ordered field list,
/// a field without value is unbound (`None`).
///
/// ```
/// use sparstream::Binding;
/// use sparterm::{Literal, Variable};
///
/// let binding = Binding::new(
///     [Variable::new("foo")?, Variable::new("bar")?],
///     vec![Some(Literal::from("1").into())],
/// );
/// assert_eq!(binding.get("foo"), Some(&Literal::from("1").into())); // By name
/// assert_eq!(binding.get(1), None); // By position, ?bar is unbound
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct Binding {
    fields: Arc<[Variable]>,
    values: Vec<Option<Term>>,
}

impl Binding {
    /// Builds a binding from the result set fields and the values, in field order.
    ///
    /// Missing trailing values are unbound and values beyond the last field are dropped,
    /// so the binding always has exactly the given fields.
    pub fn new(fields: impl Into<Arc<[Variable]>>, mut values: Vec<Option<Term>>) -> Self {
        let fields = fields.into();
        values.resize(fields.len(), None);
        Self { fields, values }
    }

    /// Builds a binding from `(field name, value)` pairs.
    ///
    /// Fields absent from `pairs` are unbound.
    /// Returns the offending name if a pair refers to a field outside of `fields`.
    pub fn from_pairs<'a>(
        fields: impl Into<Arc<[Variable]>>,
        pairs: impl IntoIterator<Item = (&'a str, Term)>,
    ) -> Result<Self, String> {
        let fields = fields.into();
        let mut values = vec![None; fields.len()];
        for (name, value) in pairs {
            let position = fields
                .iter()
                .position(|v| v.as_str() == name)
                .ok_or_else(|| name.to_owned())?;
            values[position] = Some(value);
        }
        Ok(Self { fields, values })
    }

    /// Returns a value for a given position in the tuple ([`usize`]) or a given field name ([`&str`] or [`Variable`]).
    #[inline]
    pub fn get(&self, index: impl FieldIndex) -> Option<&Term> {
        self.values.get(index.index(self)?).and_then(Option::as_ref)
    }

    /// The number of fields, bound or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks that no field is bound.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Returns an iterator over bound fields.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Returns the ordered slice of field values.
    #[inline]
    pub fn values(&self) -> &[Option<Term>] {
        &self.values
    }

    /// Returns the ordered slice of the fields, bound or not.
    #[inline]
    pub fn fields(&self) -> &[Variable] {
        &self.fields
    }

    #[inline]
    pub fn into_values(self) -> Vec<Option<Term>> {
        self.values
    }

    /// A deterministic content hash of the row.
    ///
    /// It is the hexadecimal SHA-256 of a canonical JSON rendering of the binding
    /// (keys sorted by field name, terms encoded like in the SPARQL JSON results format,
    /// unbound fields as `null`).
    /// Two bindings with the same fields and values always have the same digest,
    /// whatever the process or the field order.
    ///
    /// ```
    /// use sparstream::Binding;
    /// use sparterm::{NamedNode, Variable};
    ///
    /// let a = NamedNode::new("http://example.com/a")?;
    /// let b1 = Binding::new([Variable::new("x")?, Variable::new("y")?], vec![Some(a.clone().into()), None]);
    /// let b2 = Binding::new([Variable::new("y")?, Variable::new("x")?], vec![None, Some(a.into())]);
    /// assert_eq!(b1.digest(), b2.digest());
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    pub fn digest(&self) -> String {
        let object = self
            .fields
            .iter()
            .zip(&self.values)
            .map(|(field, value)| {
                (
                    field.as_str().to_owned(),
                    value.as_ref().map_or(Value::Null, term_to_json),
                )
            })
            .collect::<Map<_, _>>();
        hex::encode(
            Sha256::new()
                .chain_update(Value::Object(object).to_string())
                .finalize(),
        )
    }
}

fn term_to_json(term: &Term) -> Value {
    let mut object = Map::new();
    match term {
        Term::NamedNode(node) => {
            object.insert("type".into(), "uri".into());
            object.insert("value".into(), node.as_str().into());
        }
        Term::BlankNode(node) => {
            object.insert("type".into(), "bnode".into());
            object.insert("value".into(), node.as_str().into());
        }
        Term::Literal(literal) => {
            object.insert("type".into(), "literal".into());
            object.insert("value".into(), literal.value().into());
            if let Some(language) = literal.language() {
                object.insert("xml:lang".into(), language.into());
            } else if let Some(datatype) = literal.datatype() {
                object.insert("datatype".into(), datatype.as_str().into());
            }
        }
    }
    Value::Object(object)
}

impl<'a> IntoIterator for &'a Binding {
    type Item = (&'a Variable, &'a Term);
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            inner: self.fields.iter().zip(&self.values),
        }
    }
}

impl Index<usize> for Binding {
    type Output = Term;

    #[expect(clippy::panic)]
    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        self.get(index)
            .unwrap_or_else(|| panic!("The field {index} is not bound in this binding"))
    }
}

impl Index<&str> for Binding {
    type Output = Term;

    #[expect(clippy::panic)]
    #[inline]
    fn index(&self, index: &str) -> &Self::Output {
        self.get(index)
            .unwrap_or_else(|| panic!("The field ?{index} is not bound in this binding"))
    }
}

impl Index<&Variable> for Binding {
    type Output = Term;

    #[inline]
    fn index(&self, index: &Variable) -> &Self::Output {
        self.index(index.as_str())
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.iter().all(|(k, v)| other.get(k) == Some(v))
            && other.iter().all(|(k, v)| self.get(k) == Some(v))
    }
}

impl Eq for Binding {}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An iterator over [`Binding`] bound fields.
pub struct Iter<'a> {
    inner: Zip<std::slice::Iter<'a, Variable>, std::slice::Iter<'a, Option<Term>>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Variable, &'a Term);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        for (variable, value) in &mut self.inner {
            if let Some(value) = value {
                return Some((variable, value));
            }
        }
        None
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// A utility trait to get values for a given field or tuple position.
///
/// See [`Binding::get`].
pub trait FieldIndex {
    fn index(self, binding: &Binding) -> Option<usize>;
}

impl FieldIndex for usize {
    #[inline]
    fn index(self, _: &Binding) -> Option<usize> {
        Some(self)
    }
}

impl FieldIndex for &str {
    #[inline]
    fn index(self, binding: &Binding) -> Option<usize> {
        binding.fields.iter().position(|v| v.as_str() == self)
    }
}

impl FieldIndex for &Variable {
    #[inline]
    fn index(self, binding: &Binding) -> Option<usize> {
        binding.fields.iter().position(|v| v == self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparterm::{BlankNode, Literal, NamedNode};

    fn fields() -> Arc<[Variable]> {
        [Variable::new_unchecked("s"), Variable::new_unchecked("o")].into()
    }

    #[test]
    fn missing_fields_are_unbound() {
        let binding = Binding::from_pairs(
            fields(),
            [("o", Term::from(Literal::from("foo")))],
        )
        .unwrap();
        assert_eq!(binding.len(), 2);
        assert_eq!(binding.get("s"), None);
        assert_eq!(binding["o"], Literal::from("foo").into());
        assert_eq!(binding[1], Literal::from("foo").into());
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert_eq!(
            Binding::from_pairs(fields(), [("x", Term::from(BlankNode::default()))]),
            Err("x".to_owned())
        );
    }

    #[test]
    fn extra_values_are_dropped() {
        let binding = Binding::new(fields(), vec![None, None, Some(Literal::from("x").into())]);
        assert_eq!(binding.values().len(), 2);
        assert!(binding.is_empty());
    }

    #[test]
    fn digest_is_stable() {
        let binding = Binding::new(
            fields(),
            vec![Some(NamedNode::new_unchecked("http://example.com/s").into())],
        );
        assert_eq!(binding.digest(), binding.clone().digest());
        assert_eq!(binding.digest().len(), 64);
        let other = Binding::new(
            fields(),
            vec![Some(NamedNode::new_unchecked("http://example.com/t").into())],
        );
        assert_ne!(binding.digest(), other.digest());
    }
}
