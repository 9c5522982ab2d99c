//! An in-memory [RDF graph](https://www.w3.org/TR/rdf11-concepts/#dfn-graph).
//!
//! Usage example:
//! ```
//! use sparterm::{Graph, NamedNode, Triple};
//!
//! let ex = NamedNode::new("http://example.com")?;
//! let mut graph = Graph::default();
//! assert!(graph.insert(Triple::new(ex.clone(), ex.clone(), ex.clone())));
//! assert!(!graph.insert(Triple::new(ex.clone(), ex.clone(), ex.clone())));
//! assert_eq!(graph.len(), 1);
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

use crate::named_node::NamedNode;
use crate::triple::{Subject, Term, Triple};
use std::collections::HashSet;
use std::{fmt, slice, vec};

/// An in-memory set of triples that remembers insertion order.
///
/// Iteration yields the triples in the order they were first inserted,
/// so serializations of a parsed graph follow the order of the source document.
/// Equality is set equality.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    triples: Vec<Triple>,
    index: HashSet<Triple>,
}

impl Graph {
    /// Creates a new graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a triple to the graph. Returns `false` if it was already there.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if self.index.contains(&triple) {
            return false;
        }
        self.index.insert(triple.clone());
        self.triples.push(triple);
        true
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.index.contains(triple)
    }

    /// Returns the number of triples in this graph.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Checks if this graph contains a triple.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.triples.iter(),
        }
    }

    /// The distinct subjects of the graph, in order of first appearance.
    pub fn subjects(&self) -> Vec<&Subject> {
        let mut seen = HashSet::new();
        self.triples
            .iter()
            .map(|t| &t.subject)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    pub fn triples_for_subject<'a>(
        &'a self,
        subject: &'a Subject,
    ) -> impl Iterator<Item = &'a Triple> + 'a {
        self.triples.iter().filter(move |t| t.subject == *subject)
    }

    pub fn objects_for_subject_predicate<'a>(
        &'a self,
        subject: &'a Subject,
        predicate: &'a NamedNode,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.triples_for_subject(subject)
            .filter(move |t| t.predicate == *predicate)
            .map(|t| &t.object)
    }

    /// The distinct predicates of the graph, in order of first appearance.
    pub fn predicates(&self) -> Vec<&NamedNode> {
        let mut seen = HashSet::new();
        self.triples
            .iter()
            .map(|t| &t.predicate)
            .filter(|p| seen.insert(*p))
            .collect()
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Graph {}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Graph {
    type Item = Triple;
    type IntoIter = vec::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut g = Self::new();
        g.extend(iter);
        g
    }
}

impl Extend<Triple> for Graph {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for t in iter {
            self.insert(t);
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in self {
            writeln!(f, "{t} .")?;
        }
        Ok(())
    }
}

/// Iterator returned by [`Graph::iter`].
pub struct Iter<'a> {
    inner: slice::Iter<'a, Triple>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Triple;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlankNode, Literal};

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{name}"))
    }

    #[test]
    fn keeps_insertion_order() {
        let graph = [
            Triple::new(ex("b"), ex("p"), ex("o")),
            Triple::new(ex("a"), ex("p"), Literal::from("x")),
            Triple::new(ex("b"), ex("q"), BlankNode::new_unchecked("n")),
        ]
        .into_iter()
        .collect::<Graph>();
        assert_eq!(
            graph.subjects(),
            [&Subject::from(ex("b")), &Subject::from(ex("a"))]
        );
        assert_eq!(graph.triples_for_subject(&ex("b").into()).count(), 2);
        assert_eq!(graph.predicates(), [&ex("p"), &ex("q")]);
    }

    #[test]
    fn equality_ignores_order() {
        let t1 = Triple::new(ex("a"), ex("p"), ex("o"));
        let t2 = Triple::new(ex("b"), ex("p"), ex("o"));
        let g1 = [t1.clone(), t2.clone()].into_iter().collect::<Graph>();
        let g2 = [t2, t1.clone(), t1].into_iter().collect::<Graph>();
        assert_eq!(g1, g2);
        assert_eq!(g2.len(), 2);
    }

    #[test]
    fn objects_lookup() {
        let mut graph = Graph::new();
        graph.insert(Triple::new(ex("a"), ex("p"), ex("o1")));
        graph.insert(Triple::new(ex("a"), ex("p"), ex("o2")));
        graph.insert(Triple::new(ex("a"), ex("q"), ex("o3")));
        let subject = Subject::from(ex("a"));
        let predicate = ex("p");
        assert_eq!(
            graph
                .objects_for_subject_predicate(&subject, &predicate)
                .collect::<Vec<_>>(),
            [&Term::from(ex("o1")), &Term::from(ex("o2"))]
        );
    }
}
