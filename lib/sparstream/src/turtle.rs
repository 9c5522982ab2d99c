//! [Turtle](https://www.w3.org/TR/turtle/) graphs, read and written with [`oxttl`].
//!
//! Terms are converted from and to the [`oxrdf`] model at the boundary.

use crate::error::{ParseError, SerializeError, SyntaxError};
use crate::pipeline::Pipeline;
use crate::results::{ParsedResults, Triples};
use crate::serializer::TriplesWriter;
use oxiri::Iri;
use oxttl::turtle::LowLevelTurtleSerializer;
use oxttl::{TurtleParser, TurtleSerializer};
use sparterm::vocab::xsd;
use sparterm::{BlankNode, Literal, NamedNode, Namespaces, Subject, Term, Triple, encode_iri};
use std::io::BufRead;
use tracing::debug;

/// Starts the reader thread. Syntax errors show up while iterating the triples.
pub(crate) fn parse(reader: Box<dyn BufRead + Send>) -> Result<ParsedResults, ParseError> {
    let pipeline = Pipeline::spawn("turtle-reader", move |producer| {
        for triple in TurtleParser::new().for_reader(reader) {
            if !producer.send(from_oxrdf(triple?)?) {
                break;
            }
        }
        Ok(())
    })?;
    Ok(ParsedResults::Graph(Triples::new(pipeline)))
}

fn from_oxrdf(triple: oxrdf::Triple) -> Result<Triple, ParseError> {
    let subject = match term_from_oxrdf(triple.subject.into()) {
        Term::NamedNode(node) => Subject::NamedNode(node),
        Term::BlankNode(node) => Subject::BlankNode(node),
        Term::Literal(literal) => {
            return Err(SyntaxError::msg(format!("The literal {literal} can't be a subject")).into());
        }
    };
    Ok(Triple::new(
        subject,
        NamedNode::new_unchecked(triple.predicate.into_string()),
        term_from_oxrdf(triple.object),
    ))
}

fn term_from_oxrdf(term: oxrdf::Term) -> Term {
    match term {
        oxrdf::Term::NamedNode(node) => NamedNode::new_unchecked(node.into_string()).into(),
        oxrdf::Term::BlankNode(node) => BlankNode::new_unchecked(node.into_string()).into(),
        oxrdf::Term::Literal(literal) => {
            if let Some(language) = literal.language() {
                Literal::new_language_tagged_literal_unchecked(literal.value(), language)
            } else if literal.datatype().as_str() == xsd::STRING {
                Literal::new_simple_literal(literal.value())
            } else {
                Literal::new_typed_literal(
                    literal.value(),
                    NamedNode::new_unchecked(literal.datatype().as_str()),
                )
            }
            .into()
        }
    }
}

fn named_node_to_oxrdf(node: &NamedNode) -> oxrdf::NamedNode {
    oxrdf::NamedNode::new_unchecked(encode_iri(node.as_str()))
}

fn to_oxrdf(triple: &Triple) -> oxrdf::Triple {
    let predicate = named_node_to_oxrdf(&triple.predicate);
    let object: oxrdf::Term = match &triple.object {
        Term::NamedNode(node) => named_node_to_oxrdf(node).into(),
        Term::BlankNode(node) => oxrdf::BlankNode::new_unchecked(node.as_str()).into(),
        Term::Literal(literal) => {
            if let Some(language) = literal.language() {
                oxrdf::Literal::new_language_tagged_literal_unchecked(literal.value(), language)
            } else if let Some(datatype) = literal.datatype() {
                oxrdf::Literal::new_typed_literal(literal.value(), named_node_to_oxrdf(datatype))
            } else {
                oxrdf::Literal::new_simple_literal(literal.value())
            }
            .into()
        }
    };
    match &triple.subject {
        Subject::NamedNode(node) => oxrdf::Triple::new(named_node_to_oxrdf(node), predicate, object),
        Subject::BlankNode(node) => oxrdf::Triple::new(
            oxrdf::BlankNode::new_unchecked(node.as_str()),
            predicate,
            object,
        ),
    }
}

/// Writes Turtle, declaring the prefixes of the namespace table.
pub(crate) struct TurtleWriter {
    inner: Option<LowLevelTurtleSerializer>,
}

impl TurtleWriter {
    pub(crate) fn new(namespaces: &Namespaces) -> Self {
        let serializer = namespaces
            .iter()
            .filter(|(prefix, namespace)| {
                let valid = Iri::parse(*namespace).is_ok();
                if !valid {
                    debug!("Skipping the prefix {prefix}: <{namespace}> is not an absolute IRI");
                }
                valid
            })
            .try_fold(TurtleSerializer::new(), |serializer, (prefix, namespace)| {
                serializer.with_prefix(prefix, namespace)
            })
            .unwrap_or_else(|e| {
                debug!("Writing Turtle without prefixes: {e}");
                TurtleSerializer::new()
            });
        Self {
            inner: Some(serializer.low_level()),
        }
    }
}

impl TriplesWriter for TurtleWriter {
    fn write_triple(&mut self, triple: &Triple, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        let serializer = self.inner.as_mut().ok_or_else(|| {
            SerializeError::Unserializable("The Turtle document is already closed".into())
        })?;
        serializer.serialize_triple(&to_oxrdf(triple), output)?;
        Ok(())
    }

    fn write_tail(&mut self, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        if let Some(mut serializer) = self.inner.take() {
            serializer.finish(output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparterm::Graph;
    use std::io;

    fn parse_graph(data: &'static str) -> Result<Graph, ParseError> {
        let ParsedResults::Graph(triples) = parse(Box::new(data.as_bytes()))? else {
            panic!("graph expected")
        };
        triples.collect_graph()
    }

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    #[test]
    fn prefixed_documents() -> Result<(), ParseError> {
        let graph = parse_graph(
            r#"@prefix ex: <http://example.com/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
ex:a a ex:Person ;
    ex:name "A", "B"@en ;
    ex:age "3"^^xsd:integer ;
    ex:knows [ ex:name "C" ] ."#,
        )?;
        assert_eq!(graph.len(), 6);
        assert!(graph.contains(&Triple::new(
            nn("http://example.com/a"),
            nn("http://www.w3.org/1999/02/22-rdf-syntax-ns#type"),
            nn("http://example.com/Person"),
        )));
        assert!(graph.contains(&Triple::new(
            nn("http://example.com/a"),
            nn("http://example.com/name"),
            Literal::new_simple_literal("A"),
        )));
        assert!(graph.contains(&Triple::new(
            nn("http://example.com/a"),
            nn("http://example.com/name"),
            Literal::new_language_tagged_literal_unchecked("B", "en"),
        )));
        assert!(graph.contains(&Triple::new(
            nn("http://example.com/a"),
            nn("http://example.com/age"),
            Literal::new_typed_literal("3", nn(xsd::INTEGER)),
        )));
        Ok(())
    }

    #[test]
    fn syntax_errors_carry_the_line() {
        let result = parse_graph("@prefix ex: <http://example.com/> .\nex:a ex:b .\n");
        let Err(ParseError::Syntax(error)) = result else {
            panic!("syntax error expected")
        };
        assert_eq!(error.line(), Some(2));
    }

    #[test]
    fn writer_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let triples = [
            Triple::new(
                nn("http://example.com/a b"),
                nn("http://example.com/p"),
                Literal::new_language_tagged_literal_unchecked("x \"y\"", "en"),
            ),
            Triple::new(
                nn("http://example.com/a b"),
                nn("http://example.com/p"),
                BlankNode::new_unchecked("b1"),
            ),
            Triple::new(
                BlankNode::new_unchecked("b1"),
                nn("http://other.org/q"),
                Literal::new_typed_literal("1", nn(xsd::INTEGER)),
            ),
        ];
        let mut writer = TurtleWriter::new(&Namespaces::default().with("ex", "http://example.com/"));
        let mut output = Vec::new();
        writer.write_head(&mut output)?;
        for triple in &triples {
            writer.write_triple(triple, &mut output)?;
        }
        writer.write_tail(&mut output)?;
        let text = String::from_utf8(output)?;
        assert!(text.starts_with("@prefix ex: <http://example.com/> ."), "{text}");
        assert!(!text.contains("a b"), "{text}");

        let ParsedResults::Graph(parsed) = parse(Box::new(io::Cursor::new(text.into_bytes())))?
        else {
            panic!("graph expected")
        };
        let graph = parsed.collect_graph()?;
        assert_eq!(graph.len(), 3);
        assert!(graph.contains(&Triple::new(
            nn("http://example.com/a%20b"),
            nn("http://example.com/p"),
            Literal::new_language_tagged_literal_unchecked("x \"y\"", "en"),
        )));
        assert!(graph.contains(&Triple::new(
            graph
                .objects_for_subject_predicate(
                    &nn("http://example.com/a%20b").into(),
                    &nn("http://example.com/p"),
                )
                .find_map(|object| match object {
                    Term::BlankNode(node) => Some(node.clone()),
                    _ => None,
                })
                .ok_or("blank node expected")?,
            nn("http://other.org/q"),
            Literal::new_typed_literal("1", nn(xsd::INTEGER)),
        )));
        Ok(())
    }
}
