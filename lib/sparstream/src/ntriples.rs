//! [N-Triples](https://www.w3.org/TR/n-triples/) parser and serializer.

use crate::error::{ParseError, SerializeError, SyntaxError};
use crate::results::{ParsedResults, Triples};
use crate::serializer::TriplesWriter;
use sparterm::{BlankNode, Literal, NamedNode, Subject, Term, Triple, encode_iri, print_quoted_str};
use std::io::{BufRead, Write};

pub(crate) fn parse(reader: Box<dyn BufRead + Send>) -> Result<ParsedResults, ParseError> {
    Ok(ParsedResults::Graph(Triples::new(NTriplesReader::new(reader))))
}

/// Reads triples line by line.
pub(crate) struct NTriplesReader<R: BufRead> {
    reader: R,
    buffer: String,
    line_number: u64,
    is_end: bool,
}

impl<R: BufRead> NTriplesReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
            line_number: 0,
            is_end: false,
        }
    }
}

impl<R: BufRead> Iterator for NTriplesReader<R> {
    type Item = Result<Triple, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.is_end {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => self.is_end = true,
                Ok(_) => {
                    self.line_number += 1;
                    match parse_line(&self.buffer) {
                        Ok(Some(triple)) => return Some(Ok(triple)),
                        Ok(None) => (),
                        Err(msg) => {
                            self.is_end = true;
                            return Some(Err(SyntaxError::located_message(
                                msg,
                                self.line_number,
                                &self.buffer,
                            )
                            .into()));
                        }
                    }
                }
                Err(e) => {
                    self.is_end = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }
}

/// Parses a line, returns `None` for blank and comment lines.
fn parse_line(line: &str) -> Result<Option<Triple>, String> {
    let mut cursor = Cursor { input: line };
    cursor.skip_whitespace();
    if cursor.is_line_end() {
        return Ok(None);
    }
    let subject = match cursor.peek() {
        Some('<') => Subject::NamedNode(cursor.read_iri()?),
        Some('_') => Subject::BlankNode(cursor.read_blank_node()?),
        _ => return Err("The subject must be an IRI or a blank node".into()),
    };
    cursor.skip_whitespace();
    if cursor.peek() != Some('<') {
        return Err("The predicate must be an IRI".into());
    }
    let predicate = cursor.read_iri()?;
    cursor.skip_whitespace();
    let object = match cursor.peek() {
        Some('<') => Term::NamedNode(cursor.read_iri()?),
        Some('_') => Term::BlankNode(cursor.read_blank_node()?),
        Some('"') => Term::Literal(cursor.read_literal()?),
        _ => return Err("The object must be an IRI, a blank node or a literal".into()),
    };
    cursor.skip_whitespace();
    if !cursor.consume('.') {
        return Err("Triples must end with a '.'".into());
    }
    cursor.skip_whitespace();
    if !cursor.is_line_end() {
        return Err("Unexpected content after the end of the triple".into());
    }
    Ok(Some(Triple {
        subject,
        predicate,
        object,
    }))
}

struct Cursor<'a> {
    input: &'a str,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.input.chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.input = &self.input[c.len_utf8()..];
        Some(c)
    }

    fn consume(&mut self, c: char) -> bool {
        if let Some(rest) = self.input.strip_prefix(c) {
            self.input = rest;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        self.input = self.input.trim_start_matches([' ', '\t']);
    }

    fn is_line_end(&self) -> bool {
        self.input.is_empty() || self.input.starts_with(['#', '\n', '\r'])
    }

    fn read_iri(&mut self) -> Result<NamedNode, String> {
        self.consume('<');
        let mut iri = String::new();
        loop {
            match self.next_char() {
                Some('>') => return Ok(NamedNode::new_unchecked(iri)),
                Some('\\') => iri.push(self.read_unicode_escape()?),
                Some('\n' | '\r') | None => return Err("Unterminated IRI".into()),
                Some(c) => iri.push(c),
            }
        }
    }

    fn read_blank_node(&mut self) -> Result<BlankNode, String> {
        let Some(rest) = self.input.strip_prefix("_:") else {
            return Err("Blank nodes must start with '_:'".into());
        };
        let end = rest
            .find([' ', '\t', '\n', '\r', '<', '"'])
            .unwrap_or(rest.len());
        // A dot may appear inside an id but never at its end
        let id = rest[..end].trim_end_matches('.');
        let node =
            BlankNode::new(id).map_err(|e| format!("Invalid blank node id '{id}': {e}"))?;
        self.input = &rest[id.len()..];
        Ok(node)
    }

    fn read_literal(&mut self) -> Result<Literal, String> {
        self.consume('"');
        let mut value = String::new();
        loop {
            match self.next_char() {
                Some('"') => break,
                Some('\\') => value.push(match self.peek() {
                    Some('u' | 'U') => self.read_unicode_escape()?,
                    _ => match self.next_char() {
                        Some('t') => '\t',
                        Some('b') => '\u{08}',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('f') => '\u{0C}',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('\\') => '\\',
                        _ => return Err("Invalid escape sequence in literal".into()),
                    },
                }),
                Some('\n' | '\r') | None => return Err("Unterminated literal".into()),
                Some(c) => value.push(c),
            }
        }
        if self.consume('@') {
            let end = self
                .input
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                .unwrap_or(self.input.len());
            let language = &self.input[..end];
            self.input = &self.input[end..];
            Literal::new_language_tagged_literal(value, language)
                .map_err(|e| format!("Invalid language tag '{language}': {e}"))
        } else if self.input.starts_with("^^") {
            self.input = &self.input[2..];
            if self.peek() != Some('<') {
                return Err("The datatype must be an IRI".into());
            }
            Ok(Literal::new_typed_literal(value, self.read_iri()?))
        } else {
            Ok(Literal::new_simple_literal(value))
        }
    }

    /// Reads `uXXXX` or `UXXXXXXXX`, the backslash being already consumed.
    fn read_unicode_escape(&mut self) -> Result<char, String> {
        let len = match self.next_char() {
            Some('u') => 4,
            Some('U') => 8,
            _ => return Err("Invalid escape sequence".into()),
        };
        let digits = self
            .input
            .get(..len)
            .ok_or_else(|| "Truncated unicode escape sequence".to_owned())?;
        let c = u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| format!("Invalid unicode escape sequence '{digits}'"))?;
        self.input = &self.input[len..];
        Ok(c)
    }
}

/// Writes one triple per line, percent-encoding the IRIs.
#[derive(Default)]
pub(crate) struct NTriplesWriter;

impl TriplesWriter for NTriplesWriter {
    fn write_triple(&mut self, triple: &Triple, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        match &triple.subject {
            Subject::NamedNode(node) => write_iri(node, output)?,
            Subject::BlankNode(node) => write!(output, "{node}")?,
        }
        output.push(b' ');
        write_iri(&triple.predicate, output)?;
        output.push(b' ');
        match &triple.object {
            Term::NamedNode(node) => write_iri(node, output)?,
            Term::BlankNode(node) => write!(output, "{node}")?,
            Term::Literal(literal) => {
                let (value, datatype, language) = (
                    literal.value(),
                    literal.datatype(),
                    literal.language(),
                );
                let mut quoted = String::with_capacity(value.len() + 2);
                print_quoted_str(value, &mut quoted)
                    .map_err(|_| SerializeError::Unserializable(value.to_owned()))?;
                output.extend_from_slice(quoted.as_bytes());
                if let Some(language) = language {
                    write!(output, "@{language}")?;
                } else if let Some(datatype) = datatype {
                    output.extend_from_slice(b"^^");
                    write_iri(datatype, output)?;
                }
            }
        }
        output.extend_from_slice(b" .\n");
        Ok(())
    }
}

fn write_iri(node: &NamedNode, output: &mut Vec<u8>) -> Result<(), SerializeError> {
    write!(output, "<{}>", encode_iri(node.as_str()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(data: &str) -> Result<Vec<Triple>, ParseError> {
        NTriplesReader::new(data.as_bytes()).collect()
    }

    fn serialize(triples: &[Triple]) -> String {
        let mut output = Vec::new();
        let mut writer = NTriplesWriter;
        for t in triples {
            writer.write_triple(t, &mut output).unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn parses_all_term_kinds() {
        let triples = parse_all(
            "# comment\n\
             <http://e.com/s> <http://e.com/p> <http://e.com/o> .\n\
             \n\
             _:b1 <http://e.com/p> \"a\\tb\\u00E9\" . # trailing\n\
             _:b1 <http://e.com/p> \"chat\"@fr .\n\
             <http://e.com/s> <http://e.com/p> \"1\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n",
        )
        .unwrap();
        assert_eq!(triples.len(), 4);
        assert_eq!(triples[1].subject, BlankNode::new_unchecked("b1").into());
        assert_eq!(
            triples[1].object,
            Literal::new_simple_literal("a\tb\u{e9}").into()
        );
        assert_eq!(
            triples[2].object,
            Literal::new_language_tagged_literal_unchecked("chat", "fr").into()
        );
        assert_eq!(
            triples[3].object,
            Literal::new_typed_literal(
                "1",
                NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#integer")
            )
            .into()
        );
    }

    #[test]
    fn blank_node_with_inner_dot() {
        let triples = parse_all("_:a.b <http://e.com/p> _:c.\n").unwrap();
        assert_eq!(triples[0].subject, BlankNode::new_unchecked("a.b").into());
        assert_eq!(triples[0].object, BlankNode::new_unchecked("c").into());
    }

    #[test]
    fn error_reports_line_and_fragment() {
        let error = parse_all("<http://e.com/s> <http://e.com/p> <http://e.com/o> .\n<http://e.com/s> <http://e.com/p> .\n")
            .unwrap_err();
        let ParseError::Syntax(error) = error else {
            panic!("syntax error expected")
        };
        assert_eq!(error.line(), Some(2));
        assert_eq!(error.fragment(), Some("<http://e.com/s> <http://e.com/p> ."));
    }

    #[test]
    fn serialization_encodes_iris() {
        let triple = Triple::new(
            NamedNode::new_unchecked("http://example.com/foo bar"),
            NamedNode::new_unchecked("http://example.com/p"),
            Literal::new_simple_literal("x y"),
        );
        assert_eq!(
            serialize(&[triple]),
            "<http://example.com/foo%20bar> <http://example.com/p> \"x y\" .\n"
        );
    }

    #[test]
    fn serialization_round_trip() {
        let triples = vec![
            Triple::new(
                BlankNode::new_unchecked("x"),
                NamedNode::new_unchecked("http://e.com/p"),
                Literal::new_language_tagged_literal_unchecked("line\nbreak \"quoted\"", "en"),
            ),
            Triple::new(
                NamedNode::new_unchecked("http://e.com/s"),
                NamedNode::new_unchecked("http://e.com/p"),
                Literal::new_typed_literal("2", NamedNode::new_unchecked("http://e.com/dt")),
            ),
        ];
        assert_eq!(parse_all(&serialize(&triples)).unwrap(), triples);
    }
}
