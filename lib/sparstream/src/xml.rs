//! Implementation of [SPARQL Query Results XML Format](https://www.w3.org/TR/rdf-sparql-XMLres/)

use crate::binding::Binding;
use crate::error::{ParseError, SerializeError, SyntaxError};
use crate::pipeline::{Pipeline, Producer};
use crate::results::{ParsedResults, Solutions};
use crate::serializer::SolutionsWriter;
use quick_xml::NsReader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use sparterm::{BlankNode, Literal, NamedNode, Term, Variable};
use std::io::{BufRead, Write};
use std::mem::take;
use std::sync::Arc;

const SPARQL_RESULTS_NAMESPACE: &str = "http://www.w3.org/2005/sparql-results#";

/// What the reader thread sends to the consumer.
enum SrxEvent {
    Boolean(bool),
    Head(Vec<Variable>),
    Row(Vec<Option<Term>>),
}

/// Starts the reader thread and waits until it knows the kind of the result.
pub(crate) fn parse(reader: Box<dyn BufRead + Send>) -> Result<ParsedResults, ParseError> {
    let mut pipeline = Pipeline::spawn("sparql-xml-reader", move |producer| {
        SrxReader::new(reader).run(producer)
    })?;
    match pipeline.next() {
        Some(Ok(SrxEvent::Boolean(value))) => Ok(ParsedResults::Boolean(value)),
        Some(Ok(SrxEvent::Head(variables))) => {
            let fields: Arc<[Variable]> = variables.into();
            let row_fields = Arc::clone(&fields);
            Ok(ParsedResults::Solutions(Solutions::new(
                fields,
                pipeline.map(move |event| -> Result<Binding, ParseError> {
                    match event? {
                        SrxEvent::Row(values) => Ok(Binding::new(Arc::clone(&row_fields), values)),
                        SrxEvent::Boolean(_) | SrxEvent::Head(_) => {
                            Err(SyntaxError::msg("Unexpected second header in the results").into())
                        }
                    }
                }),
            )))
        }
        Some(Ok(SrxEvent::Row(_))) => {
            Err(SyntaxError::msg("A <result> has been found before the <head>").into())
        }
        Some(Err(error)) => Err(error),
        None => Err(early_end()),
    }
}

#[derive(Clone, Copy)]
enum TermKind {
    Uri,
    BNode,
    Literal,
}

enum State {
    Start,
    Sparql,
    Head,
    AfterHead,
    Boolean,
    Results,
    Result,
    Binding(usize),
    Term { index: usize, kind: TermKind },
    End,
}

struct SrxReader<R: BufRead> {
    reader: NsReader<R>,
    state: State,
    variables: Vec<Variable>,
    row: Vec<Option<Term>>,
    text: String,
    language: Option<String>,
    datatype: Option<String>,
    /// Depth inside ignored elements such as `<link>`
    ignored_depth: usize,
}

impl<R: BufRead> SrxReader<R> {
    fn new(source: R) -> Self {
        let mut reader = NsReader::from_reader(source);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            state: State::Start,
            variables: Vec::new(),
            row: Vec::new(),
            text: String::new(),
            language: None,
            datatype: None,
            ignored_depth: 0,
        }
    }

    fn run(mut self, producer: &Producer<SrxEvent>) -> Result<(), ParseError> {
        let mut buffer = Vec::new();
        loop {
            if producer.is_cancelled() {
                return Ok(());
            }
            buffer.clear();
            let keep_going = match self.reader.read_event_into(&mut buffer)? {
                Event::Start(event) => self.on_start(&event, producer)?,
                Event::End(_) => {
                    if self.ignored_depth > 0 {
                        self.ignored_depth -= 1;
                        true
                    } else {
                        self.on_end(producer)?
                    }
                }
                Event::Text(event) => {
                    let text = event.unescape()?;
                    self.on_text(&text)?;
                    true
                }
                Event::CData(event) => {
                    let text = self.reader.decoder().decode(&event)?.into_owned();
                    self.on_text(&text)?;
                    true
                }
                Event::Eof => {
                    return if matches!(self.state, State::End) {
                        Ok(())
                    } else {
                        Err(early_end())
                    };
                }
                _ => true,
            };
            if !keep_going {
                return Ok(());
            }
        }
    }

    fn on_start(
        &mut self,
        event: &BytesStart<'_>,
        producer: &Producer<SrxEvent>,
    ) -> Result<bool, ParseError> {
        if self.ignored_depth > 0 {
            self.ignored_depth += 1;
            return Ok(true);
        }
        let local_name = event.local_name();
        let name = local_name.as_ref();
        match self.state {
            State::Start => {
                let (namespace, _) = self.reader.resolve_element(event.name());
                let in_results_namespace = matches!(
                    namespace,
                    ResolveResult::Bound(namespace)
                        if namespace.as_ref() == SPARQL_RESULTS_NAMESPACE.as_bytes()
                );
                if name != b"sparql" || !in_results_namespace {
                    return Err(self.unexpected_tag(
                        &format!("<sparql> in the {SPARQL_RESULTS_NAMESPACE} namespace"),
                        event,
                    ));
                }
                self.state = State::Sparql;
            }
            State::Sparql => {
                if name != b"head" {
                    return Err(self.unexpected_tag("<head>", event));
                }
                self.state = State::Head;
            }
            State::Head => match name {
                b"variable" => {
                    let name = self.attribute(event, b"name")?.ok_or_else(|| {
                        SyntaxError::msg("No name attribute found for the <variable> tag")
                    })?;
                    let variable = Variable::new(name).map_err(|e| {
                        SyntaxError::msg(format!("Invalid variable name: {e}"))
                    })?;
                    if self.variables.contains(&variable) {
                        return Err(SyntaxError::msg(format!(
                            "The variable {variable} is declared twice"
                        ))
                        .into());
                    }
                    self.variables.push(variable);
                    self.ignored_depth = 1;
                }
                b"link" => self.ignored_depth = 1,
                _ => return Err(self.unexpected_tag("<variable> or <link>", event)),
            },
            State::AfterHead => match name {
                b"boolean" => self.state = State::Boolean,
                b"results" => {
                    self.state = State::Results;
                    return Ok(producer.send(SrxEvent::Head(self.variables.clone())));
                }
                b"link" => self.ignored_depth = 1,
                _ => return Err(self.unexpected_tag("<boolean> or <results>", event)),
            },
            State::Results => {
                if name != b"result" {
                    return Err(self.unexpected_tag("<result>", event));
                }
                self.row = vec![None; self.variables.len()];
                self.state = State::Result;
            }
            State::Result => {
                if name != b"binding" {
                    return Err(self.unexpected_tag("<binding>", event));
                }
                let name = self.attribute(event, b"name")?.ok_or_else(|| {
                    SyntaxError::msg("No name attribute found for the <binding> tag")
                })?;
                let index = self
                    .variables
                    .iter()
                    .position(|v| v.as_str() == name)
                    .ok_or_else(|| {
                        SyntaxError::msg(format!(
                            "The variable '{name}' is used in a binding but not declared in the variables list"
                        ))
                    })?;
                self.state = State::Binding(index);
            }
            State::Binding(index) => {
                let kind = match name {
                    b"uri" => TermKind::Uri,
                    b"bnode" => TermKind::BNode,
                    b"literal" => {
                        self.language = None;
                        self.datatype = None;
                        for attr in event.attributes() {
                            let attr = attr?;
                            let value = attr
                                .decode_and_unescape_value(self.reader.decoder())?
                                .into_owned();
                            if attr.key.as_ref() == b"xml:lang" {
                                self.language = Some(value);
                            } else if attr.key.local_name().as_ref() == b"datatype" {
                                self.datatype = Some(value);
                            }
                        }
                        TermKind::Literal
                    }
                    _ => return Err(self.unexpected_tag("<uri>, <bnode> or <literal>", event)),
                };
                self.text.clear();
                self.state = State::Term { index, kind };
            }
            State::Boolean | State::Term { .. } | State::End => {
                return Err(self.unexpected_tag("no tag", event));
            }
        }
        Ok(true)
    }

    fn on_end(&mut self, producer: &Producer<SrxEvent>) -> Result<bool, ParseError> {
        match self.state {
            State::Head => self.state = State::AfterHead,
            State::Boolean => {
                let value = match self.text.trim() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    other => {
                        return Err(SyntaxError::msg(format!(
                            "Unexpected boolean value. Found '{other}'"
                        ))
                        .into());
                    }
                };
                self.state = State::End;
                return Ok(producer.send(SrxEvent::Boolean(value)));
            }
            State::Term { index, kind } => {
                let text = take(&mut self.text);
                self.row[index] = Some(match kind {
                    TermKind::Uri => NamedNode::new_unchecked(text).into(),
                    // A <bnode> without an id is a fresh blank node
                    TermKind::BNode if text.is_empty() => BlankNode::default().into(),
                    TermKind::BNode => BlankNode::new_unchecked(text).into(),
                    TermKind::Literal => {
                        match (self.language.take(), self.datatype.take()) {
                            (Some(language), _) => {
                                Literal::new_language_tagged_literal_unchecked(text, language)
                            }
                            (None, Some(datatype)) => {
                                Literal::new_typed_literal(text, NamedNode::new_unchecked(datatype))
                            }
                            (None, None) => Literal::new_simple_literal(text),
                        }
                        .into()
                    }
                });
                self.state = State::Binding(index);
            }
            State::Binding(_) => self.state = State::Result,
            State::Result => {
                self.state = State::Results;
                return Ok(producer.send(SrxEvent::Row(take(&mut self.row))));
            }
            State::Results | State::AfterHead | State::Sparql => self.state = State::End,
            State::Start | State::End => (),
        }
        Ok(true)
    }

    fn on_text(&mut self, text: &str) -> Result<(), ParseError> {
        match self.state {
            State::Term { .. } | State::Boolean => self.text.push_str(text),
            _ if self.ignored_depth > 0 || text.trim().is_empty() => (),
            _ => {
                return Err(
                    SyntaxError::msg(format!("Unexpected textual value found: '{text}'")).into(),
                );
            }
        }
        Ok(())
    }

    fn attribute(
        &self,
        event: &BytesStart<'_>,
        local_name: &[u8],
    ) -> Result<Option<String>, ParseError> {
        for attr in event.attributes() {
            let attr = attr?;
            if attr.key.local_name().as_ref() == local_name {
                return Ok(Some(
                    attr.decode_and_unescape_value(self.reader.decoder())?
                        .into_owned(),
                ));
            }
        }
        Ok(None)
    }

    fn unexpected_tag(&self, expected: &str, event: &BytesStart<'_>) -> ParseError {
        let found = self
            .reader
            .decoder()
            .decode(event.name().as_ref())
            .map_or_else(|_| "?".into(), |name| name.into_owned());
        SyntaxError::msg(format!("Expecting {expected}, found <{found}>")).into()
    }
}

fn early_end() -> ParseError {
    SyntaxError::msg(
        "Unexpected early file end. All results file should have a <head> and a <results> or <boolean> tag",
    )
    .into()
}

/// Writes the indented layout of the SPARQL XML results documents.
#[derive(Default)]
pub(crate) struct SrxWriter;

impl SolutionsWriter for SrxWriter {
    fn write_boolean(&mut self, value: bool, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        write!(
            output,
            "<?xml version=\"1.0\"?>\n<sparql xmlns=\"{SPARQL_RESULTS_NAMESPACE}\">\n  <head/>\n  <boolean>{value}</boolean>\n</sparql>\n"
        )?;
        Ok(())
    }

    fn write_head(
        &mut self,
        fields: &[Variable],
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        write!(
            output,
            "<?xml version=\"1.0\"?>\n<sparql xmlns=\"{SPARQL_RESULTS_NAMESPACE}\">\n  <head>\n"
        )?;
        for field in fields {
            writeln!(output, "    <variable name=\"{}\"/>", escape(field.as_str()))?;
        }
        output.extend_from_slice(b"  </head>\n  <results>\n");
        Ok(())
    }

    fn write_binding(
        &mut self,
        binding: &Binding,
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        output.extend_from_slice(b"    <result>\n");
        for (field, value) in binding {
            write!(
                output,
                "      <binding name=\"{}\">\n        ",
                escape(field.as_str())
            )?;
            match value {
                Term::NamedNode(node) => write!(output, "<uri>{}</uri>", escape(node.as_str()))?,
                Term::BlankNode(node) => {
                    write!(output, "<bnode>{}</bnode>", escape(node.as_str()))?;
                }
                Term::Literal(literal) => {
                    output.extend_from_slice(b"<literal");
                    if let Some(datatype) = literal.datatype() {
                        write!(output, " datatype=\"{}\"", escape(datatype.as_str()))?;
                    }
                    if let Some(language) = literal.language() {
                        write!(output, " xml:lang=\"{}\"", escape(language))?;
                    }
                    write!(output, ">{}</literal>", escape(literal.value()))?;
                }
            }
            output.extend_from_slice(b"\n      </binding>\n");
        }
        output.extend_from_slice(b"    </result>\n");
        Ok(())
    }

    fn write_tail(&mut self, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        output.extend_from_slice(b"  </results>\n</sparql>\n");
        Ok(())
    }
}
