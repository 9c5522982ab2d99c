//! Implementation of [SPARQL Query Results JSON Format](https://www.w3.org/TR/sparql11-results-json/)

use crate::binding::Binding;
use crate::error::{ParseError, SerializeError, SyntaxError};
use crate::results::{ParsedResults, Solutions};
use crate::serializer::SolutionsWriter;
use json_event_parser::{JsonEvent, ReaderJsonParser, WriterJsonSerializer};
use sparterm::{BlankNode, Literal, NamedNode, Term, Variable};
use std::io::BufRead;
use std::mem::take;
use std::sync::Arc;

type JsonReader = ReaderJsonParser<Box<dyn BufRead + Send>>;

/// Reads until the kind of the result is known.
///
/// Bindings met before the variables are buffered; otherwise they are read lazily.
pub(crate) fn parse(reader: Box<dyn BufRead + Send>) -> Result<ParsedResults, ParseError> {
    let mut parser = ReaderJsonParser::new(reader);
    let mut header = HeaderReader::default();
    let found = loop {
        if let Some(found) = header.read_event(parser.parse_next()?)? {
            break found;
        }
    };
    Ok(match found {
        Header::Boolean(value) => ParsedResults::Boolean(value),
        Header::Streaming(variables) => {
            let fields: Arc<[Variable]> = variables.into();
            ParsedResults::Solutions(Solutions::new(
                Arc::clone(&fields),
                RowReader {
                    parser,
                    rows: RowParser::default(),
                    fields,
                    is_done: false,
                },
            ))
        }
        Header::Buffered(variables, rows) => {
            let fields: Arc<[Variable]> = variables.into();
            let row_fields = Arc::clone(&fields);
            ParsedResults::Solutions(Solutions::new(
                fields,
                rows.into_iter()
                    .map(move |row| -> Result<Binding, ParseError> {
                        Ok(build_binding(&row_fields, row)?)
                    }),
            ))
        }
    })
}

enum Header {
    Boolean(bool),
    /// The variables are known and the parser is at the start of the bindings array.
    Streaming(Vec<Variable>),
    /// The whole document has been read.
    Buffered(Vec<Variable>, Vec<Vec<(String, Term)>>),
}

#[derive(Default)]
struct HeaderReader {
    state: HeaderState,
    variables: Vec<Variable>,
    has_variables: bool,
    buffered_rows: Option<Vec<Vec<(String, Term)>>>,
}

#[derive(Default)]
enum HeaderState {
    #[default]
    Start,
    Root,
    BeforeHead,
    Head,
    BeforeVars,
    Vars,
    BeforeResults,
    Results,
    BeforeBindings,
    Bindings(RowParser),
    BeforeBoolean,
    Skip {
        depth: usize,
        then: Resume,
    },
}

#[derive(Clone, Copy)]
enum Resume {
    Root,
    Head,
    Results,
}

impl HeaderReader {
    fn read_event(&mut self, event: JsonEvent<'_>) -> Result<Option<Header>, SyntaxError> {
        if event == JsonEvent::Eof {
            return Err(SyntaxError::msg(
                "Unexpected end of the SPARQL JSON results document",
            ));
        }
        match &mut self.state {
            HeaderState::Start => {
                if event != JsonEvent::StartObject {
                    return Err(SyntaxError::msg("SPARQL JSON results must be an object"));
                }
                self.state = HeaderState::Root;
            }
            HeaderState::Root => match event {
                JsonEvent::ObjectKey(key) => {
                    self.state = match key.as_ref() {
                        "head" => HeaderState::BeforeHead,
                        "results" => HeaderState::BeforeResults,
                        "boolean" => HeaderState::BeforeBoolean,
                        _ => skip(Resume::Root),
                    }
                }
                JsonEvent::EndObject => {
                    let Some(rows) = self.buffered_rows.take() else {
                        return Err(SyntaxError::msg(
                            "SPARQL JSON results must contain a 'boolean' or a 'results' key",
                        ));
                    };
                    // No declared variables: the fields are the names used by the rows
                    let mut variables = take(&mut self.variables);
                    for (name, _) in rows.iter().flatten() {
                        if !variables.iter().any(|v| v.as_str() == name) {
                            variables.push(new_variable(name)?);
                        }
                    }
                    return Ok(Some(Header::Buffered(variables, rows)));
                }
                _ => return Err(SyntaxError::msg("Unexpected JSON value in the root object")),
            },
            HeaderState::BeforeHead => {
                if event != JsonEvent::StartObject {
                    return Err(SyntaxError::msg("SPARQL JSON results head must be an object"));
                }
                self.state = HeaderState::Head;
            }
            HeaderState::Head => match event {
                JsonEvent::ObjectKey(key) if key == "vars" => self.state = HeaderState::BeforeVars,
                // "link" and anything unknown
                JsonEvent::ObjectKey(_) => self.state = skip(Resume::Head),
                JsonEvent::EndObject => self.state = HeaderState::Root,
                _ => return Err(SyntaxError::msg("Unexpected JSON value in the head object")),
            },
            HeaderState::BeforeVars => {
                if event != JsonEvent::StartArray {
                    return Err(SyntaxError::msg("SPARQL JSON results vars must be an array"));
                }
                self.state = HeaderState::Vars;
            }
            HeaderState::Vars => match event {
                JsonEvent::String(name) => {
                    let variable = new_variable(&name)?;
                    if self.variables.contains(&variable) {
                        return Err(SyntaxError::msg(format!(
                            "The variable {variable} is declared twice"
                        )));
                    }
                    self.variables.push(variable);
                }
                JsonEvent::EndArray => {
                    self.has_variables = true;
                    if let Some(rows) = self.buffered_rows.take() {
                        return Ok(Some(Header::Buffered(take(&mut self.variables), rows)));
                    }
                    self.state = HeaderState::Head;
                }
                _ => {
                    return Err(SyntaxError::msg(
                        "Variables name in the vars array must be strings",
                    ));
                }
            },
            HeaderState::BeforeResults => {
                if event != JsonEvent::StartObject {
                    return Err(SyntaxError::msg(
                        "SPARQL JSON results result must be an object",
                    ));
                }
                self.state = HeaderState::Results;
            }
            HeaderState::Results => match event {
                JsonEvent::ObjectKey(key) if key == "bindings" => {
                    self.state = HeaderState::BeforeBindings;
                }
                JsonEvent::ObjectKey(_) => self.state = skip(Resume::Results),
                JsonEvent::EndObject => {
                    if self.buffered_rows.is_none() {
                        return Err(SyntaxError::msg(
                            "The results object must contain a 'bindings' key",
                        ));
                    }
                    self.state = HeaderState::Root;
                }
                _ => return Err(SyntaxError::msg("Unexpected JSON value in the results object")),
            },
            HeaderState::BeforeBindings => {
                if event != JsonEvent::StartArray {
                    return Err(SyntaxError::msg(
                        "SPARQL JSON results bindings must be an array",
                    ));
                }
                if self.has_variables {
                    return Ok(Some(Header::Streaming(take(&mut self.variables))));
                }
                self.state = HeaderState::Bindings(RowParser::default());
            }
            HeaderState::Bindings(rows) => match rows.read_event(event)? {
                Some(RowEvent::Row(row)) => self.buffered_rows.get_or_insert_default().push(row),
                Some(RowEvent::End) => {
                    self.buffered_rows.get_or_insert_default();
                    self.state = HeaderState::Results;
                }
                None => (),
            },
            HeaderState::BeforeBoolean => {
                let JsonEvent::Boolean(value) = event else {
                    return Err(SyntaxError::msg("The boolean value must be true or false"));
                };
                return Ok(Some(Header::Boolean(value)));
            }
            HeaderState::Skip { depth, then } => {
                match event {
                    JsonEvent::StartArray | JsonEvent::StartObject => *depth += 1,
                    JsonEvent::EndArray | JsonEvent::EndObject => *depth -= 1,
                    _ => (),
                }
                if *depth == 0 {
                    self.state = match then {
                        Resume::Root => HeaderState::Root,
                        Resume::Head => HeaderState::Head,
                        Resume::Results => HeaderState::Results,
                    };
                }
            }
        }
        Ok(None)
    }
}

fn skip(then: Resume) -> HeaderState {
    HeaderState::Skip { depth: 0, then }
}

fn new_variable(name: &str) -> Result<Variable, SyntaxError> {
    Variable::new(name)
        .map_err(|e| SyntaxError::msg(format!("Invalid variable name '{name}': {e}")))
}

fn build_binding(fields: &Arc<[Variable]>, row: Vec<(String, Term)>) -> Result<Binding, SyntaxError> {
    let mut values = vec![None; fields.len()];
    for (name, term) in row {
        let index = fields
            .iter()
            .position(|v| v.as_str() == name)
            .ok_or_else(|| {
                SyntaxError::msg(format!(
                    "The variable {name} has not been defined in the header"
                ))
            })?;
        values[index] = Some(term);
    }
    Ok(Binding::new(Arc::clone(fields), values))
}

/// Lazy reading of the bindings array.
struct RowReader {
    parser: JsonReader,
    rows: RowParser,
    fields: Arc<[Variable]>,
    is_done: bool,
}

impl Iterator for RowReader {
    type Item = Result<Binding, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.is_done {
            let result = match self.parser.parse_next() {
                Ok(JsonEvent::Eof) => Err(SyntaxError::msg(
                    "Unexpected end of the SPARQL JSON results bindings",
                )
                .into()),
                Ok(event) => self.rows.read_event(event).map_err(ParseError::from),
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(None) => (),
                Ok(Some(RowEvent::Row(row))) => {
                    return Some(build_binding(&self.fields, row).map_err(Into::into));
                }
                // What follows the bindings array carries nothing more
                Ok(Some(RowEvent::End)) => self.is_done = true,
                Err(e) => {
                    self.is_done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

enum RowEvent {
    Row(Vec<(String, Term)>),
    End,
}

/// Reads the elements of the bindings array.
#[derive(Default)]
struct RowParser {
    state: RowState,
    row: Vec<(String, Term)>,
}

#[derive(Default)]
enum RowState {
    #[default]
    BeforeRow,
    InRow,
    Term {
        name: String,
        term: TermReader,
    },
}

impl RowParser {
    fn read_event(&mut self, event: JsonEvent<'_>) -> Result<Option<RowEvent>, SyntaxError> {
        match &mut self.state {
            RowState::BeforeRow => match event {
                JsonEvent::StartObject => self.state = RowState::InRow,
                JsonEvent::EndArray => return Ok(Some(RowEvent::End)),
                _ => return Err(SyntaxError::msg("Expecting a new solution object")),
            },
            RowState::InRow => match event {
                JsonEvent::ObjectKey(name) => {
                    self.state = RowState::Term {
                        name: name.into_owned(),
                        term: TermReader::default(),
                    }
                }
                JsonEvent::EndObject => {
                    self.state = RowState::BeforeRow;
                    return Ok(Some(RowEvent::Row(take(&mut self.row))));
                }
                _ => return Err(SyntaxError::msg("Unexpected JSON value in a solution")),
            },
            RowState::Term { name, term } => {
                if let Some(term) = term.read_event(event)? {
                    self.row.push((take(name), term));
                    self.state = RowState::InRow;
                }
            }
        }
        Ok(None)
    }
}

/// Reads one `{"type": ..., "value": ...}` object.
#[derive(Default)]
struct TermReader {
    state: TermState,
    term_type: Option<String>,
    value: Option<String>,
    language: Option<String>,
    datatype: Option<String>,
}

#[derive(Default)]
enum TermState {
    #[default]
    Start,
    Keys,
    Type,
    Value,
    Language,
    Datatype,
    Skip(usize),
}

impl TermReader {
    fn read_event(&mut self, event: JsonEvent<'_>) -> Result<Option<Term>, SyntaxError> {
        match &mut self.state {
            TermState::Start => {
                if event != JsonEvent::StartObject {
                    return Err(SyntaxError::msg("RDF terms must be encoded using objects"));
                }
                self.state = TermState::Keys;
            }
            TermState::Keys => match event {
                JsonEvent::ObjectKey(key) => {
                    self.state = match key.as_ref() {
                        "type" => TermState::Type,
                        "value" => TermState::Value,
                        "xml:lang" | "lang" => TermState::Language,
                        "datatype" => TermState::Datatype,
                        _ => TermState::Skip(0),
                    }
                }
                JsonEvent::EndObject => return self.build().map(Some),
                _ => return Err(SyntaxError::msg("Unexpected JSON value in a term")),
            },
            TermState::Type | TermState::Value | TermState::Language | TermState::Datatype => {
                let JsonEvent::String(value) = event else {
                    return Err(SyntaxError::msg("Term keys must have string values"));
                };
                let value = Some(value.into_owned());
                match self.state {
                    TermState::Type => self.term_type = value,
                    TermState::Value => self.value = value,
                    TermState::Language => self.language = value,
                    _ => self.datatype = value,
                }
                self.state = TermState::Keys;
            }
            TermState::Skip(depth) => {
                match event {
                    JsonEvent::StartArray | JsonEvent::StartObject => *depth += 1,
                    JsonEvent::EndArray | JsonEvent::EndObject => *depth -= 1,
                    _ => (),
                }
                if *depth == 0 {
                    self.state = TermState::Keys;
                }
            }
        }
        Ok(None)
    }

    fn build(&mut self) -> Result<Term, SyntaxError> {
        let term_type = self
            .term_type
            .take()
            .ok_or_else(|| SyntaxError::msg("Term serialization should have a 'type' key"))?;
        let value = self.value.take().ok_or_else(|| {
            SyntaxError::msg(format!(
                "{term_type} serialization should have a 'value' key"
            ))
        })?;
        Ok(match term_type.as_str() {
            "uri" => NamedNode::new_unchecked(value).into(),
            "bnode" => BlankNode::new_unchecked(value).into(),
            "literal" | "typed-literal" => match (self.language.take(), self.datatype.take()) {
                (Some(language), _) => {
                    Literal::new_language_tagged_literal_unchecked(value, language)
                }
                (None, Some(datatype)) => {
                    Literal::new_typed_literal(value, NamedNode::new_unchecked(datatype))
                }
                (None, None) => Literal::new_simple_literal(value),
            }
            .into(),
            _ => {
                return Err(SyntaxError::msg(format!(
                    "Unexpected term type: '{term_type}'"
                )));
            }
        })
    }
}

/// Writes compact SPARQL JSON results.
#[derive(Default)]
pub(crate) struct SrjWriter {
    has_bindings: bool,
}

impl SolutionsWriter for SrjWriter {
    fn write_boolean(&mut self, value: bool, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        let mut serializer = WriterJsonSerializer::new(output);
        for event in [
            JsonEvent::StartObject,
            JsonEvent::ObjectKey("head".into()),
            JsonEvent::StartObject,
            JsonEvent::EndObject,
            JsonEvent::ObjectKey("boolean".into()),
            JsonEvent::Boolean(value),
            JsonEvent::EndObject,
        ] {
            serializer.serialize_event(event)?;
        }
        serializer.finish()?;
        Ok(())
    }

    fn write_head(
        &mut self,
        fields: &[Variable],
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        output.extend_from_slice(b"{\"head\":{\"vars\":[");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                output.push(b',');
            }
            let mut serializer = WriterJsonSerializer::new(&mut *output);
            serializer.serialize_event(JsonEvent::String(field.as_str().into()))?;
            serializer.finish()?;
        }
        output.extend_from_slice(b"]},\"results\":{\"bindings\":[");
        Ok(())
    }

    fn write_binding(
        &mut self,
        binding: &Binding,
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        if self.has_bindings {
            output.push(b',');
        }
        self.has_bindings = true;
        let mut serializer = WriterJsonSerializer::new(output);
        serializer.serialize_event(JsonEvent::StartObject)?;
        for (field, term) in binding {
            serializer.serialize_event(JsonEvent::ObjectKey(field.as_str().into()))?;
            serializer.serialize_event(JsonEvent::StartObject)?;
            let (term_type, value) = match term {
                Term::NamedNode(node) => ("uri", node.as_str()),
                Term::BlankNode(node) => ("bnode", node.as_str()),
                Term::Literal(literal) => ("literal", literal.value()),
            };
            serializer.serialize_event(JsonEvent::ObjectKey("type".into()))?;
            serializer.serialize_event(JsonEvent::String(term_type.into()))?;
            serializer.serialize_event(JsonEvent::ObjectKey("value".into()))?;
            serializer.serialize_event(JsonEvent::String(value.into()))?;
            if let Term::Literal(literal) = term {
                if let Some(language) = literal.language() {
                    serializer.serialize_event(JsonEvent::ObjectKey("xml:lang".into()))?;
                    serializer.serialize_event(JsonEvent::String(language.into()))?;
                } else if let Some(datatype) = literal.datatype() {
                    serializer.serialize_event(JsonEvent::ObjectKey("datatype".into()))?;
                    serializer.serialize_event(JsonEvent::String(datatype.as_str().into()))?;
                }
            }
            serializer.serialize_event(JsonEvent::EndObject)?;
        }
        serializer.serialize_event(JsonEvent::EndObject)?;
        serializer.finish()?;
        Ok(())
    }

    fn write_tail(&mut self, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        output.extend_from_slice(b"]}}");
        Ok(())
    }
}
