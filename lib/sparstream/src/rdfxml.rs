//! [RDF/XML](https://www.w3.org/TR/rdf-syntax-grammar/) graphs.
//!
//! The parser runs a namespace aware XML reader on a producer thread.
//! The writer emits one `rdf:Description` per run of triples sharing a subject.

use crate::error::{ParseError, SerializeError, SyntaxError};
use crate::pipeline::{Pipeline, Producer};
use crate::results::{ParsedResults, Triples};
use crate::serializer::TriplesWriter;
use oxilangtag::LanguageTag;
use oxiri::Iri;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{LocalName, PrefixDeclaration, QName, ResolveResult};
use quick_xml::{NsReader, Writer};
use sparterm::vocab::rdf;
use sparterm::{BlankNode, Literal, NamedNode, Namespaces, Subject, Term, Triple, encode_iri};
use std::collections::HashSet;
use std::io::{BufRead, Write};

const RDF_ABOUT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#about";
const RDF_ABOUT_EACH: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#aboutEach";
const RDF_ABOUT_EACH_PREFIX: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#aboutEachPrefix";
const RDF_BAG_ID: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#bagID";
const RDF_DATATYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#datatype";
const RDF_DESCRIPTION: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Description";
const RDF_ID: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#ID";
const RDF_LI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#li";
const RDF_NODE_ID: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nodeID";
const RDF_PARSE_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#parseType";
const RDF_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#RDF";
const RDF_RESOURCE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#resource";

const RESERVED_RDF_ELEMENTS: [&str; 11] = [
    RDF_ABOUT,
    RDF_ABOUT_EACH,
    RDF_ABOUT_EACH_PREFIX,
    RDF_BAG_ID,
    RDF_DATATYPE,
    RDF_ID,
    RDF_LI,
    RDF_NODE_ID,
    RDF_PARSE_TYPE,
    RDF_RDF,
    RDF_RESOURCE,
];
const RESERVED_RDF_ATTRIBUTES: [&str; 5] = [
    RDF_ABOUT_EACH,
    RDF_ABOUT_EACH_PREFIX,
    RDF_LI,
    RDF_RDF,
    RDF_RESOURCE,
];

/// Starts the reader thread. Syntax errors show up while iterating the triples.
pub(crate) fn parse(reader: Box<dyn BufRead + Send>) -> Result<ParsedResults, ParseError> {
    let pipeline = Pipeline::spawn("rdf-xml-reader", move |producer| {
        RdfXmlReader::new(reader).run(producer)
    })?;
    Ok(ParsedResults::Graph(Triples::new(pipeline)))
}

enum NodeOrText {
    Node(Subject),
    Text(String),
}

enum State {
    Doc,
    Rdf {
        base_iri: Option<Iri<String>>,
        language: Option<String>,
    },
    NodeElt {
        base_iri: Option<Iri<String>>,
        language: Option<String>,
        subject: Subject,
        li_counter: u64,
    },
    PropertyElt {
        iri: NamedNode,
        base_iri: Option<Iri<String>>,
        language: Option<String>,
        subject: Subject,
        object: Option<NodeOrText>,
        id_attr: Option<NamedNode>,
        datatype_attr: Option<NamedNode>,
    },
    CollectionPropertyElt {
        iri: NamedNode,
        base_iri: Option<Iri<String>>,
        language: Option<String>,
        subject: Subject,
        objects: Vec<Subject>,
        id_attr: Option<NamedNode>,
    },
    LiteralPropertyElt {
        iri: NamedNode,
        base_iri: Option<Iri<String>>,
        language: Option<String>,
        subject: Subject,
        writer: Writer<Vec<u8>>,
        id_attr: Option<NamedNode>,
        /// `false` for unknown `rdf:parseType` values: the content is skipped
        emit: bool,
    },
}

/// What the next start tag opens, given the current state.
enum Production {
    Root,
    NodeElt,
    PropertyElt { subject: Subject },
}

#[derive(PartialEq, Eq)]
enum ParseType {
    Default,
    Collection,
    Literal,
    Resource,
    Other,
}

/// Attributes of an element, sorted by meaning.
#[derive(Default)]
struct Attributes {
    language: Option<String>,
    base_iri: Option<Iri<String>>,
    id: Option<NamedNode>,
    node_id: Option<BlankNode>,
    about: Option<NamedNode>,
    resource: Option<NamedNode>,
    datatype: Option<NamedNode>,
    type_: Option<NamedNode>,
    properties: Vec<(NamedNode, String)>,
}

struct RdfXmlReader<R: BufRead> {
    reader: NsReader<R>,
    state: Vec<State>,
    in_literal_depth: usize,
    known_rdf_id: HashSet<String>,
    results: Vec<Triple>,
}

impl<R: BufRead> RdfXmlReader<R> {
    fn new(source: R) -> Self {
        let mut reader = NsReader::from_reader(source);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            state: vec![State::Doc],
            in_literal_depth: 0,
            known_rdf_id: HashSet::new(),
            results: Vec::new(),
        }
    }

    fn run(mut self, producer: &Producer<Triple>) -> Result<(), ParseError> {
        let mut buffer = Vec::new();
        loop {
            if producer.is_cancelled() {
                return Ok(());
            }
            buffer.clear();
            let event = self.reader.read_event_into(&mut buffer)?;
            let is_end = matches!(event, Event::Eof);
            self.on_event(event)?;
            for triple in self.results.drain(..) {
                if !producer.send(triple) {
                    return Ok(());
                }
            }
            if is_end {
                return if self.state.len() > 1 {
                    Err(SyntaxError::msg("Unexpected end of the RDF/XML document").into())
                } else {
                    Ok(())
                };
            }
        }
    }

    fn on_event(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Start(event) => self.on_start(&event),
            Event::End(event) => self.on_end(&event),
            Event::Text(event) => self.on_text(&event),
            Event::CData(event) => self.on_text(&event.escape()?),
            Event::Decl(decl) => {
                if let Some(encoding) = decl.encoding() {
                    if !is_utf8(&encoding?) {
                        return Err(SyntaxError::msg(
                            "Only UTF-8 is supported by the RDF/XML parser",
                        )
                        .into());
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_start(&mut self, event: &BytesStart<'_>) -> Result<(), ParseError> {
        if let Some(State::LiteralPropertyElt { writer, .. }) = self.state.last_mut() {
            let mut clean_event = BytesStart::new(
                self.reader
                    .decoder()
                    .decode(event.name().as_ref())?
                    .into_owned(),
            );
            for attribute in event.attributes() {
                clean_event.push_attribute(attribute?);
            }
            if self.in_literal_depth == 0 {
                // The literal must carry the namespaces it was written with
                for (prefix, namespace) in self.reader.prefixes() {
                    match prefix {
                        PrefixDeclaration::Default => {
                            clean_event.push_attribute((&b"xmlns"[..], namespace.into_inner()));
                        }
                        PrefixDeclaration::Named(name) => {
                            let mut key = b"xmlns:".to_vec();
                            key.extend_from_slice(name);
                            clean_event.push_attribute((key.as_slice(), namespace.into_inner()));
                        }
                    }
                }
            }
            writer.write_event(Event::Start(clean_event))?;
            self.in_literal_depth += 1;
            return Ok(());
        }

        let tag_name = self.resolve_tag_name(event.name())?;
        let (attributes, parse_type) = self.read_attributes(event)?;

        let expected = match self.state.last() {
            Some(State::Doc) => Production::Root,
            Some(
                State::Rdf { .. } | State::PropertyElt { .. } | State::CollectionPropertyElt { .. },
            ) => Production::NodeElt,
            Some(State::NodeElt { subject, .. }) => Production::PropertyElt {
                subject: subject.clone(),
            },
            Some(State::LiteralPropertyElt { .. }) | None => {
                return Err(SyntaxError::msg("The XML document is not balanced").into());
            }
        };
        let new_state = match expected {
            Production::Root if tag_name == RDF_RDF => State::Rdf {
                base_iri: attributes.base_iri,
                language: attributes.language,
            },
            Production::Root | Production::NodeElt => {
                if RESERVED_RDF_ELEMENTS.contains(&tag_name.as_str()) {
                    return Err(SyntaxError::msg(format!(
                        "Invalid node element tag name: {tag_name}"
                    ))
                    .into());
                }
                self.build_node_elt(parse_iri(tag_name)?, attributes)?
            }
            Production::PropertyElt { subject } => {
                let iri = if tag_name == RDF_LI {
                    let Some(State::NodeElt { li_counter, .. }) = self.state.last_mut() else {
                        return Err(SyntaxError::msg("rdf:li is only allowed in a node element").into());
                    };
                    *li_counter += 1;
                    NamedNode::new_unchecked(format!("{}_{li_counter}", rdf::NAMESPACE))
                } else if RESERVED_RDF_ELEMENTS.contains(&tag_name.as_str())
                    || tag_name == RDF_DESCRIPTION
                {
                    return Err(SyntaxError::msg(format!(
                        "Invalid property element tag name: {tag_name}"
                    ))
                    .into());
                } else {
                    parse_iri(tag_name)?
                };
                self.build_property_elt(iri, subject, attributes, parse_type)?
            }
        };
        self.state.push(new_state);
        Ok(())
    }

    fn read_attributes(
        &mut self,
        event: &BytesStart<'_>,
    ) -> Result<(Attributes, ParseType), ParseError> {
        let mut attributes = Attributes::default();
        let mut parse_type = ParseType::Default;
        let mut id = None;
        let mut about = None;
        let mut resource = None;
        let mut datatype = None;
        let mut type_ = None;
        for attribute in event.attributes() {
            let attribute = attribute?;
            match attribute.key.as_ref() {
                b"xml:lang" => {
                    let tag = self.attribute_value(&attribute)?.to_ascii_lowercase();
                    attributes.language = Some(
                        LanguageTag::parse(tag.clone())
                            .map_err(|e| {
                                SyntaxError::msg(format!("Invalid language tag '{tag}': {e}"))
                            })?
                            .into_inner(),
                    );
                }
                b"xml:base" => {
                    let iri = self.attribute_value(&attribute)?;
                    attributes.base_iri = Some(Iri::parse(iri.clone()).map_err(|e| {
                        SyntaxError::msg(format!("Invalid xml:base IRI '{iri}': {e}"))
                    })?);
                }
                key if key.starts_with(b"xml") => (),
                _ => {
                    let name = self.resolve_attribute_name(attribute.key)?;
                    match name.as_str() {
                        RDF_ID => {
                            let value = self.attribute_value(&attribute)?;
                            if !is_nc_name(&value) {
                                return Err(SyntaxError::msg(format!(
                                    "{value} is not a valid rdf:ID value"
                                ))
                                .into());
                            }
                            id = Some(format!("#{value}"));
                        }
                        RDF_BAG_ID => (),
                        RDF_NODE_ID => {
                            let value = self.attribute_value(&attribute)?;
                            if !is_nc_name(&value) {
                                return Err(SyntaxError::msg(format!(
                                    "{value} is not a valid rdf:nodeID value"
                                ))
                                .into());
                            }
                            attributes.node_id = Some(BlankNode::new_unchecked(value));
                        }
                        RDF_ABOUT => about = Some(self.attribute_value(&attribute)?),
                        RDF_RESOURCE => resource = Some(self.attribute_value(&attribute)?),
                        RDF_DATATYPE => datatype = Some(self.attribute_value(&attribute)?),
                        RDF_PARSE_TYPE => {
                            parse_type = match attribute.value.as_ref() {
                                b"Collection" => ParseType::Collection,
                                b"Literal" => ParseType::Literal,
                                b"Resource" => ParseType::Resource,
                                _ => ParseType::Other,
                            }
                        }
                        rdf::TYPE => type_ = Some(self.attribute_value(&attribute)?),
                        name if RESERVED_RDF_ATTRIBUTES.contains(&name) => {
                            return Err(
                                SyntaxError::msg(format!("{name} is not a valid attribute")).into()
                            );
                        }
                        _ => {
                            let value = self.attribute_value(&attribute)?;
                            attributes.properties.push((parse_iri(name.clone())?, value));
                        }
                    }
                }
            }
        }

        // Relative IRIs are resolved against the base of the element itself
        let base_iri = attributes.base_iri.clone();
        let resolve = |iri: Option<String>| {
            iri.map(|iri| self.resolve_iri(base_iri.as_ref(), iri))
                .transpose()
        };
        attributes.id = resolve(id)?;
        attributes.about = resolve(about)?;
        attributes.resource = resolve(resource)?;
        attributes.datatype = resolve(datatype)?;
        attributes.type_ = resolve(type_)?;
        if let Some(id) = &attributes.id {
            if !self.known_rdf_id.insert(id.as_str().into()) {
                return Err(
                    SyntaxError::msg(format!("{id} has already been used as rdf:ID value")).into(),
                );
            }
        }
        Ok((attributes, parse_type))
    }

    fn on_end(&mut self, event: &BytesEnd<'_>) -> Result<(), ParseError> {
        if self.in_literal_depth > 0 {
            if let Some(State::LiteralPropertyElt { writer, .. }) = self.state.last_mut() {
                writer.write_event(Event::End(BytesEnd::new(
                    self.reader.decoder().decode(event.name().as_ref())?,
                )))?;
                self.in_literal_depth -= 1;
                return Ok(());
            }
        }
        if let Some(state) = self.state.pop() {
            self.end_state(state)?;
        }
        Ok(())
    }

    fn on_text(&mut self, event: &BytesText<'_>) -> Result<(), ParseError> {
        let text = event.unescape()?.into_owned();
        match self.state.last_mut() {
            Some(State::PropertyElt { object, .. }) => {
                if !is_object_defined(object) {
                    *object = Some(NodeOrText::Text(text));
                    return Ok(());
                }
            }
            Some(State::LiteralPropertyElt { writer, .. }) => {
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                return Ok(());
            }
            _ => (),
        }
        if text.bytes().all(is_whitespace) {
            Ok(())
        } else {
            Err(SyntaxError::msg(format!("Unexpected text event: '{text}'")).into())
        }
    }

    fn resolve_tag_name(&self, qname: QName<'_>) -> Result<String, ParseError> {
        let (namespace, local_name) = self.reader.resolve_element(qname);
        self.resolve_ns_name(namespace, local_name)
    }

    fn resolve_attribute_name(&self, qname: QName<'_>) -> Result<String, ParseError> {
        let (namespace, local_name) = self.reader.resolve_attribute(qname);
        self.resolve_ns_name(namespace, local_name)
    }

    fn resolve_ns_name(
        &self,
        namespace: ResolveResult<'_>,
        local_name: LocalName<'_>,
    ) -> Result<String, ParseError> {
        match namespace {
            ResolveResult::Bound(namespace) => {
                let mut value = namespace.as_ref().to_vec();
                value.extend_from_slice(local_name.as_ref());
                Ok(self.reader.decoder().decode(&value)?.into_owned())
            }
            ResolveResult::Unbound => {
                Err(SyntaxError::msg("XML namespaces are required in RDF/XML").into())
            }
            ResolveResult::Unknown(prefix) => Err(SyntaxError::msg(format!(
                "Unknown prefix {}:",
                self.reader.decoder().decode(&prefix)?
            ))
            .into()),
        }
    }

    fn attribute_value(&self, attribute: &Attribute<'_>) -> Result<String, ParseError> {
        Ok(attribute
            .decode_and_unescape_value(self.reader.decoder())?
            .into_owned())
    }

    fn build_node_elt(
        &mut self,
        iri: NamedNode,
        attributes: Attributes,
    ) -> Result<State, ParseError> {
        let subject = match (attributes.id, attributes.node_id, attributes.about) {
            (Some(id), None, None) => Subject::from(id),
            (None, Some(node_id), None) => node_id.into(),
            (None, None, Some(about)) => about.into(),
            (None, None, None) => BlankNode::default().into(),
            _ => {
                return Err(SyntaxError::msg(
                    "Only one of rdf:ID, rdf:nodeID and rdf:about can be set on a node element",
                )
                .into());
            }
        };
        let language = attributes.language;
        self.emit_property_attrs(&subject, attributes.properties, language.as_deref());
        if let Some(type_) = attributes.type_ {
            self.results
                .push(Triple::new(subject.clone(), rdf_type(), type_));
        }
        if iri.as_str() != RDF_DESCRIPTION {
            self.results.push(Triple::new(subject.clone(), rdf_type(), iri));
        }
        Ok(State::NodeElt {
            base_iri: attributes.base_iri,
            language,
            subject,
            li_counter: 0,
        })
    }

    fn build_property_elt(
        &mut self,
        iri: NamedNode,
        subject: Subject,
        attributes: Attributes,
        parse_type: ParseType,
    ) -> Result<State, ParseError> {
        let Attributes {
            language,
            base_iri,
            id: id_attr,
            ..
        } = attributes;
        Ok(match parse_type {
            ParseType::Default => {
                let object = if attributes.resource.is_some()
                    || attributes.node_id.is_some()
                    || !attributes.properties.is_empty()
                {
                    let object = match (attributes.resource, attributes.node_id) {
                        (Some(resource), None) => Subject::from(resource),
                        (None, Some(node_id)) => node_id.into(),
                        (None, None) => BlankNode::default().into(),
                        (Some(_), Some(_)) => {
                            return Err(SyntaxError::msg(
                                "Not both rdf:resource and rdf:nodeID could be set at the same time",
                            )
                            .into());
                        }
                    };
                    self.emit_property_attrs(&object, attributes.properties, language.as_deref());
                    if let Some(type_) = attributes.type_ {
                        self.results
                            .push(Triple::new(object.clone(), rdf_type(), type_));
                    }
                    Some(NodeOrText::Node(object))
                } else {
                    None
                };
                State::PropertyElt {
                    iri,
                    base_iri,
                    language,
                    subject,
                    object,
                    id_attr,
                    datatype_attr: attributes.datatype,
                }
            }
            ParseType::Resource => {
                let object = BlankNode::default();
                self.emit(Triple::new(subject, iri, object.clone()), id_attr);
                State::NodeElt {
                    base_iri,
                    language,
                    subject: object.into(),
                    li_counter: 0,
                }
            }
            ParseType::Collection => State::CollectionPropertyElt {
                iri,
                base_iri,
                language,
                subject,
                objects: Vec::new(),
                id_attr,
            },
            ParseType::Literal | ParseType::Other => State::LiteralPropertyElt {
                iri,
                base_iri,
                language,
                subject,
                writer: Writer::new(Vec::new()),
                id_attr,
                emit: parse_type == ParseType::Literal,
            },
        })
    }

    fn end_state(&mut self, state: State) -> Result<(), SyntaxError> {
        match state {
            State::PropertyElt {
                iri,
                language,
                subject,
                id_attr,
                datatype_attr,
                object,
                ..
            } => {
                let object = match object {
                    Some(NodeOrText::Node(node)) => Term::from(node),
                    Some(NodeOrText::Text(text)) => {
                        self.new_literal(text, language, datatype_attr).into()
                    }
                    None => self
                        .new_literal(String::new(), language, datatype_attr)
                        .into(),
                };
                self.emit(Triple::new(subject, iri, object), id_attr);
            }
            State::CollectionPropertyElt {
                iri,
                subject,
                id_attr,
                objects,
                ..
            } => {
                let mut current_node = Subject::from(NamedNode::new_unchecked(rdf::NIL));
                for object in objects.into_iter().rev() {
                    let node = Subject::from(BlankNode::default());
                    self.results.push(Triple::new(
                        node.clone(),
                        NamedNode::new_unchecked(rdf::FIRST),
                        object,
                    ));
                    self.results.push(Triple::new(
                        node.clone(),
                        NamedNode::new_unchecked(rdf::REST),
                        current_node,
                    ));
                    current_node = node;
                }
                self.emit(Triple::new(subject, iri, current_node), id_attr);
            }
            State::LiteralPropertyElt {
                iri,
                subject,
                id_attr,
                writer,
                emit,
                ..
            } => {
                if emit {
                    let value = String::from_utf8(writer.into_inner()).map_err(|_| {
                        SyntaxError::msg("The XML literal is not in valid UTF-8")
                    })?;
                    let literal =
                        Literal::new_typed_literal(value, NamedNode::new_unchecked(rdf::XML_LITERAL));
                    self.emit(Triple::new(subject, iri, literal), id_attr);
                }
            }
            State::NodeElt { subject, .. } => match self.state.last_mut() {
                Some(State::PropertyElt { object, .. }) => {
                    if is_object_defined(object) {
                        return Err(SyntaxError::msg(
                            "Unexpected node, a text value is already present",
                        ));
                    }
                    *object = Some(NodeOrText::Node(subject));
                }
                Some(State::CollectionPropertyElt { objects, .. }) => objects.push(subject),
                _ => (),
            },
            State::Doc | State::Rdf { .. } => (),
        }
        Ok(())
    }

    /// Pushes a triple and its reification if the property element had a `rdf:ID`.
    fn emit(&mut self, triple: Triple, statement_id: Option<NamedNode>) {
        if let Some(statement_id) = statement_id {
            let statement = Subject::from(statement_id);
            self.results.push(Triple::new(
                statement.clone(),
                rdf_type(),
                NamedNode::new_unchecked(rdf::STATEMENT),
            ));
            self.results.push(Triple::new(
                statement.clone(),
                NamedNode::new_unchecked(rdf::SUBJECT),
                triple.subject.clone(),
            ));
            self.results.push(Triple::new(
                statement.clone(),
                NamedNode::new_unchecked(rdf::PREDICATE),
                triple.predicate.clone(),
            ));
            self.results.push(Triple::new(
                statement,
                NamedNode::new_unchecked(rdf::OBJECT),
                triple.object.clone(),
            ));
        }
        self.results.push(triple);
    }

    fn new_literal(
        &self,
        value: String,
        language: Option<String>,
        datatype: Option<NamedNode>,
    ) -> Literal {
        if let Some(datatype) = datatype {
            Literal::new_typed_literal(value, datatype)
        } else if let Some(language) =
            language.or_else(|| self.current_language().map(ToOwned::to_owned))
        {
            Literal::new_language_tagged_literal_unchecked(value, language)
        } else {
            Literal::new_simple_literal(value)
        }
    }

    fn emit_property_attrs(
        &mut self,
        subject: &Subject,
        properties: Vec<(NamedNode, String)>,
        language: Option<&str>,
    ) {
        for (predicate, value) in properties {
            let object = match language.or_else(|| self.current_language()) {
                Some(language) => Literal::new_language_tagged_literal_unchecked(value, language),
                None => Literal::new_simple_literal(value),
            };
            self.results
                .push(Triple::new(subject.clone(), predicate, object));
        }
    }

    fn resolve_iri(
        &self,
        base_iri: Option<&Iri<String>>,
        relative_iri: String,
    ) -> Result<NamedNode, SyntaxError> {
        match base_iri.or_else(|| self.current_base_iri()) {
            Some(base_iri) => Ok(NamedNode::new_unchecked(
                base_iri
                    .resolve(&relative_iri)
                    .map_err(|e| {
                        SyntaxError::msg(format!("Invalid IRI '{relative_iri}': {e}"))
                    })?
                    .into_inner(),
            )),
            None => parse_iri(relative_iri),
        }
    }

    fn current_language(&self) -> Option<&str> {
        self.state.iter().rev().find_map(|state| match state {
            State::Doc => None,
            State::Rdf { language, .. }
            | State::NodeElt { language, .. }
            | State::PropertyElt { language, .. }
            | State::CollectionPropertyElt { language, .. }
            | State::LiteralPropertyElt { language, .. } => language.as_deref(),
        })
    }

    fn current_base_iri(&self) -> Option<&Iri<String>> {
        self.state.iter().rev().find_map(|state| match state {
            State::Doc => None,
            State::Rdf { base_iri, .. }
            | State::NodeElt { base_iri, .. }
            | State::PropertyElt { base_iri, .. }
            | State::CollectionPropertyElt { base_iri, .. }
            | State::LiteralPropertyElt { base_iri, .. } => base_iri.as_ref(),
        })
    }
}

fn parse_iri(iri: String) -> Result<NamedNode, SyntaxError> {
    Iri::parse(iri.as_str())
        .map_err(|e| SyntaxError::msg(format!("Invalid IRI '{iri}': {e}")))?;
    Ok(NamedNode::new_unchecked(iri))
}

fn rdf_type() -> NamedNode {
    NamedNode::new_unchecked(rdf::TYPE)
}

fn is_object_defined(object: &Option<NodeOrText>) -> bool {
    match object {
        Some(NodeOrText::Node(_)) => true,
        Some(NodeOrText::Text(t)) => !t.bytes().all(is_whitespace),
        None => false,
    }
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_utf8(encoding: &[u8]) -> bool {
    matches!(
        encoding.to_ascii_lowercase().as_slice(),
        b"unicode-1-1-utf-8"
            | b"unicode11utf8"
            | b"unicode20utf8"
            | b"utf-8"
            | b"utf8"
            | b"x-unicode20utf8"
    )
}

fn is_nc_name(name: &str) -> bool {
    // Name - (Char* ':' Char*)
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

fn is_name_start_char(c: char) -> bool {
    // [A-Z] | "_" | [a-z] | [#xC0-#xD6] | [#xD8-#xF6] | [#xF8-#x2FF] | [#x370-#x37D] | [#x37F-#x1FFF] | [#x200C-#x200D] | [#x2070-#x218F] | [#x2C00-#x2FEF] | [#x3001-#xD7FF] | [#xF900-#xFDCF] | [#xFDF0-#xFFFD] | [#x10000-#xEFFFF]
    matches!(c,
        'A'..='Z'
        | '_'
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

fn is_name_char(c: char) -> bool {
    // NameStartChar | "-" | "." | [0-9] | #xB7 | [#x0300-#x036F] | [#x203F-#x2040]
    is_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{0300}'..='\u{036F}' | '\u{203F}'..='\u{2040}')
}

/// Writes a graph as a flat list of `rdf:Description` elements.
///
/// Every namespace of the table is declared on the root element.
/// A predicate outside of the table gets a default namespace declaration on its own element.
pub(crate) struct RdfXmlWriter {
    namespaces: Namespaces,
    current_subject: Option<Subject>,
}

impl RdfXmlWriter {
    pub(crate) fn new(namespaces: Namespaces) -> Self {
        let mut namespaces = namespaces
            .iter()
            .filter(|(prefix, _)| is_nc_name(prefix) && !prefix.starts_with("xml"))
            .collect::<Namespaces>();
        if namespaces.get("rdf") != Some(rdf::NAMESPACE) {
            namespaces.insert("rdf", rdf::NAMESPACE);
        }
        Self {
            namespaces,
            current_subject: None,
        }
    }

    /// The element name of a predicate IRI and, if no prefix fits, the namespace to declare.
    fn predicate_tag<'a>(&self, iri: &'a str) -> Result<(String, Option<&'a str>), SerializeError> {
        let prefixed = self
            .namespaces
            .iter()
            .filter_map(|(prefix, namespace)| {
                let local = iri.strip_prefix(namespace)?;
                is_nc_name(local).then_some((prefix, namespace.len(), local))
            })
            .max_by_key(|(_, len, _)| *len);
        if let Some((prefix, _, local)) = prefixed {
            return Ok((format!("{prefix}:{local}"), None));
        }
        // The longest suffix that is a valid element name
        let split = iri
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_name_char(*c))
            .filter(|(_, c)| is_name_start_char(*c))
            .last()
            .map(|(i, _)| i)
            .ok_or_else(|| {
                SerializeError::Unserializable(format!(
                    "The predicate <{iri}> has no local name usable as an XML element name"
                ))
            })?;
        Ok((iri[split..].to_owned(), Some(&iri[..split])))
    }
}

impl TriplesWriter for RdfXmlWriter {
    fn write_head(&mut self, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        output.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<rdf:RDF");
        for (prefix, namespace) in self.namespaces.iter() {
            write!(output, "\n    xmlns:{prefix}=\"{}\"", escape(namespace))?;
        }
        output.extend_from_slice(b">\n");
        Ok(())
    }

    fn write_triple(&mut self, triple: &Triple, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        if self.current_subject.as_ref() != Some(&triple.subject) {
            if self.current_subject.is_some() {
                output.extend_from_slice(b"  </rdf:Description>\n");
            }
            match &triple.subject {
                Subject::NamedNode(node) => writeln!(
                    output,
                    "  <rdf:Description rdf:about=\"{}\">",
                    escape(&*encode_iri(node.as_str()))
                )?,
                Subject::BlankNode(node) => writeln!(
                    output,
                    "  <rdf:Description rdf:nodeID=\"{}\">",
                    escape(node.as_str())
                )?,
            }
            self.current_subject = Some(triple.subject.clone());
        }

        let predicate = encode_iri(triple.predicate.as_str());
        let (tag, namespace) = self.predicate_tag(&predicate)?;
        write!(output, "    <{tag}")?;
        if let Some(namespace) = namespace {
            write!(output, " xmlns=\"{}\"", escape(namespace))?;
        }
        match &triple.object {
            Term::NamedNode(node) => {
                writeln!(
                    output,
                    " rdf:resource=\"{}\"/>",
                    escape(&*encode_iri(node.as_str()))
                )?;
            }
            Term::BlankNode(node) => {
                writeln!(output, " rdf:nodeID=\"{}\"/>", escape(node.as_str()))?;
            }
            Term::Literal(literal) => {
                if let Some(language) = literal.language() {
                    write!(output, " xml:lang=\"{}\"", escape(language))?;
                }
                if let Some(datatype) = literal.datatype() {
                    write!(
                        output,
                        " rdf:datatype=\"{}\"",
                        escape(&*encode_iri(datatype.as_str()))
                    )?;
                }
                writeln!(output, ">{}</{tag}>", escape(literal.value()))?;
            }
        }
        Ok(())
    }

    fn write_tail(&mut self, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        if self.current_subject.take().is_some() {
            output.extend_from_slice(b"  </rdf:Description>\n");
        }
        output.extend_from_slice(b"</rdf:RDF>\n");
        Ok(())
    }
}
