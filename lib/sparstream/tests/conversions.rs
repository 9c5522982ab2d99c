#![cfg(test)]

use sparstream::{
    Format, Mode, QueryResults, ResultKind, SerializeError, StreamError, StreamingParser,
    StreamingSerializer, serializer_stats,
};
use sparterm::{BlankNode, Graph, Literal, NamedNode, Triple};
use std::error::Error;
use std::io::Read;

fn convert(from: Format, data: &'static str, to: Format) -> Result<String, Box<dyn Error>> {
    let mut parser = StreamingParser::new(from, data.as_bytes());
    parser.classify()?;
    let output = StreamingSerializer::new(to, parser)?.write_to(Vec::new())?;
    Ok(String::from_utf8(output)?)
}

#[test]
fn json_solutions_to_csv() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        convert(
            Format::SparqlJson,
            r#"{"head":{"vars":["x"]},"results":{"bindings":[{"x":{"type":"uri","value":"http://example.org/a"}}]}}"#,
            Format::Csv
        )?,
        "x\nhttp://example.org/a\n"
    );
    Ok(())
}

#[test]
fn xml_boolean_to_csv() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        convert(
            Format::SparqlXml,
            r#"<?xml version="1.0"?><sparql xmlns="http://www.w3.org/2005/sparql-results#"><head/><boolean>true</boolean></sparql>"#,
            Format::Csv
        )?,
        "true\n"
    );
    Ok(())
}

#[test]
fn xml_solutions_to_json() -> Result<(), Box<dyn Error>> {
    let json = convert(
        Format::SparqlXml,
        r#"<sparql xmlns="http://www.w3.org/2005/sparql-results#">
  <head><variable name="s"/><variable name="o"/></head>
  <results>
    <result><binding name="s"><bnode>b0</bnode></binding><binding name="o"><literal xml:lang="en">hi</literal></binding></result>
    <result><binding name="o"><literal datatype="http://www.w3.org/2001/XMLSchema#integer">2</literal></binding></result>
  </results>
</sparql>"#,
        Format::SparqlJson,
    )?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(value["head"]["vars"], serde_json::json!(["s", "o"]));
    let bindings = &value["results"]["bindings"];
    assert_eq!(bindings[0]["s"]["type"], "bnode");
    assert_eq!(bindings[0]["o"]["xml:lang"], "en");
    assert!(bindings[1].get("s").is_none());
    assert_eq!(bindings[1]["o"]["value"], "2");
    Ok(())
}

#[test]
fn ntriples_iris_are_percent_encoded() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        convert(
            Format::NTriples,
            "<http://example.org/a b> <http://example.org/p> \"v\" .\n",
            Format::NTriples
        )?,
        "<http://example.org/a%20b> <http://example.org/p> \"v\" .\n"
    );
    Ok(())
}

fn sample_graph() -> Graph {
    let s = NamedNode::new_unchecked("http://example.org/s");
    let p = NamedNode::new_unchecked("http://purl.org/dc/terms/title");
    let q = NamedNode::new_unchecked("http://example.org/vocab/rank");
    [
        Triple::new(s.clone(), p.clone(), Literal::new_simple_literal("Tab\tand \"quotes\"")),
        Triple::new(
            s.clone(),
            p.clone(),
            Literal::new_language_tagged_literal_unchecked("Titre", "fr"),
        ),
        Triple::new(
            s.clone(),
            q.clone(),
            Literal::new_typed_literal(
                "3",
                NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#integer"),
            ),
        ),
        Triple::new(s, q.clone(), BlankNode::new_unchecked("n0")),
        Triple::new(
            BlankNode::new_unchecked("n0"),
            p,
            NamedNode::new_unchecked("http://example.org/o"),
        ),
        Triple::new(
            BlankNode::new_unchecked("n0"),
            q,
            Literal::new_simple_literal(""),
        ),
    ]
    .into_iter()
    .collect()
}

#[test]
fn graph_round_trips() -> Result<(), Box<dyn Error>> {
    for format in [Format::NTriples, Format::RdfXml] {
        let graph = sample_graph();
        let bytes = StreamingSerializer::new(format, graph.clone())?.write_to(Vec::new())?;
        let mut parser = StreamingParser::new(format, std::io::Cursor::new(bytes));
        assert_eq!(parser.classify()?, ResultKind::Graph);
        assert_eq!(parser.triples()?.collect_graph()?, graph, "{format}");
    }
    Ok(())
}

#[test]
fn ntriples_to_turtle() -> Result<(), Box<dyn Error>> {
    let turtle = convert(
        Format::NTriples,
        "<http://example.org/s> <http://example.org/p> \"a\" .\n<http://example.org/s> <http://example.org/p> <http://example.org/o> .\n",
        Format::Turtle,
    )?;
    let mut parser = StreamingParser::new(Format::Turtle, std::io::Cursor::new(turtle.clone()));
    assert_eq!(parser.classify()?, ResultKind::Graph);
    let graph = parser.triples()?.collect_graph()?;
    assert_eq!(graph.len(), 2, "{turtle}");
    assert!(graph.contains(&Triple::new(
        NamedNode::new_unchecked("http://example.org/s"),
        NamedNode::new_unchecked("http://example.org/p"),
        Literal::new_simple_literal("a"),
    )));
    Ok(())
}

#[test]
fn streams_are_consumed_once() -> Result<(), Box<dyn Error>> {
    let mut parser = StreamingParser::new(
        Format::NTriples,
        &b"<http://e.org/s> <http://e.org/p> <http://e.org/o> .\n"[..],
    );
    assert_eq!(parser.triples()?.count(), 1);
    assert!(matches!(parser.triples(), Err(StreamError::StreamReplay)));
    Ok(())
}

#[test]
fn raw_reads_forbid_parsing() -> Result<(), Box<dyn Error>> {
    let mut parser = StreamingParser::new(Format::Csv, &b"x\n1\n"[..]);
    let mut raw = String::new();
    parser.read_to_string(&mut raw)?;
    assert_eq!(raw, "x\n1\n");
    let Err(StreamError::ModeConflict { current, requested }) = parser.get() else {
        panic!("mode conflict expected")
    };
    assert_eq!((current, requested), (Mode::RawStream, Mode::Parsing));
    Ok(())
}

#[test]
fn malformed_bodies_pass_through() -> Result<(), Box<dyn Error>> {
    let body = "{\"head\": {\"vars\": [\"x\"]}, \"results\": {oops";
    let before = serializer_stats();
    let parser = StreamingParser::new(Format::SparqlJson, body.as_bytes());
    let serializer = StreamingSerializer::new(Format::SparqlJson, parser)?;
    assert!(serializer.is_pass_through());
    assert!(serializer_stats().pass_through > before.pass_through);
    assert_eq!(serializer.write_to(Vec::new())?, body.as_bytes());
    Ok(())
}

#[test]
fn parsing_disables_pass_through() -> Result<(), Box<dyn Error>> {
    let mut parser = StreamingParser::new(Format::Csv, &b"a\n1\n"[..]);
    parser.classify()?;
    let serializer = StreamingSerializer::new(Format::Csv, parser)?;
    assert!(!serializer.is_pass_through());
    assert_eq!(serializer.write_to(Vec::new())?, b"a\n1\n");
    Ok(())
}

#[test]
fn kinds_are_checked_before_writing() {
    let result = StreamingSerializer::new(Format::RdfXml, QueryResults::Boolean(true));
    assert!(matches!(
        result,
        Err(SerializeError::UnsupportedKind {
            format: Format::RdfXml,
            kind: ResultKind::Boolean
        })
    ));
    let parser = StreamingParser::new(
        Format::NTriples,
        &b"<http://e.org/s> <http://e.org/p> <http://e.org/o> .\n"[..],
    );
    assert!(matches!(
        StreamingSerializer::new(Format::Csv, parser),
        Err(SerializeError::UnsupportedKind {
            kind: ResultKind::Graph,
            ..
        })
    ));
}
