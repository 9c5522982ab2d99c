#![cfg(test)]

use sparclient::{
    AtomicQueryMetrics, Endpoint, EndpointError, QueryOptions, Transport, TransportError,
    TransportRequest, TransportResponse,
};
use sparstream::{Format, QueryResults, StreamError, StreamingSerializer};
use sparterm::{Literal, NamedNode, Subject, Term, Triple};
use std::error::Error;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SRJ: &str = r#"{"head":{"vars":["x"]},"results":{"bindings":[{"x":{"type":"uri","value":"http://example.org/a"}}]}}"#;
const SRX_TRUE: &str = r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#"><head/><boolean>true</boolean></sparql>"#;

#[derive(Clone)]
struct FakeTransport {
    requests: Arc<Mutex<Vec<TransportRequest>>>,
    status: u16,
    content_type: Option<&'static str>,
    body: &'static str,
    failure: Option<io::ErrorKind>,
}

impl FakeTransport {
    fn new(status: u16, content_type: Option<&'static str>, body: &'static str) -> Self {
        Self {
            requests: Arc::default(),
            status,
            content_type,
            body,
            failure: None,
        }
    }

    fn failing(kind: io::ErrorKind) -> Self {
        Self {
            failure: Some(kind),
            ..Self::new(200, None, "")
        }
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        if let Some(kind) = self.failure {
            return Err(io::Error::new(kind, "connection failed").into());
        }
        Ok(TransportResponse {
            status: self.status,
            content_type: self.content_type.map(Into::into),
            body: Box::new(self.body.as_bytes()),
        })
    }
}

fn form_value(request: &TransportRequest, name: &str) -> Option<String> {
    url::form_urlencoded::parse(request.form.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn endpoint(transport: &FakeTransport) -> Result<Endpoint, Box<dyn Error>> {
    Ok(Endpoint::new("http://example.com/sparql")?.with_transport(transport.clone()))
}

#[test]
fn query_streams_results() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(200, Some("application/sparql-results+json"), SRJ);
    let endpoint = endpoint(&transport)?.with_contact("admin@example.com");
    let mut response = endpoint.query(
        "
        SELECT ?x WHERE {
            ?x a foaf:Person
        }",
        &QueryOptions::default().with_timeout(Duration::from_secs(30)),
    )?;
    assert_eq!(
        response.query(),
        "PREFIX foaf: <http://xmlns.com/foaf/0.1/>\n\nSELECT ?x WHERE {\n    ?x a foaf:Person\n}"
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.url, "http://example.com/sparql");
    assert_eq!(form_value(request, "query").as_deref(), Some(response.query()));
    assert_eq!(
        request.accept.as_deref(),
        Some(
            "text/plain, application/sparql-results+xml;q=0.9, application/rdf+xml;q=0.8, application/sparql-results+json;q=0.7"
        )
    );
    assert!(request.user_agent.starts_with("sparclient/"));
    assert!(request.user_agent.ends_with("(admin@example.com)"));
    assert_eq!(request.timeout, Some(Duration::from_secs(30)));

    let parser = response.parser_mut().ok_or("a stream is expected")?;
    let bindings = parser.bindings()?.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(bindings.len(), 1);
    assert_eq!(
        bindings[0].get("x"),
        Some(&Term::from(NamedNode::new("http://example.org/a")?))
    );
    Ok(())
}

#[test]
fn error_statuses_keep_the_body() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(400, Some("text/plain"), "Parse error: unexpected '}'");
    let Err(EndpointError::Query(error)) =
        endpoint(&transport)?.query("SELECT * WHERE {", &QueryOptions::default())
    else {
        panic!("query error expected")
    };
    assert_eq!(error.status(), 400);
    assert_eq!(error.message(), "Parse error: unexpected '}'");
    Ok(())
}

#[test]
fn transport_failures_are_reported() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::failing(io::ErrorKind::TimedOut);
    let Err(EndpointError::Transport(error)) =
        endpoint(&transport)?.query("ASK {}", &QueryOptions::default())
    else {
        panic!("transport error expected")
    };
    assert!(error.is_timeout());
    Ok(())
}

#[test]
fn unknown_media_types_are_refused() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(200, Some("text/html; charset=utf-8"), "<html/>");
    let result = endpoint(&transport)?.query("ASK {}", &QueryOptions::default());
    assert!(matches!(result, Err(EndpointError::Unsupported(message)) if message.contains("text/html")));
    Ok(())
}

#[test]
fn missing_content_type_means_rdf_xml() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(
        200,
        None,
        r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:ex="http://example.com/">
  <rdf:Description rdf:about="http://example.com/s"><ex:p>o</ex:p></rdf:Description>
</rdf:RDF>"#,
    );
    let response = endpoint(&transport)?.describe(&NamedNode::new("http://example.com/s")?)?;
    assert_eq!(response.query(), "\nDESCRIBE <http://example.com/s>");
    let QueryResults::Graph(graph) = response.into_results()? else {
        panic!("graph expected")
    };
    assert!(graph.contains(&Triple::new(
        NamedNode::new("http://example.com/s")?,
        NamedNode::new("http://example.com/p")?,
        Literal::new_simple_literal("o"),
    )));
    Ok(())
}

#[test]
fn unsupported_charsets_fail_on_parsing() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(
        200,
        Some("application/sparql-results+xml; charset=ISO-8859-1"),
        SRX_TRUE,
    );
    let mut response = endpoint(&transport)?.query("ASK {}", &QueryOptions::default())?;
    let parser = response.parser_mut().ok_or("a stream is expected")?;
    assert_eq!(parser.charset(), "ISO-8859-1");
    assert!(matches!(parser.classify(), Err(StreamError::Parse(_))));
    Ok(())
}

#[test]
fn eager_queries_are_materialized() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(200, Some("application/sparql-results+xml"), SRX_TRUE);
    let response = endpoint(&transport)?.query(
        "ASK { ?s ?p ?o }",
        &QueryOptions::default()
            .with_preferred_media_types(["application/sparql-results+json"])
            .eager(),
    )?;
    assert_eq!(
        transport.requests()[0].accept.as_deref(),
        Some("text/plain, application/sparql-results+xml;q=0.9")
    );
    assert!(response.into_parser().is_none());
    Ok(())
}

#[test]
fn ask_subject_returns_the_boolean() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(200, Some("application/sparql-results+xml"), SRX_TRUE);
    let subject = Subject::from(NamedNode::new("http://example.com/s")?);
    assert!(endpoint(&transport)?.ask_subject(&subject)?);
    assert_eq!(
        form_value(&transport.requests()[0], "query").as_deref(),
        Some("ASK WHERE { <http://example.com/s> ?p ?o }")
    );
    Ok(())
}

#[test]
fn same_format_responses_are_forwarded_verbatim() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(200, Some("application/sparql-results+json"), SRJ);
    let response = endpoint(&transport)?.query("SELECT ?x {}", &QueryOptions::default())?;
    let parser = response.into_parser().ok_or("a stream is expected")?;
    let serializer = StreamingSerializer::new(Format::SparqlJson, parser)?;
    assert!(serializer.is_pass_through());
    assert_eq!(serializer.write_to(Vec::new())?, SRJ.as_bytes());
    Ok(())
}

#[test]
fn metrics_record_outcomes() -> Result<(), Box<dyn Error>> {
    let metrics = Arc::new(AtomicQueryMetrics::new());
    let ok = FakeTransport::new(200, Some("application/sparql-results+json"), SRJ);
    endpoint(&ok)?
        .with_metrics(Arc::clone(&metrics) as _)
        .query("SELECT ?x {}", &QueryOptions::default())?;
    let failing = FakeTransport::new(500, Some("text/plain"), "boom");
    let result = endpoint(&failing)?
        .with_metrics(Arc::clone(&metrics) as _)
        .query("SELECT ?x {}", &QueryOptions::default().without_failure_logging());
    assert!(result.is_err());
    assert_eq!(metrics.queries(), 2);
    assert_eq!(metrics.failures(), 1);
    Ok(())
}

#[test]
fn updates_are_sent_to_the_update_url() -> Result<(), Box<dyn Error>> {
    let transport = FakeTransport::new(204, None, "");
    let endpoint = endpoint(&transport)?.with_update_url("http://example.com/update")?;
    let triple = Triple::new(
        NamedNode::new("http://example.com/s")?,
        NamedNode::new("http://www.w3.org/2000/01/rdf-schema#label")?,
        Literal::new_simple_literal("s"),
    );
    endpoint.insert_data([&triple], Some(&NamedNode::new("http://example.com/g")?))?;
    endpoint.delete_data([&triple], None)?;
    endpoint.clear(&NamedNode::new("http://example.com/g")?)?;

    let requests = transport.requests();
    assert!(requests.iter().all(|r| r.url == "http://example.com/update"));
    let updates = requests
        .iter()
        .map(|r| form_value(r, "update"))
        .collect::<Option<Vec<_>>>()
        .ok_or("update parameter expected")?;
    assert_eq!(
        updates,
        [
            "\nINSERT DATA { GRAPH <http://example.com/g> { <http://example.com/s> <http://www.w3.org/2000/01/rdf-schema#label> \"s\" } }",
            "\nDELETE DATA { <http://example.com/s> <http://www.w3.org/2000/01/rdf-schema#label> \"s\" }",
            "\nCLEAR GRAPH <http://example.com/g>",
        ]
    );
    Ok(())
}
