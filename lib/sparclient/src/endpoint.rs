use crate::error::{EndpointError, QueryError, TransportError};
use crate::metrics::{NoopMetrics, QueryMetrics};
use crate::query::{QueryOptions, normalize_query};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
use sparstream::{QueryResults, ResultKind, StreamError, StreamingParser, lookup_media_type};
use sparterm::{NamedNode, Namespaces, Subject, Triple};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{fmt, io};
use url::Url;
use url::form_urlencoded::Serializer;

const USER_AGENT: &str = concat!("sparclient/", env!("CARGO_PKG_VERSION"));

/// The media type assumed when the endpoint does not send a `Content-Type` header.
const DEFAULT_RESPONSE_MEDIA_TYPE: &str = "application/rdf+xml";

/// A remote SPARQL endpoint.
///
/// Queries are sent as form POSTs. Their results are returned as a
/// [`StreamingParser`] over the response body so that they can be processed,
/// or forwarded in the same format, as they arrive.
///
/// ```no_run
/// use sparclient::{Endpoint, QueryOptions};
///
/// let endpoint = Endpoint::new("http://localhost:7878/query")?
///     .with_contact("admin@example.com");
/// let mut response = endpoint.query("SELECT ?s WHERE { ?s a foaf:Person }", &QueryOptions::default())?;
/// if let Some(parser) = response.parser_mut() {
///     for binding in parser.bindings()? {
///         println!("{:?}", binding?.get("s"));
///     }
/// }
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct Endpoint {
    query_url: Url,
    update_url: Option<Url>,
    namespaces: Namespaces,
    transport: Arc<dyn Transport>,
    metrics: Arc<dyn QueryMetrics>,
    user_agent: String,
}

impl Endpoint {
    pub fn new(query_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            query_url: Url::parse(query_url)?,
            update_url: None,
            namespaces: Namespaces::common(),
            transport: Arc::new(HttpTransport::default()),
            metrics: Arc::new(NoopMetrics),
            user_agent: USER_AGENT.into(),
        })
    }

    /// Sets the URL updates are sent to. Defaults to the query URL.
    pub fn with_update_url(mut self, update_url: &str) -> Result<Self, url::ParseError> {
        self.update_url = Some(Url::parse(update_url)?);
        Ok(self)
    }

    /// Sets the namespaces whose `PREFIX` declarations may be prepended to queries.
    ///
    /// Defaults to [`Namespaces::common`].
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn QueryMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Adds a contact address to the `User-Agent` header, for the endpoint operators.
    #[must_use]
    pub fn with_contact(mut self, contact: &str) -> Self {
        self.user_agent = format!("{USER_AGENT} ({contact})");
        self
    }

    pub fn query_url(&self) -> &str {
        self.query_url.as_str()
    }

    pub fn update_url(&self) -> &str {
        self.update_url.as_ref().unwrap_or(&self.query_url).as_str()
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Normalizes the query the way [`query`](Self::query) does before sending it.
    pub fn normalize_query(&self, query: &str, common_prefixes: bool) -> String {
        normalize_query(query, &self.namespaces, common_prefixes)
    }

    /// Evaluates a query.
    ///
    /// Non-success statuses are returned as [`QueryError`]s carrying the response body.
    pub fn query(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<EndpointResponse, EndpointError> {
        let query = self.normalize_query(query, options.common_prefixes());
        let start = Instant::now();
        let result = self.execute(query, options, start);
        let elapsed = start.elapsed();
        self.metrics.record_timing(elapsed);
        match &result {
            Ok(response) => {
                self.metrics.record_success();
                tracing::debug!(
                    url = %self.query_url,
                    ?elapsed,
                    time_to_first_byte = ?response.time_to_first_byte,
                    "SPARQL query"
                );
            }
            Err(error) => {
                self.metrics.record_failure();
                if options.log_failure() {
                    tracing::error!(url = %self.query_url, ?elapsed, %error, "Failed SPARQL query");
                } else {
                    tracing::debug!(url = %self.query_url, ?elapsed, %error, "Failed SPARQL query");
                }
            }
        }
        result
    }

    fn execute(
        &self,
        query: String,
        options: &QueryOptions,
        start: Instant,
    ) -> Result<EndpointResponse, EndpointError> {
        let response = self.transport.post(TransportRequest {
            url: self.query_url.to_string(),
            form: Serializer::new(String::new())
                .append_pair("query", &query)
                .finish(),
            accept: Some(options.accept_header()),
            user_agent: self.user_agent.clone(),
            timeout: options.timeout(),
        })?;
        let time_to_first_byte = start.elapsed();
        let response = check_status(response)?;
        let (media_type, charset) = parse_content_type(
            response
                .content_type
                .as_deref()
                .unwrap_or(DEFAULT_RESPONSE_MEDIA_TYPE),
        );
        let entry = lookup_media_type(&media_type)
            .filter(|entry| entry.has_parser())
            .ok_or_else(|| {
                EndpointError::Unsupported(format!(
                    "unexpected content type {media_type} returned by {}",
                    self.query_url
                ))
            })?;
        let parser = StreamingParser::new(entry.format(), response.body).with_charset(charset);
        let results = if options.is_deferred() {
            EndpointResults::Stream(parser)
        } else {
            EndpointResults::Materialized(parser.into_results()?)
        };
        Ok(EndpointResponse {
            query,
            time_to_first_byte,
            results,
        })
    }

    /// Sends a SPARQL update, prepending the prefixes it uses.
    pub fn update(&self, update: &str) -> Result<(), EndpointError> {
        let update = self.normalize_query(update, true);
        let start = Instant::now();
        let response = self.transport.post(TransportRequest {
            url: self.update_url().into(),
            form: Serializer::new(String::new())
                .append_pair("update", &update)
                .finish(),
            accept: None,
            user_agent: self.user_agent.clone(),
            timeout: None,
        })?;
        let mut body = check_status(response)?.body;
        io::copy(&mut body, &mut io::sink()).map_err(TransportError::from)?;
        tracing::debug!(url = %self.update_url(), elapsed = ?start.elapsed(), "SPARQL update");
        Ok(())
    }

    /// Inserts the triples, in the given graph or in the default graph.
    pub fn insert_data<'a>(
        &self,
        triples: impl IntoIterator<Item = &'a Triple>,
        graph: Option<&NamedNode>,
    ) -> Result<(), EndpointError> {
        self.update(&format!("INSERT DATA {{ {} }}", data_block(triples, graph)))
    }

    /// Deletes the triples, from the given graph or from the default graph.
    pub fn delete_data<'a>(
        &self,
        triples: impl IntoIterator<Item = &'a Triple>,
        graph: Option<&NamedNode>,
    ) -> Result<(), EndpointError> {
        self.update(&format!("DELETE DATA {{ {} }}", data_block(triples, graph)))
    }

    pub fn clear(&self, graph: &NamedNode) -> Result<(), EndpointError> {
        self.update(&format!("CLEAR GRAPH {graph}"))
    }

    /// Runs a `DESCRIBE` query on the resource.
    pub fn describe(&self, iri: &NamedNode) -> Result<EndpointResponse, EndpointError> {
        self.query(&format!("DESCRIBE {iri}"), &QueryOptions::default())
    }

    /// Checks if the endpoint has a triple with this subject.
    pub fn ask_subject(&self, subject: &Subject) -> Result<bool, EndpointError> {
        let response = self.query(
            &format!("ASK WHERE {{ {subject} ?p ?o }}"),
            &QueryOptions::default().without_common_prefixes().eager(),
        )?;
        match response.into_results()? {
            QueryResults::Boolean(value) => Ok(value),
            results => Err(StreamError::WrongKind {
                expected: ResultKind::Boolean,
                actual: results.kind(),
            }
            .into()),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("query_url", &self.query_url.as_str())
            .field("update_url", &self.update_url())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// The outcome of [`Endpoint::query`].
pub struct EndpointResponse {
    query: String,
    time_to_first_byte: Duration,
    results: EndpointResults,
}

enum EndpointResults {
    Stream(StreamingParser),
    Materialized(QueryResults),
}

impl EndpointResponse {
    /// The query text actually sent, after normalization.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The time between sending the query and receiving the response headers.
    pub fn time_to_first_byte(&self) -> Duration {
        self.time_to_first_byte
    }

    /// The response stream, if the query was not eager.
    pub fn parser_mut(&mut self) -> Option<&mut StreamingParser> {
        match &mut self.results {
            EndpointResults::Stream(parser) => Some(parser),
            EndpointResults::Materialized(_) => None,
        }
    }

    /// The response stream, if the query was not eager.
    pub fn into_parser(self) -> Option<StreamingParser> {
        match self.results {
            EndpointResults::Stream(parser) => Some(parser),
            EndpointResults::Materialized(_) => None,
        }
    }

    /// The results, parsing the rest of the response if needed.
    pub fn into_results(self) -> Result<QueryResults, StreamError> {
        match self.results {
            EndpointResults::Stream(parser) => parser.into_results(),
            EndpointResults::Materialized(results) => Ok(results),
        }
    }
}

fn check_status(response: TransportResponse) -> Result<TransportResponse, EndpointError> {
    if (200..300).contains(&response.status) {
        return Ok(response);
    }
    let mut message = Vec::new();
    response
        .body
        .take(1024 * 1024)
        .read_to_end(&mut message)
        .map_err(TransportError::from)?;
    Err(QueryError::new(response.status, String::from_utf8_lossy(&message)).into())
}

/// Splits a `Content-Type` value into its media type and its charset, `utf-8` by default.
fn parse_content_type(content_type: &str) -> (String, String) {
    let mut parts = content_type.split(';');
    let media_type = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let charset = parts
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map_or_else(
            || "utf-8".to_owned(),
            |(_, value)| value.trim().trim_matches('"').to_owned(),
        );
    (media_type, charset)
}

fn data_block<'a>(triples: impl IntoIterator<Item = &'a Triple>, graph: Option<&NamedNode>) -> String {
    let triples = triples
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" . ");
    match graph {
        Some(graph) => format!("GRAPH {graph} {{ {triples} }}"),
        None => triples,
    }
}
