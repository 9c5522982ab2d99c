use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "sparstream")]
/// Query SPARQL endpoints and convert their results between formats
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert a SPARQL results or RDF graph file from one format to another
    ///
    /// The content is streamed: bindings and triples are written as soon as they are read.
    /// If both formats are the same, the input is copied as it is.
    Convert {
        /// File to convert from
        ///
        /// If no file is given, stdin is read.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        from_file: Option<PathBuf>,
        /// The format of the file to convert from
        ///
        /// It can be an extension like "srj" or a MIME type like "application/sparql-results+json".
        ///
        /// By default, the format is guessed from the input file extension.
        #[arg(long, required_unless_present = "from_file")]
        from_format: Option<String>,
        /// The charset of the input
        #[arg(long, default_value = "utf-8")]
        from_charset: String,
        /// File to convert to
        ///
        /// If no file is given, stdout is written.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        to_file: Option<PathBuf>,
        /// The format of the file to convert to
        ///
        /// It can be an extension like "csv" or a MIME type like "text/csv".
        ///
        /// By default, the format is guessed from the output file extension.
        #[arg(long, required_unless_present = "to_file")]
        to_format: Option<String>,
    },
    /// Evaluate a SPARQL query against a remote endpoint
    ///
    /// The prefixes of the common namespaces used by the query are added to it.
    Query {
        /// URL of the SPARQL endpoint
        #[arg(short, long, value_hint = ValueHint::Url)]
        endpoint: String,
        /// The SPARQL query to evaluate
        ///
        /// If no query or query file is given, stdin is read.
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,
        /// File in which the query is stored
        #[arg(long, value_hint = ValueHint::FilePath)]
        query_file: Option<PathBuf>,
        /// File in which the query results will be stored
        ///
        /// If no file is given, stdout is written.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        results_file: Option<PathBuf>,
        /// The format of the results
        ///
        /// It can be an extension like "srx" or a MIME type like "application/sparql-results+xml".
        ///
        /// By default, the format is guessed from the results file extension,
        /// or the results are written in the format sent by the endpoint.
        #[arg(long)]
        results_format: Option<String>,
        /// Media types to ask the endpoint for, most preferred first
        #[arg(long, num_args = 1..)]
        accept: Vec<String>,
        /// Number of seconds after which the endpoint should abort the query
        #[arg(long)]
        timeout: Option<u64>,
        /// Do not add the prefixes of the common namespaces to the query
        #[arg(long)]
        no_common_prefixes: bool,
        /// Additional namespaces, like "ex=http://example.com/"
        #[arg(long, num_args = 1..)]
        prefix: Vec<String>,
        /// Contact address sent in the User-Agent header
        #[arg(long)]
        contact: Option<String>,
    },
    /// Send a SPARQL update to a remote endpoint
    Update {
        /// URL of the SPARQL update endpoint
        #[arg(short, long, value_hint = ValueHint::Url)]
        endpoint: String,
        /// The SPARQL update to execute
        ///
        /// If no update or update file is given, stdin is read.
        #[arg(short, long, conflicts_with = "update_file")]
        update: Option<String>,
        /// File in which the update is stored
        #[arg(long, value_hint = ValueHint::FilePath)]
        update_file: Option<PathBuf>,
        /// Contact address sent in the User-Agent header
        #[arg(long)]
        contact: Option<String>,
    },
    /// List the supported formats
    Formats,
}
