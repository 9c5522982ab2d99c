#![allow(clippy::print_stdout)]
use crate::cli::{Args, Command};
use anyhow::{Context, bail};
use clap::Parser;
use sparclient::{Endpoint, QueryOptions};
use sparstream::{
    FORMATS, Format, FormatFamily, SerializerConfig, StreamingParser, StreamingSerializer,
    serializer_stats,
};
use sparterm::{NamedNode, Namespaces};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write, stdin, stdout};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match Args::parse().command {
        Command::Convert {
            from_file,
            from_format,
            from_charset,
            to_file,
            to_format,
        } => {
            let from_format = if let Some(format) = from_format {
                format_from_name(&format)?
            } else if let Some(file) = &from_file {
                format_from_path(file)?
            } else {
                bail!("The --from-format option must be set when reading from stdin")
            };
            let to_format = if let Some(format) = to_format {
                format_from_name(&format)?
            } else if let Some(file) = &to_file {
                format_from_path(file)?
            } else {
                bail!("The --to-format option must be set when writing to stdout")
            };
            let parser = if let Some(from_file) = &from_file {
                StreamingParser::new(
                    from_format,
                    File::open(from_file)
                        .with_context(|| format!("Not able to read {}", from_file.display()))?,
                )
            } else {
                StreamingParser::new(from_format, stdin())
            }
            .with_charset(from_charset);
            let serializer = StreamingSerializer::new(to_format, parser)?;
            write_results(serializer, to_file.as_deref())?;
            tracing::debug!(stats = ?serializer_stats(), "Conversion done");
            Ok(())
        }
        Command::Query {
            endpoint,
            query,
            query_file,
            results_file,
            results_format,
            accept,
            timeout,
            no_common_prefixes,
            prefix,
            contact,
        } => {
            let query = read_text(query, query_file.as_deref())?;
            let mut namespaces = Namespaces::common();
            for prefix in prefix {
                let (name, iri) = prefix
                    .split_once('=')
                    .with_context(|| format!("The prefix {prefix} must be written name=IRI"))?;
                let iri = NamedNode::new(iri)
                    .with_context(|| format!("Invalid IRI for prefix {name}: {iri}"))?;
                namespaces.insert(name, iri.into_string());
            }
            let endpoint = endpoint_with_contact(&endpoint, contact.as_deref())?
                .with_namespaces(namespaces);

            let mut options = QueryOptions::default();
            if no_common_prefixes {
                options = options.without_common_prefixes();
            }
            if let Some(timeout) = timeout {
                options = options.with_timeout(Duration::from_secs(timeout));
            }
            if !accept.is_empty() {
                options = options.with_preferred_media_types(accept);
            }
            let response = endpoint.query(&query, &options)?;
            let parser = response
                .into_parser()
                .context("The endpoint response has already been parsed")?;
            let format = if let Some(format) = results_format {
                format_from_name(&format)?
            } else if let Some(file) = &results_file {
                format_from_path(file)?
            } else {
                parser.format()
            };
            let serializer = StreamingSerializer::with_config(
                format,
                parser,
                &SerializerConfig::new().with_namespaces(endpoint.namespaces().clone()),
            )?;
            write_results(serializer, results_file.as_deref())
        }
        Command::Update {
            endpoint,
            update,
            update_file,
            contact,
        } => {
            let update = read_text(update, update_file.as_deref())?;
            endpoint_with_contact(&endpoint, contact.as_deref())?.update(&update)?;
            Ok(())
        }
        Command::Formats => {
            let mut stdout = stdout().lock();
            for entry in &FORMATS {
                writeln!(
                    stdout,
                    "{}\t{}\t{}\t{}{}",
                    entry.extension(),
                    entry.media_type(),
                    match entry.family() {
                        FormatFamily::Graph => "graph",
                        FormatFamily::SparqlResults => "results",
                    },
                    entry.name(),
                    if entry.has_parser() { "" } else { " (output only)" }
                )?;
            }
            Ok(())
        }
    }
}

fn endpoint_with_contact(url: &str, contact: Option<&str>) -> anyhow::Result<Endpoint> {
    let endpoint =
        Endpoint::new(url).with_context(|| format!("The endpoint URL {url} is invalid"))?;
    Ok(if let Some(contact) = contact {
        endpoint.with_contact(contact)
    } else {
        endpoint
    })
}

fn read_text(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(text) = text {
        Ok(text)
    } else if let Some(file) = file {
        fs::read_to_string(file).with_context(|| format!("Not able to read {}", file.display()))
    } else {
        let mut text = String::new();
        stdin().lock().read_to_string(&mut text)?;
        Ok(text)
    }
}

fn write_results(serializer: StreamingSerializer, file: Option<&Path>) -> anyhow::Result<()> {
    if let Some(file) = file {
        let writer = serializer.write_to(BufWriter::new(
            File::create(file).with_context(|| format!("Not able to write {}", file.display()))?,
        ))?;
        close_file_writer(writer)?;
    } else {
        serializer.write_to(stdout().lock())?.flush()?;
    }
    Ok(())
}

fn close_file_writer(writer: BufWriter<File>) -> io::Result<()> {
    let mut file = writer
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    file.flush()?;
    file.sync_all()
}

fn format_from_path(path: &Path) -> anyhow::Result<Format> {
    if let Some(ext) = path.extension().and_then(OsStr::to_str) {
        Format::from_extension(ext).with_context(|| {
            format!("Not able to guess the file format from file name extension '{ext}'")
        })
    } else {
        bail!(
            "The path {} has no extension to guess a file format from",
            path.display()
        )
    }
}

fn format_from_name(name: &str) -> anyhow::Result<Format> {
    if let Some(t) = Format::from_extension(name) {
        return Ok(t);
    }
    if let Some(t) = Format::from_media_type(name) {
        return Ok(t);
    }
    bail!("The file format '{name}' is unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() -> anyhow::Result<()> {
        assert_eq!(format_from_name("srj")?, Format::SparqlJson);
        assert_eq!(format_from_name("text/csv")?, Format::Csv);
        assert_eq!(format_from_name("ttl")?, Format::Turtle);
        assert!(format_from_name("n3").is_err());
        assert_eq!(format_from_path(Path::new("out/results.srx"))?, Format::SparqlXml);
        assert!(format_from_path(Path::new("results")).is_err());
        Ok(())
    }
}
