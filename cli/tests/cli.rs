#![cfg(test)]

use assert_cmd::Command;
use assert_fs::NamedTempFile;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::error::Error;

const SRJ: &str = r#"{"head":{"vars":["x"]},"results":{"bindings":[{"x":{"type":"uri","value":"http://example.org/a"}}]}}"#;

fn cli_command() -> Result<Command, Box<dyn Error>> {
    Ok(Command::cargo_bin("sparstream")?)
}

#[test]
fn cli_help() -> Result<(), Box<dyn Error>> {
    cli_command()?
        .arg("--help")
        .env("RUST_LOG", "debug")
        .assert()
        .success()
        .stdout(predicate::str::contains("convert"));
    Ok(())
}

#[test]
fn cli_convert_stdin_to_stdout() -> Result<(), Box<dyn Error>> {
    cli_command()?
        .arg("convert")
        .arg("--from-format")
        .arg("application/sparql-results+json")
        .arg("--to-format")
        .arg("csv")
        .write_stdin(SRJ)
        .assert()
        .success()
        .stdout("x\nhttp://example.org/a\n");
    Ok(())
}

#[test]
fn cli_convert_files() -> Result<(), Box<dyn Error>> {
    let input = NamedTempFile::new("results.srx")?;
    input.write_str(
        r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#"><head/><boolean>true</boolean></sparql>"#,
    )?;
    let output = NamedTempFile::new("results.csv")?;
    cli_command()?
        .arg("convert")
        .arg("--from-file")
        .arg(input.path())
        .arg("--to-file")
        .arg(output.path())
        .assert()
        .success();
    output.assert("true\n");
    Ok(())
}

#[test]
fn cli_convert_same_format_copies_bytes() -> Result<(), Box<dyn Error>> {
    let body = "<http://e.org/s> <http://e.org/p> \"not closed .\n";
    cli_command()?
        .arg("convert")
        .arg("--from-format")
        .arg("nt")
        .arg("--to-format")
        .arg("text/plain")
        .write_stdin(body)
        .assert()
        .success()
        .stdout(body);
    Ok(())
}

#[test]
fn cli_convert_reports_syntax_errors() -> Result<(), Box<dyn Error>> {
    cli_command()?
        .arg("convert")
        .arg("--from-format")
        .arg("nt")
        .arg("--to-format")
        .arg("rdf")
        .write_stdin("<http://e.org/s> <http://e.org/p> \"not closed .\n")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn cli_convert_requires_formats_for_stdio() -> Result<(), Box<dyn Error>> {
    cli_command()?
        .arg("convert")
        .arg("--from-format")
        .arg("srj")
        .write_stdin(SRJ)
        .assert()
        .failure();
    cli_command()?
        .arg("convert")
        .arg("--from-format")
        .arg("n3")
        .arg("--to-format")
        .arg("csv")
        .write_stdin(SRJ)
        .assert()
        .failure()
        .stderr(predicate::str::contains("The file format 'n3' is unknown"));
    Ok(())
}

#[test]
fn cli_formats() -> Result<(), Box<dyn Error>> {
    cli_command()?
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("srj\tapplication/sparql-results+json\tresults"))
        .stdout(predicate::str::contains("(output only)"));
    Ok(())
}

#[test]
fn cli_query_unreachable_endpoint() -> Result<(), Box<dyn Error>> {
    cli_command()?
        .arg("query")
        .arg("--endpoint")
        .arg("http://127.0.0.1:9/sparql")
        .arg("--query")
        .arg("ASK {}")
        .assert()
        .failure();
    cli_command()?
        .arg("query")
        .arg("--endpoint")
        .arg("not a url")
        .arg("--query")
        .arg("ASK {}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("The endpoint URL not a url is invalid"));
    Ok(())
}
