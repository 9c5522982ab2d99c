//! CSV results: a header line with the field names then one line per binding, or a lone `true`/`false`.

use crate::binding::Binding;
use crate::error::{ParseError, SerializeError, SyntaxError};
use crate::results::{ParsedResults, Solutions};
use crate::serializer::SolutionsWriter;
use csv::{ReaderBuilder, StringRecord};
use oxiri::Iri;
use sparterm::{BlankNode, Literal, NamedNode, Term, Variable};
use std::borrow::Cow;
use std::io::BufRead;
use std::sync::Arc;

pub(crate) fn parse(reader: Box<dyn BufRead + Send>) -> Result<ParsedResults, ParseError> {
    let mut records = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .into_records();
    let header = records
        .next()
        .ok_or_else(|| SyntaxError::msg("The CSV document is empty"))??;
    let second = records.next().transpose()?;
    if second.is_none() && header.len() == 1 {
        // A single value line can't be told apart from an empty result set with one field
        match header.get(0) {
            Some("true") => return Ok(ParsedResults::Boolean(true)),
            Some("false") => return Ok(ParsedResults::Boolean(false)),
            _ => (),
        }
    }
    let fields = header
        .iter()
        .map(|name| {
            Variable::new(name).map_err(|e| {
                SyntaxError::msg(format!("Invalid field name '{name}' in the CSV header: {e}"))
            })
        })
        .collect::<Result<Arc<[Variable]>, _>>()?;
    let row_fields = Arc::clone(&fields);
    Ok(ParsedResults::Solutions(Solutions::new(
        fields,
        second
            .map(Ok)
            .into_iter()
            .chain(records)
            .map(move |record| -> Result<Binding, ParseError> {
                Ok(build_binding(&row_fields, &record?)?)
            }),
    )))
}

fn build_binding(fields: &Arc<[Variable]>, record: &StringRecord) -> Result<Binding, SyntaxError> {
    if record.len() > fields.len() {
        return Err(SyntaxError::msg(format!(
            "The CSV line has {} values but the header only {} fields",
            record.len(),
            fields.len()
        )));
    }
    Ok(Binding::new(
        Arc::clone(fields),
        record.iter().map(cell_to_term).collect(),
    ))
}

/// Guesses the term written in a cell.
fn cell_to_term(cell: &str) -> Option<Term> {
    if cell.is_empty() {
        None
    } else if let Some(id) = cell.strip_prefix("_:") {
        Some(BlankNode::new_unchecked(id).into())
    } else if !cell.contains(char::is_whitespace) && Iri::parse(cell).is_ok() {
        Some(NamedNode::new_unchecked(cell).into())
    } else {
        Some(Literal::new_simple_literal(cell).into())
    }
}

/// Writes CSV lines ended by `\n`.
///
/// A value is quoted when it holds a comma, a double quote, a line feed or a space.
pub(crate) struct CsvWriter;

impl SolutionsWriter for CsvWriter {
    fn write_boolean(&mut self, value: bool, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        output.extend_from_slice(if value { b"true\n" } else { b"false\n" });
        Ok(())
    }

    fn write_head(
        &mut self,
        fields: &[Variable],
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        write_line(fields.iter().map(|f| Some(f.as_str().into())), output);
        Ok(())
    }

    fn write_binding(
        &mut self,
        binding: &Binding,
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        write_line(
            binding.values().iter().map(|value| match value {
                Some(Term::BlankNode(node)) => Some(Cow::Owned(node.to_string())),
                Some(term) => Some(Cow::Borrowed(term.to_lexical())),
                None => None,
            }),
            output,
        );
        Ok(())
    }
}

fn write_line<'a>(values: impl IntoIterator<Item = Option<Cow<'a, str>>>, output: &mut Vec<u8>) {
    let start = output.len();
    let mut count = 0;
    for (i, value) in values.into_iter().enumerate() {
        count += 1;
        if i > 0 {
            output.push(b',');
        }
        if let Some(value) = value {
            write_value(&value, output);
        }
    }
    if count == 1 && output.len() == start {
        // A blank line is not a record
        output.extend_from_slice(b"\"\"");
    }
    output.push(b'\n');
}

fn write_value(value: &str, output: &mut Vec<u8>) {
    if value.contains([',', '"', '\n', ' ']) {
        output.push(b'"');
        for part in value.split_inclusive('"') {
            output.extend_from_slice(part.as_bytes());
            if part.ends_with('"') {
                output.push(b'"');
            }
        }
        output.push(b'"');
    } else {
        output.extend_from_slice(value.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn parse_str(data: &'static str) -> Result<ParsedResults, ParseError> {
        parse(Box::new(data.as_bytes()))
    }

    fn write_value_str(value: &str) -> String {
        let mut output = Vec::new();
        write_value(value, &mut output);
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn quoting() {
        assert_eq!(write_value_str("plain"), "plain");
        assert_eq!(write_value_str("two words"), "\"two words\"");
        assert_eq!(write_value_str("a,b"), "\"a,b\"");
        assert_eq!(write_value_str("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(write_value_str("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn boolean_lines() -> Result<(), ParseError> {
        assert!(matches!(parse_str("true\n")?, ParsedResults::Boolean(true)));
        assert!(matches!(parse_str("false")?, ParsedResults::Boolean(false)));
        assert!(matches!(
            parse_str("true\nhttp://e.com/\n")?,
            ParsedResults::Solutions(_)
        ));
        Ok(())
    }

    #[test]
    fn typed_cells() -> Result<(), ParseError> {
        let ParsedResults::Solutions(solutions) =
            parse_str("s,o,n\nhttp://e.com/a,\"hello world\",\n_:b1,http://e.com/b,12\n")?
        else {
            panic!("solutions expected")
        };
        assert_eq!(solutions.fields().len(), 3);
        let bindings = solutions.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(
            bindings[0].get("s"),
            Some(&NamedNode::new_unchecked("http://e.com/a").into())
        );
        assert_eq!(
            bindings[0].get("o"),
            Some(&Literal::new_simple_literal("hello world").into())
        );
        assert_eq!(bindings[0].get("n"), None);
        assert_eq!(
            bindings[1].get("s"),
            Some(&BlankNode::new_unchecked("b1").into())
        );
        assert_eq!(
            bindings[1].get("n"),
            Some(&Literal::new_simple_literal("12").into())
        );
        Ok(())
    }

    #[test]
    fn invalid_documents() {
        assert!(parse_str("").is_err());
        assert!(parse_str("not a var,x\n").is_err());
        let ParsedResults::Solutions(mut solutions) = parse_str("a\n1,2\n").unwrap() else {
            panic!("solutions expected")
        };
        assert!(matches!(solutions.next(), Some(Err(_))));
    }

    #[test]
    fn writer() -> Result<(), SerializeError> {
        let fields: Arc<[Variable]> =
            vec![Variable::new_unchecked("a"), Variable::new_unchecked("b")].into();
        let mut output = Vec::new();
        let mut writer = CsvWriter;
        writer.write_head(&fields, &mut output)?;
        writer.write_binding(
            &Binding::new(
                Arc::clone(&fields),
                vec![Some(BlankNode::new_unchecked("x").into()), None],
            ),
            &mut output,
        )?;
        writer.write_binding(
            &Binding::new(
                fields,
                vec![None, Some(Literal::new_simple_literal("1, 2").into())],
            ),
            &mut output,
        )?;
        assert_eq!(String::from_utf8_lossy(&output), "a,b\n_:x,\n,\"1, 2\"\n");
        Ok(())
    }

    #[test]
    fn unbound_single_field_rows_are_kept() -> Result<(), Box<dyn std::error::Error>> {
        let fields: Arc<[Variable]> = vec![Variable::new_unchecked("x")].into();
        let mut output = Vec::new();
        let mut writer = CsvWriter;
        writer.write_head(&fields, &mut output)?;
        writer.write_binding(&Binding::new(Arc::clone(&fields), vec![None]), &mut output)?;
        writer.write_binding(
            &Binding::new(fields, vec![Some(Literal::new_simple_literal("a").into())]),
            &mut output,
        )?;
        assert_eq!(String::from_utf8_lossy(&output), "x\n\"\"\na\n");

        let ParsedResults::Solutions(solutions) = parse(Box::new(io::Cursor::new(output)))? else {
            panic!("solutions expected")
        };
        let bindings = solutions.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].get("x"), None);
        assert_eq!(
            bindings[1].get("x"),
            Some(&Literal::new_simple_literal("a").into())
        );
        Ok(())
    }
}
