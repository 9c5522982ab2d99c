//! Spreadsheet output as a [SpreadsheetML 2003](https://learn.microsoft.com/en-us/previous-versions/office/developer/office-xp/aa140066(v=office.10)) workbook, opened by Excel as `application/vnd.ms-excel`.

use crate::binding::Binding;
use crate::error::SerializeError;
use crate::serializer::SolutionsWriter;
use quick_xml::escape::escape;
use sparterm::vocab::xsd;
use sparterm::{Term, Variable};
use std::io::Write;

const WORKBOOK_START: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
    "<?mso-application progid=\"Excel.Sheet\"?>\n",
    "<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
    " <Worksheet ss:Name=\"Results\">\n",
    "  <Table>\n"
);

const WORKBOOK_END: &str = "  </Table>\n </Worksheet>\n</Workbook>\n";

const NUMERIC_DATATYPES: [&str; 4] = [xsd::INTEGER, xsd::DECIMAL, xsd::DOUBLE, xsd::FLOAT];

/// Writes one header row then one row per binding.
#[derive(Default)]
pub(crate) struct XlsWriter;

impl SolutionsWriter for XlsWriter {
    fn write_boolean(&mut self, value: bool, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        output.extend_from_slice(WORKBOOK_START.as_bytes());
        write!(
            output,
            "   <Row><Cell><Data ss:Type=\"String\">{value}</Data></Cell></Row>\n{WORKBOOK_END}"
        )?;
        Ok(())
    }

    fn write_head(
        &mut self,
        fields: &[Variable],
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        output.extend_from_slice(WORKBOOK_START.as_bytes());
        output.extend_from_slice(b"   <Row>");
        for field in fields {
            write!(
                output,
                "<Cell><Data ss:Type=\"String\">{}</Data></Cell>",
                escape(field.as_str())
            )?;
        }
        output.extend_from_slice(b"</Row>\n");
        Ok(())
    }

    fn write_binding(
        &mut self,
        binding: &Binding,
        output: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        output.extend_from_slice(b"   <Row>");
        for value in binding.values() {
            match value {
                None => output.extend_from_slice(b"<Cell/>"),
                Some(Term::BlankNode(node)) => write!(
                    output,
                    "<Cell><Data ss:Type=\"String\">{}</Data></Cell>",
                    escape(&node.to_string())
                )?,
                Some(term) => {
                    let cell_type = match term {
                        Term::Literal(literal)
                            if literal
                                .datatype()
                                .is_some_and(|d| NUMERIC_DATATYPES.contains(&d.as_str())) =>
                        {
                            "Number"
                        }
                        _ => "String",
                    };
                    write!(
                        output,
                        "<Cell><Data ss:Type=\"{cell_type}\">{}</Data></Cell>",
                        escape(term.to_lexical())
                    )?;
                }
            }
        }
        output.extend_from_slice(b"</Row>\n");
        Ok(())
    }

    fn write_tail(&mut self, output: &mut Vec<u8>) -> Result<(), SerializeError> {
        output.extend_from_slice(WORKBOOK_END.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparterm::{Literal, NamedNode};
    use std::sync::Arc;

    #[test]
    fn workbook_rows() -> Result<(), SerializeError> {
        let fields: Arc<[Variable]> =
            vec![Variable::new_unchecked("a"), Variable::new_unchecked("n")].into();
        let mut output = Vec::new();
        let mut writer = XlsWriter;
        writer.write_head(&fields, &mut output)?;
        writer.write_binding(
            &Binding::new(
                fields,
                vec![
                    Some(Literal::new_simple_literal("R&D").into()),
                    Some(
                        Literal::new_typed_literal("42", NamedNode::new_unchecked(xsd::INTEGER))
                            .into(),
                    ),
                ],
            ),
            &mut output,
        )?;
        writer.write_tail(&mut output)?;
        let output = String::from_utf8_lossy(&output);
        assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n"));
        assert!(output.contains(
            "   <Row><Cell><Data ss:Type=\"String\">a</Data></Cell><Cell><Data ss:Type=\"String\">n</Data></Cell></Row>\n"
        ));
        assert!(output.contains(
            "   <Row><Cell><Data ss:Type=\"String\">R&amp;D</Data></Cell><Cell><Data ss:Type=\"Number\">42</Data></Cell></Row>\n"
        ));
        assert!(output.ends_with("</Workbook>\n"));
        Ok(())
    }

    #[test]
    fn boolean_cell() -> Result<(), SerializeError> {
        let mut output = Vec::new();
        XlsWriter.write_boolean(false, &mut output)?;
        assert!(
            String::from_utf8_lossy(&output)
                .contains("<Row><Cell><Data ss:Type=\"String\">false</Data></Cell></Row>")
        );
        Ok(())
    }
}
