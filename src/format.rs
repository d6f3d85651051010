use crate::database::{CellValue, Record};
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator, TableFormat};
use prettytable::{Cell, Row, Table};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FormatError {
    #[error("Result set has no columns")]
    NoColumns,

    #[error("Row {row} has columns {found:?}, expected {expected:?}")]
    RaggedRow {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Column '{column}' holds a value of type {type_name} that cannot be displayed")]
    UnrenderableCell { column: String, type_name: String },
}

/// GitHub-flavoured markdown pipe table
fn markdown_format() -> TableFormat {
    FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separators(&[LinePosition::Title], LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn escape_markdown_cell(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('|', "\\|")
}

fn render_cell(column: &str, value: &CellValue) -> Result<String, FormatError> {
    match value {
        CellValue::Unsupported(type_name) => Err(FormatError::UnrenderableCell {
            column: column.to_string(),
            type_name: type_name.clone(),
        }),
        CellValue::Null => Ok(String::new()),
        other => Ok(escape_markdown_cell(&other.to_string())),
    }
}

/// Render records as a markdown table. Column order follows the first record
/// and row order follows the slice.
pub fn format_records_markdown(records: &[Record]) -> Result<String, FormatError> {
    let Some(first) = records.first() else {
        return Ok(String::new());
    };

    let header: Vec<String> = first.columns().map(str::to_string).collect();
    if header.is_empty() {
        return Err(FormatError::NoColumns);
    }

    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(Row::new(
        header
            .iter()
            .map(|name| Cell::new(&escape_markdown_cell(name)))
            .collect(),
    ));

    for (row_idx, record) in records.iter().enumerate() {
        let columns: Vec<String> = record.columns().map(str::to_string).collect();
        if columns != header {
            return Err(FormatError::RaggedRow {
                row: row_idx,
                expected: header,
                found: columns,
            });
        }

        let cells = record
            .columns()
            .zip(record.values())
            .map(|(column, value)| render_cell(column, value).map(|text| Cell::new(&text)))
            .collect::<Result<Vec<_>, _>>()?;
        table.add_row(Row::new(cells));
    }

    Ok(table.to_string().trim_end().to_string())
}

/// Plain dump of the records, used when the table cannot be rendered
pub fn format_records_raw(records: &[Record]) -> String {
    let rows = records
        .iter()
        .map(|record| record.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{rows}]")
}
