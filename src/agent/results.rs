//! Turns query results into the text shown to the user

use crate::agent::error::AgentError;
use crate::database::{CellValue, Record};
use crate::format::{FormatError, format_records_markdown, format_records_raw};

pub const NO_DATA_MESSAGE: &str = "I couldn't find any data that matched your request. It's possible there are no records that fit the criteria.";

/// Apology wrapping a step failure
pub fn apology(error: &AgentError) -> String {
    format!(
        "I'm sorry, something went wrong while processing your request: {}",
        error
    )
}

/// Fallback when the rows cannot be laid out as a table
pub fn raw_fallback(records: &[Record]) -> String {
    format!(
        "I had trouble formatting the results. Here is the raw data I retrieved: {}",
        format_records_raw(records)
    )
}

fn query_echo(sql: &str) -> String {
    format!(
        "To get that data, I ran the following SQL query:\n```sql\n{}\n```",
        sql
    )
}

fn with_optional_query(sql: &str, show_query: bool, body: String) -> String {
    if show_query {
        format!("{}\n\n{}", query_echo(sql), body)
    } else {
        body
    }
}

/// Describe the result set: one value as a sentence, anything else as a counted table
pub fn describe_records(records: &[Record]) -> Result<String, FormatError> {
    if let [only] = records {
        if only.len() == 1 {
            if let Some((column, value)) = only.columns().zip(only.values()).next() {
                if let CellValue::Unsupported(type_name) = value {
                    return Err(FormatError::UnrenderableCell {
                        column: column.to_string(),
                        type_name: type_name.clone(),
                    });
                }
                return Ok(format!("The answer to your question is: {}.", value.to_answer()));
            }
        }
    }

    let table = format_records_markdown(records)?;
    Ok(format!(
        "I found {} records matching your request. Here are the results:\n\n{}",
        records.len(),
        table
    ))
}

/// Full answer for a completed query cycle, including the optional SQL echo
pub fn compose_answer(
    sql: &str,
    records: &[Record],
    show_query: bool,
) -> Result<String, FormatError> {
    let body = if records.is_empty() {
        NO_DATA_MESSAGE.to_string()
    } else {
        describe_records(records)?
    };
    Ok(with_optional_query(sql, show_query, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, name: &str) -> Record {
        Record::new()
            .with_field("id", CellValue::Int(id))
            .with_field("name", CellValue::Text(name.to_string()))
    }

    #[test]
    fn test_single_value_sentence() {
        let records = vec![Record::new().with_field("count", CellValue::Int(5))];
        let answer = compose_answer("SELECT COUNT(*) AS count FROM users", &records, false).unwrap();
        assert_eq!(answer, "The answer to your question is: 5.");
    }

    #[test]
    fn test_single_value_null_and_float() {
        let null = vec![Record::new().with_field("max", CellValue::Null)];
        assert_eq!(
            describe_records(&null).unwrap(),
            "The answer to your question is: None."
        );

        let total = vec![Record::new().with_field("total", CellValue::Float(5.0))];
        assert_eq!(
            describe_records(&total).unwrap(),
            "The answer to your question is: 5.0."
        );
    }

    #[test]
    fn test_multi_row_table() {
        let records = vec![row(1, "Ann"), row(2, "Bo"), row(3, "Cy")];
        let answer = compose_answer("SELECT id, name FROM users", &records, false).unwrap();

        assert!(answer.starts_with(
            "I found 3 records matching your request. Here are the results:\n\n"
        ));
        assert!(answer.contains("| id | name |"));
        let ann = answer.find("Ann").unwrap();
        let bo = answer.find("Bo").unwrap();
        let cy = answer.find("Cy").unwrap();
        assert!(ann < bo && bo < cy);
    }

    #[test]
    fn test_single_row_many_columns_is_a_table() {
        let answer = describe_records(&[row(1, "Ann")]).unwrap();
        assert!(answer.starts_with("I found 1 records matching your request."));
    }

    #[test]
    fn test_show_query_prefix() {
        let sql = "SELECT COUNT(*) FROM users";
        let records = vec![Record::new().with_field("n", CellValue::Int(2))];

        let shown = compose_answer(sql, &records, true).unwrap();
        assert_eq!(
            shown,
            "To get that data, I ran the following SQL query:\n```sql\nSELECT COUNT(*) FROM users\n```\n\nThe answer to your question is: 2."
        );

        let hidden = compose_answer(sql, &records, false).unwrap();
        assert!(!hidden.contains(sql));
    }

    #[test]
    fn test_empty_result() {
        assert_eq!(
            compose_answer("SELECT 1 WHERE 0", &[], false).unwrap(),
            NO_DATA_MESSAGE
        );
        assert!(compose_answer("SELECT 1 WHERE 0", &[], true)
            .unwrap()
            .ends_with(NO_DATA_MESSAGE));
    }

    #[test]
    fn test_unrenderable_rows_fail() {
        let records = vec![
            Record::new().with_field("g", CellValue::Unsupported("GEOMETRY".to_string())),
            Record::new().with_field("g", CellValue::Unsupported("GEOMETRY".to_string())),
        ];
        assert!(compose_answer("SELECT g FROM shapes", &records, true).is_err());
        assert!(raw_fallback(&records).starts_with("I had trouble formatting the results."));
    }

    #[test]
    fn test_apology_embeds_error() {
        let err = AgentError::execution("no such table: t");
        assert_eq!(
            apology(&err),
            "I'm sorry, something went wrong while processing your request: Error executing SQL: no such table: t"
        );
    }
}
