//! Pure textual rendering of a [`QueryResult`] (§6): header line, separator,
//! one line per row, trailing message.

use crate::executor::QueryResult;
use crate::value::{ColumnDef, Value};

fn render_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::Int(i)) => i.to_string(),
        Some(Value::Text(s)) => format!("\"{s}\""),
        Some(Value::Boolean(b)) => if *b { "true" } else { "false" }.to_string(),
        None => "???".to_string(),
    }
}

fn separator(columns: &[ColumnDef]) -> String {
    "+----------".repeat(columns.len()) + "+"
}

/// Renders a tabular result as header + separator + rows + trailing
/// message, or just the message for a non-tabular result.
pub fn render(result: &QueryResult) -> String {
    match result {
        QueryResult::Message(message) => message.clone(),
        QueryResult::Rows { columns, rows, message } => {
            let mut out = String::new();
            let header = columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(" ");
            out.push_str(&header);
            out.push('\n');
            out.push_str(&separator(columns));
            out.push('\n');
            for row in rows {
                let line = columns
                    .iter()
                    .map(|c| render_value(row.get(&c.name)))
                    .collect::<Vec<_>>()
                    .join(" ");
                out.push_str(&line);
                out.push('\n');
            }
            out.push_str(message);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{row, ColumnAttribute};

    #[test]
    fn renders_header_separator_rows_and_message() {
        let columns = vec![ColumnDef::new("id", ColumnAttribute::Int), ColumnDef::new("data", ColumnAttribute::Text)];
        let rows = vec![row([("id", Value::Int(1)), ("data", Value::Text("hi".into()))])];
        let result = QueryResult::Rows { columns, rows, message: "1 rows".to_string() };
        let text = render(&result);
        assert!(text.starts_with("id data\n+----------+----------+\n1 \"hi\"\n1 rows"));
    }

    #[test]
    fn message_result_renders_as_is() {
        let result = QueryResult::Message("created table foo".to_string());
        assert_eq!(render(&result), "created table foo");
    }
}
