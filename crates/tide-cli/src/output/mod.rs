use serde::Serialize;
use serde_json::Value;

use crate::cli::{GlobalFlags, OutputFormat};
use crate::terminal::Terminal;

pub mod table;

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    terminal: Terminal,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => Ok(render_table(
            &serde_json::to_value(value)?,
            terminal.table_options(),
        )),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response the way `flags` ask for.
pub fn output<T: Serialize>(value: &T, flags: &GlobalFlags) -> anyhow::Result<()> {
    println!("{}", render(value, flags.format, flags.terminal)?);
    Ok(())
}

/// One compact JSON document per line.
pub fn to_ndjson<T: Serialize>(items: &[T]) -> anyhow::Result<String> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }
    Ok(out)
}

/// Print a list: a table of rows, one JSON line per row for raw, pretty JSON otherwise.
pub fn output_rows<T: Serialize>(items: &[T], flags: &GlobalFlags) -> anyhow::Result<()> {
    match flags.format {
        OutputFormat::Raw => {
            print!("{}", to_ndjson(items)?);
            Ok(())
        }
        OutputFormat::Json | OutputFormat::Table => output(&items, flags),
    }
}

fn render_table(value: &Value, options: table::TableOptions) -> String {
    match value {
        Value::Array(items) => render_array_table(items, options),
        Value::Object(map) => {
            let rows = map
                .iter()
                .map(|(key, value)| vec![key.clone(), value_to_cell(value)])
                .collect::<Vec<_>>();
            table::render_table(&["key", "value"], &rows, options)
        }
        scalar => value_to_cell(scalar),
    }
}

fn render_array_table(items: &[Value], options: table::TableOptions) -> String {
    if items.is_empty() {
        return String::from("(no rows)");
    }

    let mut headers = Vec::<String>::new();
    for map in items.iter().filter_map(Value::as_object) {
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    if headers.is_empty() {
        let rows = items.iter().map(|v| vec![value_to_cell(v)]).collect::<Vec<_>>();
        return table::render_table(&["value"], &rows, options);
    }

    let header_refs = headers.iter().map(String::as_str).collect::<Vec<_>>();
    let rows = items
        .iter()
        .map(|item| {
            headers
                .iter()
                .map(|header| item.get(header).map_or_else(|| String::from("-"), value_to_cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    table::render_table(&header_refs, &rows, options)
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Array(items) if items.is_empty() => String::from("[]"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    use super::{render, to_ndjson};
    use crate::cli::OutputFormat;
    use crate::terminal::Terminal;

    #[derive(Serialize)]
    struct Row {
        day: &'static str,
        average_weight_g: f64,
        confidence_tier: &'static str,
        feed_conversion_ratio: Option<f64>,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                day: "2026-03-01",
                average_weight_g: 50.0,
                confidence_tier: "VERY_HIGH",
                feed_conversion_ratio: None,
            },
            Row {
                day: "2026-03-02",
                average_weight_g: 51.25,
                confidence_tier: "VERY_HIGH",
                feed_conversion_ratio: Some(1.1),
            },
        ]
    }

    #[test]
    fn json_render_is_valid_json() {
        let out = render(&rows(), OutputFormat::Json, Terminal::default()).expect("json render should work");
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("json should parse");
        assert_eq!(parsed[1]["average_weight_g"], 51.25);
    }

    #[test]
    fn raw_render_is_single_line_json() {
        let out = render(&rows(), OutputFormat::Raw, Terminal::default()).expect("raw render should work");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn table_sorts_columns_and_dashes_nulls() {
        let out = render(&rows(), OutputFormat::Table, Terminal::default()).expect("table render should work");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("average_weight_g"));
        assert!(lines[0].trim_end().ends_with("feed_conversion_ratio"));
        assert!(lines[2].trim_end().ends_with('-'));
    }

    #[test]
    fn empty_list_says_so() {
        let out = render(&Vec::<Row>::new(), OutputFormat::Table, Terminal::default()).unwrap();
        assert_eq!(out, "(no rows)");
    }

    #[test]
    fn ndjson_emits_one_line_per_row() {
        let ndjson = to_ndjson(&rows()).expect("ndjson conversion should work");
        assert_eq!(ndjson.lines().count(), 2);
        assert!(ndjson.contains("\"day\":\"2026-03-02\""));
    }
}
