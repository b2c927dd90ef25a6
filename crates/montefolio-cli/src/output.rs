use std::io::{self, Write};

use montefolio_core::{Envelope, BAR_COLUMNS, SIMULATION_COLUMNS};
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Ndjson => write_ndjson(&mut out, envelope)?,
        OutputFormat::Table => write_table(&mut out, envelope)?,
    }
    Ok(())
}

/// Header line with metadata and errors, then one line per row.
fn write_ndjson(out: &mut impl Write, envelope: &Envelope<Value>) -> Result<(), CliError> {
    let rows = envelope.data.get("rows").and_then(Value::as_array);
    let mut summary = envelope.data.clone();
    if let Some(map) = summary.as_object_mut() {
        map.remove("rows");
    }

    let header = json!({
        "meta": serde_json::to_value(&envelope.meta)?,
        "summary": summary,
        "errors": serde_json::to_value(&envelope.errors)?,
    });
    writeln!(out, "{}", serde_json::to_string(&header)?)?;
    for row in rows.into_iter().flatten() {
        writeln!(out, "{}", serde_json::to_string(row)?)?;
    }
    Ok(())
}

fn write_table(out: &mut impl Write, envelope: &Envelope<Value>) -> Result<(), CliError> {
    writeln!(out, "request_id  : {}", envelope.meta.request_id)?;
    writeln!(out, "schema      : {}", envelope.meta.schema_version)?;
    writeln!(out, "generated_at: {}", envelope.meta.generated_at)?;
    writeln!(out, "sources     : {}", envelope.meta.source_chain.join(","))?;
    writeln!(out, "latency_ms  : {}", envelope.meta.latency_ms)?;

    if !envelope.meta.warnings.is_empty() {
        writeln!(out, "warnings:")?;
        for warning in &envelope.meta.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }

    match envelope.data.get("rows").and_then(Value::as_array) {
        Some(rows) if !rows.is_empty() => write_rows(out, rows)?,
        _ => {
            writeln!(out, "data:")?;
            for line in serde_json::to_string_pretty(&envelope.data)?.lines() {
                writeln!(out, "  {line}")?;
            }
        }
    }

    if !envelope.errors.is_empty() {
        writeln!(out, "errors:")?;
        for error in &envelope.errors {
            writeln!(out, "  - {}: {}", error.code, error.message)?;
        }
    }
    Ok(())
}

/// Column-aligned rows. Bar and simulation rows use their canonical column
/// order; anything else uses the first row's keys.
fn write_rows(out: &mut impl Write, rows: &[Value]) -> Result<(), CliError> {
    let Some(first) = rows[0].as_object() else {
        return Ok(());
    };
    let columns = [&BAR_COLUMNS[..], &SIMULATION_COLUMNS[..]]
        .into_iter()
        .find(|known| known.len() == first.len() && known.iter().all(|key| first.contains_key(*key)))
        .map_or_else(
            || first.keys().cloned().collect::<Vec<_>>(),
            |known| known.iter().map(|key| String::from(*key)).collect(),
        );
    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| match row.get(column) {
                    Some(Value::String(text)) => text.clone(),
                    Some(Value::Number(number)) => match number.as_f64() {
                        Some(value) if number.is_f64() => format!("{value:.6}"),
                        _ => number.to_string(),
                    },
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let widths = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain([column.len()])
                .max()
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{value:>width$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };
    writeln!(out, "{}", line(columns.as_slice()))?;
    for row in &cells {
        writeln!(out, "{}", line(row.as_slice()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use montefolio_core::EnvelopeMeta;

    fn envelope() -> Envelope<Value> {
        let meta = EnvelopeMeta::new("request-12345", vec![String::from("yfinance")], 4)
            .expect("meta");
        Envelope::success(
            meta,
            json!({
                "row_count": 2,
                "rows": [
                    {"ticker": "AAPL", "year": 1, "ending_value": 101.5},
                    {"ticker": "MSFT", "year": 1, "ending_value": 99.25}
                ]
            }),
        )
    }

    #[test]
    fn ndjson_writes_header_then_rows() {
        let mut buffer = Vec::new();
        write_ndjson(&mut buffer, &envelope()).expect("ndjson");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);

        let header: Value = serde_json::from_str(lines[0]).expect("header");
        assert_eq!(header["summary"]["row_count"], json!(2));
        assert!(header["summary"].get("rows").is_none());
        let row: Value = serde_json::from_str(lines[2]).expect("row");
        assert_eq!(row["ticker"], json!("MSFT"));
    }

    #[test]
    fn table_aligns_row_columns() {
        let mut buffer = Vec::new();
        write_table(&mut buffer, &envelope()).expect("table");
        let text = String::from_utf8(buffer).expect("utf8");
        assert!(text.contains("sources     : yfinance"));
        assert!(text.contains("101.500000"));
        assert!(text.contains("MSFT"));
    }

    #[test]
    fn bar_rows_keep_canonical_column_order() {
        let rows = vec![json!({
            "volume": 10, "ticker": "AAPL", "date": "2024-01-02", "open": 1.0,
            "high": 2.0, "low": 0.5, "close": 1.5, "adj_close": 1.5
        })];
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &rows).expect("rows");
        let text = String::from_utf8(buffer).expect("utf8");
        let header = text.lines().next().expect("header").split_whitespace().collect::<Vec<_>>();
        assert_eq!(header, BAR_COLUMNS);
    }
}
