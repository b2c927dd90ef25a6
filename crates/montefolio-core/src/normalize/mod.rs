//! Schema normalization: provider payloads to [`CanonicalRow`]s.
//!
//! Three layouts are accepted:
//!
//! - **wide** tables keyed by `(ticker, field)` pairs in either order,
//!   resolved through [`axis::resolve_ticker_axis`];
//! - **flat** single-ticker tables with one-level column names;
//! - **candle** records from the quote provider (parallel arrays keyed by
//!   UNIX seconds).
//!
//! A ticker or record that cannot be read is skipped with a warning. Only a
//! flat table without the required fields is fatal, since there is nothing
//! else in it to keep.

pub mod axis;

use serde_json::Value;
use time::PrimitiveDateTime;
use tracing::{debug, warn};

use crate::payload::{CandleResponse, ColumnKey, Payload, RawTable, TableShape};
use crate::{from_unix_seconds, parse_datetime, CanonicalRow, CoreError};

pub use axis::{resolve_ticker_axis, Axis, AxisResolution, ResolutionRule, PLACEHOLDER_TICKER};

/// Fields every ticker must provide; `adj_close` falls back to `close`.
pub const REQUIRED_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Output of one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub rows: Vec<CanonicalRow>,
    /// Human-readable notes about skipped tickers and records.
    pub warnings: Vec<String>,
}

impl Normalized {
    fn warn(&mut self, message: String) {
        warn!(%message, "normalization skipped input");
        self.warnings.push(message);
    }
}

#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    fallback_ticker: String,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self {
            fallback_ticker: String::from(PLACEHOLDER_TICKER),
        }
    }
}

impl SchemaNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticker used for flat tables and candle records that do not name one.
    pub fn with_fallback_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.fallback_ticker = ticker.into();
        self
    }

    pub fn normalize(&self, payload: &Payload) -> Result<Normalized, CoreError> {
        match payload {
            Payload::Table(table) => self.normalize_table(table),
            Payload::Candles { records } => Ok(self.normalize_candles(records)),
        }
    }

    pub fn normalize_table(&self, table: &RawTable) -> Result<Normalized, CoreError> {
        let normalized = match table.shape()? {
            TableShape::Empty => Normalized::default(),
            TableShape::Wide => self.normalize_wide(table),
            TableShape::Flat => self.normalize_flat(table)?,
        };
        debug!(
            rows = normalized.rows.len(),
            warnings = normalized.warnings.len(),
            "normalized table"
        );
        Ok(normalized)
    }

    fn normalize_wide(&self, table: &RawTable) -> Normalized {
        let keys = table
            .columns
            .iter()
            .filter_map(|column| match &column.key {
                ColumnKey::Pair(outer, inner) => Some((outer.clone(), inner.clone())),
                ColumnKey::Single(_) => None,
            })
            .collect::<Vec<_>>();

        let resolution = resolve_ticker_axis(&keys);
        let mut output = Normalized::default();
        if resolution.is_fallback() {
            output.warn(format!(
                "ticker axis is ambiguous; resolved {:?} by {:?}",
                resolution.tickers, resolution.rule
            ));
        }

        for ticker in &resolution.tickers {
            let mut fields = FieldTable::new(&table.index, FieldNaming::Wide);
            for column in &table.columns {
                let ColumnKey::Pair(outer, inner) = &column.key else {
                    continue;
                };
                let belongs = resolution
                    .ticker_component(outer, inner)
                    .map_or(true, |component| component == ticker);
                if belongs {
                    fields.push(resolution.field_component(outer, inner), &column.values);
                }
            }

            let missing = fields.missing_required();
            if !missing.is_empty() {
                // Dates come from a date column or the row index, never row positions.
                let dateless = if fields.dates().is_none() {
                    " (no date column and the row index is empty)"
                } else {
                    ""
                };
                output.warn(format!(
                    "skipped ticker '{ticker}': missing required columns {missing:?}{dateless}"
                ));
                continue;
            }

            match fields.rows(|_| Some(ticker.clone()), ticker) {
                Ok(rows) => output.rows.extend(rows),
                Err(error) => output.warn(format!("skipped ticker '{ticker}': {error}")),
            }
        }

        output
    }

    fn normalize_flat(&self, table: &RawTable) -> Result<Normalized, CoreError> {
        let mut fields = FieldTable::new(&table.index, FieldNaming::Flat);
        for column in &table.columns {
            if let ColumnKey::Single(name) = &column.key {
                fields.push(name, &column.values);
            }
        }

        let missing = fields.missing_required();
        if !missing.is_empty() {
            return Err(CoreError::missing_columns(missing));
        }

        let tickers = fields.get("ticker");
        let rows = fields.rows(
            |row| tickers.and_then(|cells| text_cell(&cells[row])),
            &self.fallback_ticker,
        )?;

        Ok(Normalized {
            rows,
            warnings: Vec::new(),
        })
    }

    pub fn normalize_candles(&self, records: &[CandleResponse]) -> Normalized {
        let mut output = Normalized::default();

        for record in records {
            let symbol = record
                .symbol
                .as_deref()
                .map(str::trim)
                .filter(|symbol| !symbol.is_empty())
                .unwrap_or(self.fallback_ticker.as_str());

            if !record.is_ok() {
                let reason = record
                    .error
                    .as_deref()
                    .or(record.status.as_deref())
                    .unwrap_or("missing success indicator");
                output.warn(format!("no historical data for '{symbol}': {reason}"));
                continue;
            }

            match candle_rows(symbol, record) {
                Ok(rows) => output.rows.extend(rows),
                Err(reason) => output.warn(format!("skipped candles for '{symbol}': {reason}")),
            }
        }

        debug!(
            records = records.len(),
            rows = output.rows.len(),
            "normalized candle records"
        );
        output
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldNaming {
    Wide,
    Flat,
}

/// Single-level view over the columns belonging to one ticker.
struct FieldTable<'a> {
    index: &'a [Value],
    naming: FieldNaming,
    columns: Vec<(String, &'a [Value])>,
}

impl<'a> FieldTable<'a> {
    fn new(index: &'a [Value], naming: FieldNaming) -> Self {
        Self {
            index,
            naming,
            columns: Vec::new(),
        }
    }

    /// Adds a column under its canonical name; the first column with a name wins.
    fn push(&mut self, name: &str, values: &'a [Value]) {
        let name = canonical_field_name(name, self.naming);
        if self.get(&name).is_none() {
            self.columns.push((name, values));
        }
    }

    fn get(&self, name: &str) -> Option<&'a [Value]> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, values)| *values)
    }

    fn dates(&self) -> Option<&'a [Value]> {
        self.get("date")
            .or_else(|| (!self.index.is_empty()).then_some(self.index))
    }

    fn missing_required(&self) -> Vec<String> {
        let mut missing = REQUIRED_FIELDS
            .iter()
            .filter(|field| self.get(field).is_none())
            .map(|field| String::from(*field))
            .collect::<Vec<_>>();
        if self.dates().is_none() {
            missing.push(String::from("date"));
        }
        missing
    }

    /// Builds rows; callers must have checked [`Self::missing_required`].
    fn rows<F>(&self, ticker_at: F, fallback_ticker: &str) -> Result<Vec<CanonicalRow>, CoreError>
    where
        F: Fn(usize) -> Option<String>,
    {
        let dates = self
            .dates()
            .ok_or_else(|| CoreError::missing_columns(["date"]))?;
        let column = |name: &str| {
            self.get(name)
                .ok_or_else(|| CoreError::missing_columns([name]))
        };
        let open = column("open")?;
        let high = column("high")?;
        let low = column("low")?;
        let close = column("close")?;
        let volume = column("volume")?;
        let adj_close = self.get("adj_close").unwrap_or(close);

        dates
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                let timestamp = timestamp_cell(cell).ok_or_else(|| CoreError::InvalidCell {
                    column: String::from("date"),
                    row,
                    value: cell.to_string(),
                })?;
                Ok(CanonicalRow {
                    ticker: ticker_at(row).unwrap_or_else(|| fallback_ticker.to_owned()),
                    timestamp,
                    open: numeric_cell(&open[row]),
                    high: numeric_cell(&high[row]),
                    low: numeric_cell(&low[row]),
                    close: numeric_cell(&close[row]),
                    adj_close: numeric_cell(&adj_close[row]),
                    volume: numeric_cell(&volume[row]),
                })
            })
            .collect()
    }
}

fn canonical_field_name(name: &str, naming: FieldNaming) -> String {
    let lowered = name.trim().to_ascii_lowercase();
    match (lowered.as_str(), naming) {
        ("adj close" | "adjclose", _) => String::from("adj_close"),
        ("symbol", FieldNaming::Flat) => String::from("ticker"),
        ("datetime", FieldNaming::Flat) => String::from("date"),
        _ => lowered,
    }
}

fn candle_rows(symbol: &str, record: &CandleResponse) -> Result<Vec<CanonicalRow>, String> {
    let len = record.timestamps.len();
    let arrays = [
        ("o", record.open.len()),
        ("h", record.high.len()),
        ("l", record.low.len()),
        ("c", record.close.len()),
        ("v", record.volume.len()),
    ];
    if let Some((name, other)) = arrays.iter().find(|(_, other)| *other != len) {
        return Err(format!(
            "array '{name}' has {other} entries but 't' has {len}"
        ));
    }

    record
        .timestamps
        .iter()
        .enumerate()
        .map(|(index, seconds)| {
            let timestamp = from_unix_seconds(*seconds).map_err(|error| error.to_string())?;
            Ok(CanonicalRow {
                ticker: symbol.to_owned(),
                timestamp,
                open: record.open[index],
                high: record.high[index],
                low: record.low[index],
                close: record.close[index],
                // The candle endpoint has no adjusted series.
                adj_close: record.close[index],
                volume: record.volume[index],
            })
        })
        .collect()
}

fn timestamp_cell(cell: &Value) -> Option<PrimitiveDateTime> {
    match cell {
        Value::String(text) => parse_datetime(text).ok(),
        Value::Number(number) => {
            let seconds = number.as_i64().or_else(|| {
                number
                    .as_f64()
                    .filter(|value| value.fract() == 0.0)
                    .map(|value| value as i64)
            })?;
            from_unix_seconds(seconds).ok()
        }
        _ => None,
    }
}

fn numeric_cell(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text_cell(cell: &Value) -> Option<String> {
    match cell {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Column;
    use serde_json::json;
    use time::macros::datetime;

    fn dates() -> Vec<Value> {
        vec![json!("2024-01-02"), json!("2024-01-03")]
    }

    fn field_columns(ticker: &str, ticker_outer: bool, base: f64) -> Vec<Column> {
        ["Open", "High", "Low", "Close", "Volume"]
            .iter()
            .enumerate()
            .map(|(offset, field)| {
                let values = vec![json!(base + offset as f64), json!(base + offset as f64 + 0.5)];
                if ticker_outer {
                    Column::pair(ticker, *field, values)
                } else {
                    Column::pair(*field, ticker, values)
                }
            })
            .collect()
    }

    #[test]
    fn wide_table_keeps_fields_attributed_to_their_ticker() {
        let mut columns = field_columns("AAPL", true, 10.0);
        columns.extend(field_columns("MSFT", true, 100.0));
        let table = RawTable::new(dates(), columns);

        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");

        assert_eq!(normalized.rows.len(), 4);
        assert!(normalized.warnings.is_empty());
        let msft = normalized
            .rows
            .iter()
            .find(|row| row.ticker == "MSFT" && row.timestamp == datetime!(2024-01-03 00:00:00))
            .expect("msft row");
        assert_eq!(msft.open, Some(100.5));
        assert_eq!(msft.close, Some(103.5));
        assert_eq!(msft.adj_close, Some(103.5));
        assert_eq!(msft.volume, Some(104.5));
    }

    #[test]
    fn wide_table_with_tickers_on_inner_axis() {
        let table = RawTable::new(dates(), field_columns("NVDA", false, 5.0));
        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");
        assert_eq!(normalized.rows.len(), 2);
        assert!(normalized.rows.iter().all(|row| row.ticker == "NVDA"));
        assert_eq!(normalized.rows[0].high, Some(6.0));
    }

    #[test]
    fn adjusted_close_column_is_renamed() {
        let mut columns = field_columns("AAPL", true, 10.0);
        columns.push(Column::pair("AAPL", "Adj Close", vec![json!(9.0), json!(9.5)]));
        let table = RawTable::new(dates(), columns);

        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");
        assert_eq!(normalized.rows[0].adj_close, Some(9.0));
        assert_eq!(normalized.rows[0].close, Some(13.0));
    }

    #[test]
    fn ticker_missing_a_field_is_skipped_with_warning() {
        let mut columns = field_columns("AAPL", true, 10.0);
        columns.extend(
            field_columns("BAD", true, 1.0)
                .into_iter()
                .filter(|column| !matches!(&column.key, ColumnKey::Pair(_, field) if field == "Volume")),
        );
        let table = RawTable::new(dates(), columns);

        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");
        assert_eq!(normalized.rows.len(), 2);
        assert!(normalized.rows.iter().all(|row| row.ticker == "AAPL"));
        assert_eq!(normalized.warnings.len(), 1);
        assert!(normalized.warnings[0].contains("BAD"));
    }

    #[test]
    fn wide_date_column_takes_precedence_over_index() {
        let mut columns = field_columns("AAPL", true, 10.0);
        columns.push(Column::pair(
            "AAPL",
            "Date",
            vec![json!("2023-06-01"), json!("2023-06-02")],
        ));
        let table = RawTable::new(Vec::new(), columns);

        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");
        assert_eq!(normalized.rows[0].timestamp, datetime!(2023-06-01 00:00:00));
    }

    #[test]
    fn wide_table_without_index_or_date_column_is_skipped() {
        let table = RawTable::new(Vec::new(), field_columns("AAPL", true, 10.0));

        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");
        assert!(normalized.rows.is_empty());
        assert_eq!(normalized.warnings.len(), 1);
        assert!(normalized.warnings[0].contains("\"date\""));
        assert!(normalized.warnings[0].contains("row index is empty"));
    }

    #[test]
    fn offset_index_keeps_exchange_local_dates() {
        let index = vec![
            json!("2024-01-04 00:00:00+09:00"),
            json!("2024-01-05 00:00:00+09:00"),
        ];
        let table = RawTable::new(index, field_columns("7203.T", true, 2500.0));

        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");
        assert!(normalized.warnings.is_empty());
        assert_eq!(
            normalized
                .rows
                .iter()
                .map(|row| (row.ticker.as_str(), row.timestamp))
                .collect::<Vec<_>>(),
            vec![
                ("7203.T", datetime!(2024-01-04 00:00:00)),
                ("7203.T", datetime!(2024-01-05 00:00:00)),
            ]
        );
    }

    #[test]
    fn flat_table_renames_provider_columns() {
        let table = RawTable::new(
            Vec::new(),
            vec![
                Column::single("symbol", vec![json!("aapl")]),
                Column::single("datetime", vec![json!(1_704_153_600)]),
                Column::single("Open", vec![json!(1.0)]),
                Column::single("High", vec![json!("2.0")]),
                Column::single("Low", vec![json!(0.5)]),
                Column::single("Close", vec![json!(1.5)]),
                Column::single("Volume", vec![Value::Null]),
            ],
        );

        let normalized = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect("normalize");
        let row = &normalized.rows[0];
        assert_eq!(row.ticker, "aapl");
        assert_eq!(row.timestamp, datetime!(2024-01-02 00:00:00));
        assert_eq!(row.high, Some(2.0));
        assert_eq!(row.adj_close, Some(1.5));
        assert_eq!(row.volume, None);
    }

    #[test]
    fn flat_table_without_ticker_uses_fallback() {
        let table = RawTable::new(
            vec![json!("2024-01-02")],
            ["open", "high", "low", "close", "volume"]
                .iter()
                .map(|name| Column::single(*name, vec![json!(1.0)]))
                .collect(),
        );
        let normalized = SchemaNormalizer::new()
            .with_fallback_ticker("SPY")
            .normalize_table(&table)
            .expect("normalize");
        assert_eq!(normalized.rows[0].ticker, "SPY");
    }

    #[test]
    fn flat_table_missing_required_columns_is_fatal() {
        let table = RawTable::new(
            vec![json!("2024-01-02")],
            vec![Column::single("close", vec![json!(1.0)])],
        );
        let err = SchemaNormalizer::new()
            .normalize_table(&table)
            .expect_err("must fail");
        match err {
            CoreError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["open", "high", "low", "volume"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_table_yields_no_rows() {
        let normalized = SchemaNormalizer::new()
            .normalize_table(&RawTable::default())
            .expect("normalize");
        assert!(normalized.rows.is_empty());
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn failed_candle_record_is_skipped() {
        let records = vec![
            CandleResponse {
                symbol: Some(String::from("NVDA")),
                error: Some(String::from("no access")),
                ..CandleResponse::default()
            },
            CandleResponse {
                symbol: Some(String::from("AAPL")),
                status: Some(String::from("ok")),
                timestamps: vec![1_704_153_600],
                open: vec![Some(1.0)],
                high: vec![Some(2.0)],
                low: vec![Some(0.5)],
                close: vec![Some(1.5)],
                volume: vec![Some(100.0)],
                error: None,
            },
        ];

        let normalized = SchemaNormalizer::new().normalize_candles(&records);
        assert_eq!(normalized.rows.len(), 1);
        assert_eq!(normalized.rows[0].ticker, "AAPL");
        assert_eq!(normalized.warnings.len(), 1);
        assert!(normalized.warnings[0].contains("no access"));
    }

    #[test]
    fn ragged_candle_arrays_skip_the_record() {
        let record = CandleResponse {
            symbol: Some(String::from("AAPL")),
            status: Some(String::from("ok")),
            timestamps: vec![1_704_153_600, 1_704_240_000],
            open: vec![Some(1.0)],
            ..CandleResponse::default()
        };
        let normalized = SchemaNormalizer::new().normalize_candles(&[record]);
        assert!(normalized.rows.is_empty());
        assert_eq!(normalized.warnings.len(), 1);
    }
}
