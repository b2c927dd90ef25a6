//! Raw provider payload shapes handed to the schema normalizer.
//!
//! These mirror what the fetchers capture from providers, without any
//! interpretation: cells stay JSON values until normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Column key: one level for flat tables, two levels for wide tables.
///
/// The two levels of a wide key come in no guaranteed order; one is a
/// ticker, the other a field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnKey {
    Single(String),
    Pair(String, String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub key: ColumnKey,
    pub values: Vec<Value>,
}

impl Column {
    pub fn single(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            key: ColumnKey::Single(name.into()),
            values,
        }
    }

    pub fn pair(outer: impl Into<String>, inner: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            key: ColumnKey::Pair(outer.into(), inner.into()),
            values,
        }
    }
}

/// Column-major table with an optional row index (usually the dates).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub index: Vec<Value>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// Layout of a [`RawTable`] after structural validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    Empty,
    Flat,
    Wide,
}

impl RawTable {
    pub fn new(index: Vec<Value>, columns: Vec<Column>) -> Self {
        Self { index, columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns
            .first()
            .map_or(self.index.len(), |column| column.values.len())
    }

    /// Checks that every column matches the index length and that key arity is uniform.
    pub fn shape(&self) -> Result<TableShape, CoreError> {
        let rows = self.row_count();
        if self.columns.is_empty() || rows == 0 {
            return Ok(TableShape::Empty);
        }

        if !self.index.is_empty() && self.index.len() != rows {
            return Err(CoreError::malformed(format!(
                "index has {} entries but columns have {rows} rows",
                self.index.len()
            )));
        }

        let mut single = 0usize;
        for column in &self.columns {
            if column.values.len() != rows {
                return Err(CoreError::malformed(format!(
                    "column {:?} has {} rows, expected {rows}",
                    column.key,
                    column.values.len()
                )));
            }
            if matches!(column.key, ColumnKey::Single(_)) {
                single += 1;
            }
        }

        match single {
            0 => Ok(TableShape::Wide),
            n if n == self.columns.len() => Ok(TableShape::Flat),
            _ => Err(CoreError::malformed(
                "table mixes single-level and two-level column keys",
            )),
        }
    }

    /// Case-insensitive lookup of a flat column.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.iter().find_map(|column| match &column.key {
            ColumnKey::Single(key) if key.trim().eq_ignore_ascii_case(name) => {
                Some(column.values.as_slice())
            }
            _ => None,
        })
    }
}

/// One candle response from the quote/candle provider.
///
/// Successful responses carry `s == "ok"` and parallel arrays; failures carry
/// an `error` message instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleResponse {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, rename = "s")]
    pub status: Option<String>,
    #[serde(default, rename = "t")]
    pub timestamps: Vec<i64>,
    #[serde(default, rename = "o")]
    pub open: Vec<Option<f64>>,
    #[serde(default, rename = "h")]
    pub high: Vec<Option<f64>>,
    #[serde(default, rename = "l")]
    pub low: Vec<Option<f64>>,
    #[serde(default, rename = "c")]
    pub close: Vec<Option<f64>>,
    #[serde(default, rename = "v")]
    pub volume: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CandleResponse {
    pub fn is_ok(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.trim().eq_ignore_ascii_case("ok"))
    }
}

/// Anything a fetcher can hand to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Table(RawTable),
    Candles { records: Vec<CandleResponse> },
}

impl Payload {
    pub fn from_json(input: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(input)?)
    }
}
