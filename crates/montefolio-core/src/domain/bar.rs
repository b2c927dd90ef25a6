use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{TradingDate, ValidationError};

/// Column order of the canonical bar table.
pub const BAR_COLUMNS: [&str; 8] = [
    "ticker", "date", "open", "high", "low", "close", "adj_close", "volume",
];

/// Row produced by schema normalization, before cleaning.
///
/// Prices are optional because providers hand back gaps; the cleaner drops
/// any row that still has one.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub ticker: String,
    pub timestamp: PrimitiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
}

/// Validated daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: String,
    pub date: TradingDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ticker: impl Into<String>,
        date: TradingDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        adj_close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_price("open", open)?;
        validate_price("high", high)?;
        validate_price("low", low)?;
        validate_price("close", close)?;
        validate_price("adj_close", adj_close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }
        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            ticker: ticker.into().trim().to_ascii_uppercase(),
            date,
            open,
            high,
            low,
            close,
            adj_close,
            volume,
        })
    }
}

impl From<Bar> for CanonicalRow {
    fn from(bar: Bar) -> Self {
        Self {
            ticker: bar.ticker,
            timestamp: bar.date.midnight(),
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: Some(bar.close),
            adj_close: Some(bar.adj_close),
            volume: Some(bar.volume as f64),
        }
    }
}

fn validate_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> TradingDate {
        TradingDate::parse("2024-01-02").expect("date")
    }

    #[test]
    fn rejects_close_above_high() {
        let err = Bar::new("aapl", date(), 10.0, 12.0, 9.0, 12.5, 12.5, 10).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidBarBounds));
    }

    #[test]
    fn rejects_zero_price() {
        let err = Bar::new("aapl", date(), 10.0, 12.0, 0.0, 11.0, 11.0, 10).expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::NonPositiveValue { field: "low" }
        ));
    }

    #[test]
    fn bar_converts_back_to_canonical_row_at_midnight() {
        let bar = Bar::new("aapl", date(), 10.0, 12.0, 9.0, 11.0, 11.0, 10).expect("bar");
        assert_eq!(bar.ticker, "AAPL");
        let row = CanonicalRow::from(bar);
        assert_eq!(row.timestamp, date().midnight());
        assert_eq!(row.volume, Some(10.0));
    }
}
