//! Data cleaning: canonical rows to validated, deduplicated, sorted [`Bar`]s.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::canonical_ticker;
use crate::{Bar, CanonicalRow, TradingDate};

/// Rows dropped by each cleaning rule, in the order the rules run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub missing_price: usize,
    pub non_positive_price: usize,
    pub inconsistent_range: usize,
    pub negative_volume: usize,
    pub duplicates: usize,
    pub output_rows: usize,
}

impl CleanReport {
    pub fn dropped(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

/// Cleans normalized rows into bars sorted by `(ticker, date)`.
///
/// Rules run in a fixed order: date truncation, ticker upper-casing, null
/// prices, non-positive prices, OHLC consistency, volume coercion, then
/// first-occurrence deduplication on `(ticker, date)` and a stable sort.
/// Rows are only ever filtered; nothing here fails.
pub fn clean(rows: Vec<CanonicalRow>) -> (Vec<Bar>, CleanReport) {
    let mut report = CleanReport {
        input_rows: rows.len(),
        ..CleanReport::default()
    };

    let mut seen = HashSet::new();
    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(bar) = clean_row(row, &mut report) else {
            continue;
        };
        if seen.insert((bar.ticker.clone(), bar.date)) {
            bars.push(bar);
        } else {
            report.duplicates += 1;
        }
    }

    // `sort_by` is stable, so equal keys keep input order.
    bars.sort_by(|left, right| {
        left.ticker
            .cmp(&right.ticker)
            .then_with(|| left.date.cmp(&right.date))
    });

    report.output_rows = bars.len();
    debug!(
        input = report.input_rows,
        output = report.output_rows,
        missing_price = report.missing_price,
        non_positive_price = report.non_positive_price,
        inconsistent_range = report.inconsistent_range,
        negative_volume = report.negative_volume,
        duplicates = report.duplicates,
        "cleaned bars"
    );
    (bars, report)
}

fn clean_row(row: CanonicalRow, report: &mut CleanReport) -> Option<Bar> {
    let date = TradingDate::from(row.timestamp);
    let ticker = canonical_ticker(&row.ticker);

    let prices = [row.open, row.high, row.low, row.close, row.adj_close];
    let Some([open, high, low, close, adj_close]) = finite_prices(prices) else {
        report.missing_price += 1;
        return None;
    };

    if [open, high, low, close, adj_close]
        .iter()
        .any(|price| *price <= 0.0)
    {
        report.non_positive_price += 1;
        return None;
    }

    if high < low || high < open || high < close || low > open || low > close {
        report.inconsistent_range += 1;
        return None;
    }

    let Some(volume) = coerce_volume(row.volume) else {
        report.negative_volume += 1;
        return None;
    };

    Some(Bar {
        ticker,
        date,
        open,
        high,
        low,
        close,
        adj_close,
        volume,
    })
}

fn finite_prices(prices: [Option<f64>; 5]) -> Option<[f64; 5]> {
    let mut out = [0.0; 5];
    for (slot, price) in out.iter_mut().zip(prices) {
        *slot = price.filter(|value| value.is_finite())?;
    }
    Some(out)
}

/// Missing or NaN volume is zero; fractions truncate; negatives are rejected.
fn coerce_volume(volume: Option<f64>) -> Option<u64> {
    match volume {
        None => Some(0),
        Some(value) if value.is_nan() => Some(0),
        Some(value) => {
            let truncated = value.trunc();
            (truncated >= 0.0).then(|| truncated as u64)
        }
    }
}
