//! Return calibration: per-ticker mean and standard deviation of daily log
//! returns over the adjusted close.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::{aview1, ArrayView1};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::payload::RawTable;
use crate::{Bar, CalibrationStats, CoreError, TradingDate};

/// Observations a ticker needs before it can be calibrated.
pub const MIN_OBSERVATIONS: usize = 2;

/// Divisor used for standard deviations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdDevConvention {
    /// Divide by `n`.
    #[default]
    Population,
    /// Divide by `n - 1`.
    Sample,
}

impl StdDevConvention {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::Sample => "sample",
        }
    }

    /// Delta degrees of freedom passed to [`ArrayBase::std`](ndarray::ArrayBase::std).
    pub const fn ddof(self) -> f64 {
        match self {
            Self::Population => 0.0,
            Self::Sample => 1.0,
        }
    }

    /// Mean and standard deviation of `values`, or `None` when there are too
    /// few values for this convention.
    pub fn mean_stdev(self, values: ArrayView1<'_, f64>) -> Option<(f64, f64)> {
        let ddof = self.ddof();
        if (values.len() as f64) <= ddof {
            return None;
        }
        Some((values.mean()?, values.std(ddof)))
    }
}

impl Display for StdDevConvention {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StdDevConvention {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "population" => Ok(Self::Population),
            "sample" => Ok(Self::Sample),
            other => Err(format!(
                "unknown stdev convention '{other}', expected population or sample"
            )),
        }
    }
}

/// Calibrates every ticker in `bars`.
///
/// Each ticker's series is ordered by date before returns are taken, so the
/// input need not be sorted. Tickers with fewer than [`MIN_OBSERVATIONS`]
/// are left out of the result.
pub fn calibrate(bars: &[Bar], convention: StdDevConvention) -> BTreeMap<String, CalibrationStats> {
    let mut series: BTreeMap<&str, Vec<(TradingDate, f64)>> = BTreeMap::new();
    for bar in bars {
        series
            .entry(bar.ticker.as_str())
            .or_default()
            .push((bar.date, bar.adj_close));
    }

    series
        .into_iter()
        .filter_map(|(ticker, points)| calibrate_series(ticker, points, convention))
        .map(|stats| (stats.ticker.clone(), stats))
        .collect()
}

/// Calibrates a stored history with `ticker`, `date`, and `adj_close` columns.
pub fn calibrate_table(
    table: &RawTable,
    convention: StdDevConvention,
) -> Result<BTreeMap<String, CalibrationStats>, CoreError> {
    let tickers = table.column("ticker");
    let dates = table.column("date");
    let closes = table.column("adj_close");
    let (Some(tickers), Some(dates), Some(closes)) = (tickers, dates, closes) else {
        let missing = [("ticker", tickers), ("date", dates), ("adj_close", closes)]
            .into_iter()
            .filter(|(_, column)| column.is_none())
            .map(|(name, _)| name);
        return Err(CoreError::missing_columns(missing));
    };

    if tickers.len() != dates.len() || dates.len() != closes.len() {
        return Err(CoreError::malformed(
            "ticker, date, and adj_close columns differ in length",
        ));
    }

    let mut series: BTreeMap<String, Vec<(TradingDate, f64)>> = BTreeMap::new();
    for (row, ((ticker, date), close)) in tickers.iter().zip(dates).zip(closes).enumerate() {
        let invalid = |column: &str, value: &Value| CoreError::InvalidCell {
            column: column.to_owned(),
            row,
            value: value.to_string(),
        };
        let ticker = ticker
            .as_str()
            .map(|text| text.trim().to_ascii_uppercase())
            .ok_or_else(|| invalid("ticker", ticker))?;
        let date = date
            .as_str()
            .and_then(|text| TradingDate::parse(text).ok())
            .ok_or_else(|| invalid("date", date))?;
        let close = close.as_f64().ok_or_else(|| invalid("adj_close", close))?;
        series.entry(ticker).or_default().push((date, close));
    }

    Ok(series
        .iter()
        .filter_map(|(ticker, points)| calibrate_series(ticker, points.clone(), convention))
        .map(|stats| (stats.ticker.clone(), stats))
        .collect())
}

fn calibrate_series(
    ticker: &str,
    mut points: Vec<(TradingDate, f64)>,
    convention: StdDevConvention,
) -> Option<CalibrationStats> {
    if points.len() < MIN_OBSERVATIONS {
        warn!(
            ticker,
            observations = points.len(),
            "insufficient history, ticker excluded from simulation"
        );
        return None;
    }

    points.sort_by_key(|(date, _)| *date);
    let returns = points
        .windows(2)
        .map(|pair| (pair[1].1 / pair[0].1).ln())
        .collect::<Vec<_>>();

    // A single return has no sample spread; it calibrates with stdev 0.
    let view = aview1(&returns);
    let Some((mean, stdev)) = convention
        .mean_stdev(view)
        .or_else(|| StdDevConvention::Population.mean_stdev(view))
    else {
        warn!(ticker, %convention, "no returns to calibrate");
        return None;
    };

    debug!(ticker, mean, stdev, samples = returns.len(), "calibrated ticker");
    Some(CalibrationStats {
        ticker: ticker.to_owned(),
        mean_log_return: mean,
        stdev_log_return: stdev,
        sample_size: returns.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Column;
    use serde_json::json;

    fn bar(ticker: &str, date: &str, adj_close: f64) -> Bar {
        Bar::new(
            ticker,
            TradingDate::parse(date).expect("date"),
            adj_close,
            adj_close,
            adj_close,
            adj_close,
            adj_close,
            0,
        )
        .expect("bar")
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn population_stats_of_log_returns() {
        let bars = vec![
            bar("AAPL", "2024-01-04", 121.0),
            bar("AAPL", "2024-01-02", 100.0),
            bar("AAPL", "2024-01-03", 110.0),
        ];

        let stats = calibrate(&bars, StdDevConvention::Population);
        let aapl = &stats["AAPL"];
        // Both returns are ln(1.1), so the spread is zero.
        assert_close(aapl.mean_log_return, 1.1f64.ln());
        assert_close(aapl.stdev_log_return, 0.0);
        assert_eq!(aapl.sample_size, 2);
    }

    #[test]
    fn sample_convention_divides_by_n_minus_one() {
        let returns = [0.01, -0.01];
        let (mean, population) = StdDevConvention::Population
            .mean_stdev(aview1(&returns))
            .expect("population");
        let (_, sample) = StdDevConvention::Sample
            .mean_stdev(aview1(&returns))
            .expect("sample");
        assert_close(mean, 0.0);
        assert_close(population, 0.01);
        assert_close(sample, 0.02f64.sqrt() * 0.1);
    }

    #[test]
    fn single_observation_tickers_are_excluded() {
        let bars = vec![
            bar("AAPL", "2024-01-02", 100.0),
            bar("AAPL", "2024-01-03", 101.0),
            bar("MSFT", "2024-01-02", 300.0),
        ];
        let stats = calibrate(&bars, StdDevConvention::Population);
        assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["AAPL"]);
    }

    #[test]
    fn sample_convention_keeps_two_observation_tickers_with_zero_stdev() {
        let bars = vec![
            bar("AAPL", "2024-01-02", 100.0),
            bar("AAPL", "2024-01-03", 101.0),
        ];
        let stats = calibrate(&bars, StdDevConvention::Sample);
        let aapl = &stats["AAPL"];
        assert_close(aapl.mean_log_return, 1.01f64.ln());
        assert_close(aapl.stdev_log_return, 0.0);
        assert_eq!(aapl.sample_size, 1);
    }

    #[test]
    fn table_calibration_matches_typed_calibration() {
        let table = RawTable::new(
            Vec::new(),
            vec![
                Column::single("ticker", vec![json!("aapl"), json!("AAPL"), json!("AAPL")]),
                Column::single(
                    "date",
                    vec![json!("2024-01-02"), json!("2024-01-03"), json!("2024-01-04")],
                ),
                Column::single("adj_close", vec![json!(100.0), json!(110.0), json!(99.0)]),
            ],
        );
        let bars = vec![
            bar("AAPL", "2024-01-02", 100.0),
            bar("AAPL", "2024-01-03", 110.0),
            bar("AAPL", "2024-01-04", 99.0),
        ];

        let from_table =
            calibrate_table(&table, StdDevConvention::Population).expect("calibrate table");
        assert_eq!(from_table, calibrate(&bars, StdDevConvention::Population));
    }

    #[test]
    fn table_without_adjusted_close_is_rejected() {
        let table = RawTable::new(
            Vec::new(),
            vec![
                Column::single("ticker", vec![json!("AAPL")]),
                Column::single("date", vec![json!("2024-01-02")]),
            ],
        );
        let err = calibrate_table(&table, StdDevConvention::Population).expect_err("must fail");
        match err {
            CoreError::MissingColumns { columns } => assert_eq!(columns, vec!["adj_close"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parses_convention_names() {
        assert_eq!(
            "Sample".parse::<StdDevConvention>().expect("parse"),
            StdDevConvention::Sample
        );
        assert!("median".parse::<StdDevConvention>().is_err());
    }
}
