//! Source-aware entry point composing normalization and cleaning.

use tracing::info;

use crate::clean::{clean, CleanReport};
use crate::normalize::SchemaNormalizer;
use crate::payload::{Payload, TableShape};
use crate::{Bar, CoreError, ProviderId};

/// Cleaned bars plus everything worth reporting about how they were produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub source: ProviderId,
    pub bars: Vec<Bar>,
    pub report: CleanReport,
    pub warnings: Vec<String>,
}

/// Normalizes and cleans a payload captured from `source`.
///
/// The historical-bars provider only hands back tables; the candle provider
/// hands back candle records or a flat table. Any other pairing is rejected
/// before normalization.
pub fn transform_extracted(
    payload: &Payload,
    source: ProviderId,
    normalizer: &SchemaNormalizer,
) -> Result<Transformed, CoreError> {
    check_compatible(payload, source)?;

    let normalized = normalizer.normalize(payload)?;
    let (bars, report) = clean(normalized.rows);

    info!(
        source = %source,
        bars = bars.len(),
        dropped = report.dropped(),
        warnings = normalized.warnings.len(),
        "transformed payload"
    );
    Ok(Transformed {
        source,
        bars,
        report,
        warnings: normalized.warnings,
    })
}

fn check_compatible(payload: &Payload, source: ProviderId) -> Result<(), CoreError> {
    let incompatible = |reason: &str| CoreError::IncompatiblePayload {
        source_id: source.as_str(),
        reason: reason.to_owned(),
    };

    match (source, payload) {
        (ProviderId::Yfinance, Payload::Table(_)) => Ok(()),
        (ProviderId::Yfinance, Payload::Candles { .. }) => {
            Err(incompatible("expected a table, got candle records"))
        }
        (ProviderId::Finnhub, Payload::Candles { .. }) => Ok(()),
        (ProviderId::Finnhub, Payload::Table(table)) => match table.shape()? {
            TableShape::Wide => Err(incompatible(
                "expected candle records or a flat table, got a wide table",
            )),
            TableShape::Flat | TableShape::Empty => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{CandleResponse, Column, RawTable};
    use serde_json::json;

    fn candles() -> Payload {
        Payload::Candles {
            records: vec![CandleResponse {
                symbol: Some(String::from("aapl")),
                status: Some(String::from("ok")),
                timestamps: vec![1_704_240_000, 1_704_153_600, 1_704_153_600],
                open: vec![Some(2.0), Some(1.0), Some(1.0)],
                high: vec![Some(2.5), Some(1.5), Some(1.5)],
                low: vec![Some(1.5), Some(0.5), Some(0.5)],
                close: vec![Some(2.0), Some(1.0), Some(1.0)],
                volume: vec![Some(10.0), None, Some(5.0)],
                error: None,
            }],
        }
    }

    #[test]
    fn candle_payload_is_normalized_and_cleaned() {
        let transformed =
            transform_extracted(&candles(), ProviderId::Finnhub, &SchemaNormalizer::new())
                .expect("transform");

        assert_eq!(transformed.bars.len(), 2);
        assert_eq!(transformed.report.duplicates, 1);
        assert_eq!(transformed.bars[0].ticker, "AAPL");
        assert_eq!(transformed.bars[0].date.to_string(), "2024-01-02");
        assert_eq!(transformed.bars[0].volume, 0);
        assert_eq!(transformed.bars[1].adj_close, 2.0);
    }

    #[test]
    fn historical_source_rejects_candles() {
        let err = transform_extracted(&candles(), ProviderId::Yfinance, &SchemaNormalizer::new())
            .expect_err("must fail");
        assert!(matches!(
            err,
            CoreError::IncompatiblePayload {
                source_id: "yfinance",
                ..
            }
        ));
    }

    #[test]
    fn candle_source_rejects_wide_tables() {
        let table = Payload::Table(RawTable::new(
            vec![json!("2024-01-02")],
            vec![Column::pair("AAPL", "Open", vec![json!(1.0)])],
        ));
        let err = transform_extracted(&table, ProviderId::Finnhub, &SchemaNormalizer::new())
            .expect_err("must fail");
        assert!(matches!(err, CoreError::IncompatiblePayload { .. }));
    }
}
