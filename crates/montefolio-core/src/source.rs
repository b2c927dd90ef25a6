use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Data source identifiers understood by the normalization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Historical-bars provider: wide or flat OHLCV tables.
    Yfinance,
    /// Quote/candle provider: per-symbol candle records or flat quote tables.
    Finnhub,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yfinance => "yfinance",
            Self::Finnhub => "finnhub",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yfinance" | "yahoo" => Ok(Self::Yfinance),
            "finnhub" => Ok(Self::Finnhub),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_sources_case_insensitively() {
        assert_eq!(
            ProviderId::from_str(" YFinance ").expect("must parse"),
            ProviderId::Yfinance
        );
        assert_eq!(
            ProviderId::from_str("finnhub").expect("must parse"),
            ProviderId::Finnhub
        );
    }

    #[test]
    fn rejects_unknown_source() {
        let err = ProviderId::from_str("polygon").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidSource { value } if value == "polygon"));
    }
}
