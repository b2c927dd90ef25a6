use thiserror::Error;

/// Validation and contract errors exposed by `montefolio-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,

    #[error("unknown data source '{value}', expected one of yfinance, finnhub")]
    InvalidSource { value: String },

    #[error("date '{value}' must be YYYY-MM-DD, RFC3339, or UNIX seconds")]
    InvalidDate { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,

    #[error("simulation requires at least one ticker")]
    EmptyTickerSet,
    #[error("simulation horizon must be at least one year")]
    ZeroYears,
    #[error("trading_days_per_year must be greater than zero")]
    ZeroTradingDays,
    #[error("batch_units must be greater than zero")]
    ZeroBatchUnits,

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },
    #[error("source_chain must contain at least one source")]
    EmptySourceChain,

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("input is missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("payload is not usable for source '{source_id}': {reason}")]
    IncompatiblePayload {
        source_id: &'static str,
        reason: String,
    },

    #[error("malformed table: {reason}")]
    MalformedTable { reason: String },

    #[error("invalid value in column '{column}' at row {row}: {value}")]
    InvalidCell {
        column: String,
        row: usize,
        value: String,
    },

    #[error("cannot sample returns for '{ticker}': {reason}")]
    Distribution { ticker: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn missing_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingColumns {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedTable {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code used in envelopes and exit-code mapping.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "core.validation",
            Self::MissingColumns { .. } => "core.missing_columns",
            Self::IncompatiblePayload { .. } => "core.incompatible_payload",
            Self::MalformedTable { .. } => "core.malformed_table",
            Self::InvalidCell { .. } => "core.invalid_cell",
            Self::Distribution { .. } => "core.distribution",
            Self::Serialization(_) => "core.serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_column() {
        let err = CoreError::missing_columns(["ticker", "adj_close"]);
        assert_eq!(
            err.to_string(),
            "input is missing required columns: ticker, adj_close"
        );
        assert_eq!(err.code(), "core.missing_columns");
    }
}
